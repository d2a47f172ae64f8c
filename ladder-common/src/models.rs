//! Ladder data model shared across crates
//!
//! A ladder is the ranked list of characters for one league, ordered by
//! experience descending. Every row of that list becomes a [`RankedEntry`]
//! once it has passed validation at the data source boundary.

use serde::{Deserialize, Serialize};

/// One validated ladder row
///
/// Immutable once fetched. `name` is the stable identity key within a
/// league; rank and experience drift over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// 1-based position in the global ladder
    pub global_rank: u32,
    /// Character name (unique within a league)
    pub name: String,
    /// Character level, 1..=100
    pub level: u32,
    /// Subclass (ascendancy) of the character
    pub category: String,
    /// Total experience
    pub experience: u64,
    /// Hardcore character that died
    #[serde(default)]
    pub is_dead: bool,
    /// Character retired from the league
    #[serde(default)]
    pub is_retired: bool,
}

impl RankedEntry {
    /// Case-insensitive name comparison used by every lookup path
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Traversal mode for ladder pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LadderMode {
    /// Unauthenticated endpoint, capped at a fixed traversal depth
    Public,
    /// Authenticated ("deep") endpoint without the public depth cap
    Authenticated,
}

impl LadderMode {
    pub fn is_deep(self) -> bool {
        matches!(self, LadderMode::Authenticated)
    }
}

impl std::fmt::Display for LadderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LadderMode::Public => write!(f, "public"),
            LadderMode::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// League as listed by the data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct League {
    /// API identifier used in ladder requests
    pub id: String,
    /// Human-readable name (falls back to the id)
    pub display_name: String,
}

impl League {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// Pick the league shown by default: "Standard" when listed, else the first
    pub fn default_choice(leagues: &[League]) -> Option<&League> {
        leagues
            .iter()
            .find(|l| l.id == "Standard")
            .or_else(|| leagues.first())
    }
}

/// League selected for a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueTarget {
    pub id: String,
    pub display_name: String,
    /// Identifier typed by the user rather than picked from the listing
    /// (private leagues). An empty first page then means "no such league".
    pub user_supplied: bool,
}

impl LeagueTarget {
    /// Resolve user input against the listed leagues
    ///
    /// Matches by id first, then by display name (case-insensitive). Input that
    /// matches nothing is used verbatim as a user-supplied id.
    pub fn resolve(leagues: &[League], input: &str) -> Self {
        let input = input.trim();
        let found = leagues
            .iter()
            .find(|l| l.id == input)
            .or_else(|| {
                leagues
                    .iter()
                    .find(|l| l.display_name.eq_ignore_ascii_case(input) || l.id.eq_ignore_ascii_case(input))
            });

        match found {
            Some(league) => Self::listed(league),
            None => Self::private(input),
        }
    }

    pub fn listed(league: &League) -> Self {
        Self {
            id: league.id.clone(),
            display_name: league.display_name.clone(),
            user_supplied: false,
        }
    }

    pub fn private(id: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: id.to_string(),
            user_supplied: true,
        }
    }
}

/// Closed set of categories used by one family of leagues
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryVocabulary {
    pub name: String,
    /// Substrings of league display names that select this vocabulary.
    /// An empty list marks the fallback vocabulary.
    #[serde(default)]
    pub league_match: Vec<String>,
    pub categories: Vec<String>,
}

/// Ascendancies since 3.25 (Warden replaced Raider)
pub const CURRENT_ASCENDANCIES: &[&str] = &[
    "Ascendant", "Assassin", "Berserker", "Champion", "Chieftain",
    "Deadeye", "Elementalist", "Gladiator", "Guardian", "Hierophant",
    "Inquisitor", "Juggernaut", "Necromancer", "Occultist", "Pathfinder",
    "Saboteur", "Slayer", "Trickster", "Warden",
];

/// Ascendancies before 3.25
pub const LEGACY_ASCENDANCIES: &[&str] = &[
    "Ascendant", "Assassin", "Berserker", "Champion", "Chieftain",
    "Deadeye", "Elementalist", "Gladiator", "Guardian", "Hierophant",
    "Inquisitor", "Juggernaut", "Necromancer", "Occultist", "Pathfinder",
    "Raider", "Saboteur", "Slayer", "Trickster",
];

/// League names that predate the Warden ascendancy
const LEGACY_LEAGUE_NAMES: &[&str] = &[
    "Necropolis", "Affliction", "Ancestor", "Crucible", "Sanctum", "Kalandra",
];

impl CategoryVocabulary {
    fn from_static(name: &str, league_match: &[&str], categories: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            league_match: league_match.iter().map(|s| s.to_string()).collect(),
            categories: categories.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Built-in vocabularies, most specific first
    pub fn builtin() -> Vec<CategoryVocabulary> {
        vec![
            Self::from_static("legacy", LEGACY_LEAGUE_NAMES, LEGACY_ASCENDANCIES),
            Self::from_static("current", &[], CURRENT_ASCENDANCIES),
        ]
    }

    /// True if this vocabulary applies to the given league display name
    pub fn applies_to(&self, league_display_name: &str) -> bool {
        let name = league_display_name.to_lowercase();
        self.league_match
            .iter()
            .any(|pattern| name.contains(&pattern.to_lowercase()))
    }

    pub fn is_fallback(&self) -> bool {
        self.league_match.is_empty()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    /// Select the vocabulary for a league
    ///
    /// The first vocabulary whose patterns match wins; otherwise the first
    /// fallback vocabulary; otherwise the built-in current set.
    pub fn select(vocabularies: &[CategoryVocabulary], league_display_name: &str) -> CategoryVocabulary {
        vocabularies
            .iter()
            .find(|v| v.applies_to(league_display_name))
            .or_else(|| vocabularies.iter().find(|v| v.is_fallback()))
            .cloned()
            .unwrap_or_else(|| Self::from_static("current", &[], CURRENT_ASCENDANCIES))
    }
}

/// Retained entry together with its rank inside its category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub entry: RankedEntry,
    /// 1-based position among entries of the same category, by discovery order
    pub category_rank: usize,
}

/// Result of locating one named character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundEntryContext {
    pub entry: RankedEntry,
    pub category_rank_at_discovery: usize,
    pub global_rank: u32,
}

/// Adjacent character in a race comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub entry: RankedEntry,
    /// `neighbor.experience - tracked.experience`
    pub experience_delta: i64,
    /// Taken from the cached list rather than the freshly fetched window
    pub stale: bool,
}

/// Characters directly ahead of and behind the tracked one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborPair {
    pub ahead: Option<Neighbor>,
    pub behind: Option<Neighbor>,
}

/// Snapshot of a race comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceStandings {
    pub tracked: RankedEntry,
    /// Unfiltered window ordering
    pub global: NeighborPair,
    /// Window filtered to the tracked character's category
    pub category: NeighborPair,
    /// Tracked character was missing from the fresh window
    pub tracked_stale: bool,
}
