//! Ladder data source boundary
//!
//! The scan engine only ever talks to a [`LadderSource`]. Responses are
//! decoded here into validated [`RankedEntry`] values; rows missing a
//! required field are rejected and counted, never passed inward.

use crate::error::SourceError;
use async_trait::async_trait;
use ladder_common::{LadderMode, League, RankedEntry};
use serde::Deserialize;
use serde_json::Value;

/// One decoded ladder page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LadderPage {
    /// Valid rows in source order
    pub entries: Vec<RankedEntry>,
    /// Rows dropped because a required field was missing or malformed
    pub rejected: usize,
}

impl LadderPage {
    pub fn new(entries: Vec<RankedEntry>) -> Self {
        Self {
            entries,
            rejected: 0,
        }
    }

    /// True when the source returned no rows at all (end of ladder)
    pub fn is_exhausted(&self) -> bool {
        self.entries.is_empty() && self.rejected == 0
    }
}

/// External ladder data collaborator
#[async_trait]
pub trait LadderSource: Send + Sync {
    /// Leagues available for selection
    async fn fetch_leagues(&self) -> Result<Vec<League>, SourceError>;

    /// One page of a league's ladder
    async fn fetch_ladder_page(
        &self,
        league_id: &str,
        limit: u32,
        offset: u32,
        mode: LadderMode,
    ) -> Result<LadderPage, SourceError>;
}

/// Ladder row as sent by the API
#[derive(Debug, Deserialize)]
pub struct RawEntry {
    pub rank: Option<u32>,
    pub character: Option<RawCharacter>,
    #[serde(default)]
    pub dead: bool,
    #[serde(default)]
    pub retired: bool,
}

#[derive(Debug, Deserialize)]
pub struct RawCharacter {
    pub name: Option<String>,
    pub level: Option<u32>,
    pub class: Option<String>,
    pub experience: Option<u64>,
}

impl RawEntry {
    /// Validate required fields and convert
    pub fn validate(self) -> Result<RankedEntry, String> {
        let rank = self.rank.ok_or("missing rank")?;
        if rank == 0 {
            return Err("rank must be 1-based".to_string());
        }

        let character = self.character.ok_or("missing character")?;
        let name = character
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or("missing character name")?;
        let level = character.level.ok_or("missing level")?;
        if !(1..=100).contains(&level) {
            return Err(format!("level {} out of range", level));
        }
        let category = character
            .class
            .filter(|c| !c.trim().is_empty())
            .ok_or("missing class")?;
        let experience = character.experience.ok_or("missing experience")?;

        Ok(RankedEntry {
            global_rank: rank,
            name,
            level,
            category,
            experience,
            is_dead: self.dead,
            is_retired: self.retired,
        })
    }
}

/// Decode a ladder response body
///
/// Accepts `{"entries": [...]}`, `{"ladder": {"entries": [...]}}` or a bare
/// array of rows.
pub fn decode_ladder_page(body: Value) -> Result<LadderPage, SourceError> {
    let rows = match body {
        Value::Array(rows) => rows,
        Value::Object(mut map) => {
            let entries = match map.remove("ladder") {
                Some(Value::Object(mut ladder)) => ladder.remove("entries"),
                _ => map.remove("entries"),
            };
            match entries {
                Some(Value::Array(rows)) => rows,
                Some(Value::Null) | None => Vec::new(),
                Some(other) => {
                    return Err(SourceError::ParseError(format!(
                        "entries is not a list: {}",
                        other
                    )))
                }
            }
        }
        other => {
            return Err(SourceError::ParseError(format!(
                "unexpected ladder response: {}",
                other
            )))
        }
    };

    let mut page = LadderPage::default();
    for row in rows {
        let decoded = serde_json::from_value::<RawEntry>(row)
            .map_err(|e| e.to_string())
            .and_then(RawEntry::validate);
        match decoded {
            Ok(entry) => page.entries.push(entry),
            Err(reason) => {
                tracing::debug!(reason = %reason, "Rejected ladder row");
                page.rejected += 1;
            }
        }
    }

    if page.rejected > 0 {
        tracing::warn!(
            accepted = page.entries.len(),
            rejected = page.rejected,
            "Ladder page contained invalid rows"
        );
    }

    Ok(page)
}

#[derive(Debug, Deserialize)]
struct RawLeague {
    id: String,
    text: Option<String>,
    name: Option<String>,
    realm: Option<String>,
}

/// Decode a league listing
///
/// Accepts a bare array, `{"result": [...]}` or `{"leagues": [...]}`.
/// Leagues on console realms are dropped.
pub fn decode_leagues(body: Value) -> Result<Vec<League>, SourceError> {
    let rows = match body {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("result").or_else(|| map.remove("leagues")) {
            Some(Value::Array(rows)) => rows,
            _ => {
                return Err(SourceError::ParseError(
                    "league response has no league list".to_string(),
                ))
            }
        },
        other => {
            return Err(SourceError::ParseError(format!(
                "unexpected league response: {}",
                other
            )))
        }
    };

    let mut leagues = Vec::with_capacity(rows.len());
    for row in rows {
        let raw: RawLeague = serde_json::from_value(row)
            .map_err(|e| SourceError::ParseError(e.to_string()))?;

        if raw.realm.as_deref().is_some_and(|realm| realm != "pc") {
            continue;
        }

        let display_name = raw.text.or(raw.name).unwrap_or_else(|| raw.id.clone());
        leagues.push(League::new(raw.id, display_name));
    }

    Ok(leagues)
}
