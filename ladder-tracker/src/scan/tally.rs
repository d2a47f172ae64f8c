//! Per-category tally
//!
//! Classifies a stream of ladder entries by category. Every entry is counted
//! (the count is what category ranks are computed from); only the first K
//! entries of each tracked category are retained for display.

use ladder_common::{CategoryVocabulary, RankedEntry, Standing};
use std::collections::HashMap;

/// Outcome of observing one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Entry was appended to its category's retained sequence
    pub retained: bool,
    /// 1-based rank within the category, by discovery order
    pub category_rank: usize,
}

/// Counter and retained prefix of one category
#[derive(Debug, Clone, Default, PartialEq)]
struct CategoryTally {
    retained: Vec<Standing>,
    seen: usize,
}

impl CategoryTally {
    fn seen(&self) -> usize {
        self.seen
    }

    fn retained(&self) -> &[Standing] {
        &self.retained
    }
}

/// Running tally over a scan
///
/// Invariants per category: `retained.len() <= limit`, `seen >= retained.len()`,
/// and retained entries have strictly increasing global rank.
#[derive(Debug, Clone, PartialEq)]
pub struct SubclassTally {
    limit: usize,
    /// Categories eligible for retention, in vocabulary order
    tracked: Vec<String>,
    /// Set when the query targets a single category
    focus: Option<String>,
    /// Every category seen, tracked or not
    tallies: HashMap<String, CategoryTally>,
}

impl SubclassTally {
    /// Tally retaining up to `limit` entries of each tracked category
    pub fn new(tracked: Vec<String>, limit: usize) -> Self {
        Self {
            limit,
            tracked,
            focus: None,
            tallies: HashMap::new(),
        }
    }

    /// Tally that only counts; used for category ranks during lookups
    pub fn counting() -> Self {
        Self::new(Vec::new(), 0)
    }

    /// Tally for a single-category query
    pub fn single(category: impl Into<String>, limit: usize) -> Self {
        let category = category.into();
        Self {
            limit,
            tracked: vec![category.clone()],
            focus: Some(category),
            tallies: HashMap::new(),
        }
    }

    /// Tally for a query: one category, or every category of the vocabulary
    pub fn for_query(vocabulary: &CategoryVocabulary, category: Option<&str>, limit: usize) -> Self {
        match category {
            Some(category) => Self::single(category, limit),
            None => Self::new(vocabulary.categories.clone(), limit),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    pub fn tracked(&self) -> &[String] {
        &self.tracked
    }

    fn is_tracked(&self, category: &str) -> bool {
        self.tracked.iter().any(|c| c == category)
    }

    /// Count an entry and retain it if its category still has room
    pub fn observe(&mut self, entry: &RankedEntry) -> Observation {
        let limit = self.limit;
        let tracked = self.is_tracked(&entry.category);
        let tally = self.tallies.entry(entry.category.clone()).or_default();

        tally.seen += 1;
        let category_rank = tally.seen;

        let in_order = tally
            .retained
            .last()
            .map_or(true, |last| last.entry.global_rank < entry.global_rank);

        let retained = tracked && tally.retained.len() < limit && in_order;
        if retained {
            tally.retained.push(Standing {
                entry: entry.clone(),
                category_rank,
            });
        } else if tracked && !in_order {
            tracing::debug!(
                name = %entry.name,
                rank = entry.global_rank,
                "Entry out of rank order, not retained"
            );
        }

        Observation {
            retained,
            category_rank,
        }
    }

    /// True once enough entries have been collected for `limit`
    ///
    /// Single-category mode compares that category's count; otherwise every
    /// tracked category needs `limit` retained entries.
    pub fn is_saturated(&self, limit: usize) -> bool {
        match &self.focus {
            Some(category) => self.seen_count(category) >= limit,
            None => self
                .tracked
                .iter()
                .all(|category| self.retained(category).len() >= limit),
        }
    }

    /// Discard retention and counts, then replay `entries` under a new limit
    ///
    /// Retention keeps the first K per category, so a higher limit replayed
    /// over the same entries yields a superset of the previous retention.
    pub fn rebuild(&mut self, limit: usize, entries: &[RankedEntry]) {
        self.limit = limit;
        self.tallies.clear();
        for entry in entries {
            self.observe(entry);
        }
    }

    pub fn seen_count(&self, category: &str) -> usize {
        self.tallies.get(category).map_or(0, CategoryTally::seen)
    }

    pub fn retained(&self, category: &str) -> &[Standing] {
        self.tallies
            .get(category)
            .map(CategoryTally::retained)
            .unwrap_or(&[])
    }

    /// Number of retained entries across all categories
    pub fn retained_total(&self) -> usize {
        self.tracked
            .iter()
            .map(|category| self.retained(category).len())
            .sum()
    }

    /// Flattened retained entries sorted by (category asc, level desc)
    ///
    /// The sort is stable: entries with equal category and level stay in
    /// discovery order.
    pub fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self
            .tracked
            .iter()
            .flat_map(|category| self.retained(category).iter().cloned())
            .collect();

        standings.sort_by(|a, b| {
            a.entry
                .category
                .cmp(&b.entry.category)
                .then_with(|| b.entry.level.cmp(&a.entry.level))
        });
        standings
    }
}
