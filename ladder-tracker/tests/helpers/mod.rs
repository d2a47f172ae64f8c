//! Test Helper Utilities
//!
//! In-memory ladder source for exercising the scan engine without HTTP.

#![allow(dead_code)]

use async_trait::async_trait;
use ladder_common::config::ScanSettings;
use ladder_common::{LadderMode, League, RankedEntry};
use ladder_tracker::source::{LadderPage, LadderSource};
use ladder_tracker::SourceError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Ladder entry with experience decreasing by rank
pub fn entry(rank: u32, name: &str, category: &str) -> RankedEntry {
    entry_at_level(rank, name, category, 90)
}

pub fn entry_at_level(rank: u32, name: &str, category: &str, level: u32) -> RankedEntry {
    RankedEntry {
        global_rank: rank,
        name: name.to_string(),
        level,
        category: category.to_string(),
        experience: 5_000_000 - rank as u64 * 100,
        is_dead: false,
        is_retired: false,
    }
}

/// Entries ranked from `first_rank`, one per category in turn
pub fn ladder(first_rank: u32, categories: &[&str], count: usize) -> Vec<RankedEntry> {
    (0..count)
        .map(|i| {
            let rank = first_rank + i as u32;
            let category = categories[i % categories.len()];
            entry(rank, &format!("{}{}", category.to_lowercase(), rank), category)
        })
        .collect()
}

/// Fast scan settings for tests: no pacing, small pages
pub fn settings(page_size: u32) -> ScanSettings {
    ScanSettings {
        page_size,
        page_interval_ms: 0,
        ..ScanSettings::default()
    }
}

/// Scripted ladder source
///
/// Serves `entries` sliced by the requested offset and limit. Fetch offsets
/// are recorded; individual offsets can be made to fail, and a token can be
/// cancelled from inside a fetch.
#[derive(Default)]
pub struct StubSource {
    pub entries: Vec<RankedEntry>,
    pub leagues: Vec<League>,
    fetches: AtomicUsize,
    offsets: Mutex<Vec<u32>>,
    fail_at: Mutex<Vec<u32>>,
    cancel_on_fetch: Mutex<Option<(usize, CancellationToken)>>,
}

impl StubSource {
    pub fn new(entries: Vec<RankedEntry>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    pub fn with_leagues(mut self, leagues: Vec<League>) -> Self {
        self.leagues = leagues;
        self
    }

    /// Make the fetch at `offset` fail with a network error
    pub fn fail_at(self, offset: u32) -> Self {
        self.fail_at.lock().unwrap().push(offset);
        self
    }

    /// Let fetch `offset` succeed again
    pub fn heal(&self, offset: u32) {
        self.fail_at.lock().unwrap().retain(|o| *o != offset);
    }

    /// Cancel `token` while serving the `n`th fetch (1-based)
    pub fn cancel_during_fetch(&self, n: usize, token: CancellationToken) {
        *self.cancel_on_fetch.lock().unwrap() = Some((n, token));
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn offsets(&self) -> Vec<u32> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl LadderSource for StubSource {
    async fn fetch_leagues(&self) -> Result<Vec<League>, SourceError> {
        Ok(self.leagues.clone())
    }

    async fn fetch_ladder_page(
        &self,
        _league_id: &str,
        limit: u32,
        offset: u32,
        _mode: LadderMode,
    ) -> Result<LadderPage, SourceError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.offsets.lock().unwrap().push(offset);

        if let Some((at, token)) = self.cancel_on_fetch.lock().unwrap().as_ref() {
            if *at == n {
                token.cancel();
            }
        }

        if self.fail_at.lock().unwrap().contains(&offset) {
            return Err(SourceError::NetworkError("connection reset".to_string()));
        }

        let start = (offset as usize).min(self.entries.len());
        let end = (start + limit as usize).min(self.entries.len());
        Ok(LadderPage::new(self.entries[start..end].to_vec()))
    }
}
