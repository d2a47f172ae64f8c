//! Scan session state machine
//!
//! A session progresses `Idle -> Fetching -> {Stopped, Cancelled, Failed}`.
//! "Show more" moves a finished session back to `Fetching` with a higher
//! limit; offset and seen entries carry over.

use super::tally::SubclassTally;
use crate::error::{ScanError, ScanResult};
use chrono::{DateTime, Utc};
use ladder_common::{CategoryVocabulary, LadderMode, LeagueTarget, RankedEntry, Standing};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Scan workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanState {
    /// Created, nothing fetched yet
    Idle,
    /// Page loop running
    Fetching,
    /// Stopping condition reached
    Stopped,
    /// Cancelled by the caller
    Cancelled,
    /// A page fetch failed
    Failed,
}

/// Why a scan stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Enough entries for the current limit
    Saturated,
    /// Source returned an empty or short page
    EndOfLadder,
    /// Offset reached the traversal ceiling
    DepthCeiling,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Saturated => write!(f, "limit reached"),
            StopReason::EndOfLadder => write!(f, "end of ladder"),
            StopReason::DepthCeiling => write!(f, "depth ceiling reached"),
        }
    }
}

/// Lowercased names of entries already merged
///
/// The ladder can shift between page requests, so the same character may
/// show up on two consecutive pages.
#[derive(Debug, Clone, Default)]
pub(crate) struct SeenNames(HashSet<String>);

impl SeenNames {
    /// Record `entry`; false if its name was already seen
    pub(crate) fn insert(&mut self, entry: &RankedEntry) -> bool {
        self.0.insert(entry.name.to_lowercase())
    }

    pub(crate) fn from_entries(entries: &[RankedEntry]) -> Self {
        let mut seen = Self::default();
        for entry in entries {
            seen.insert(entry);
        }
        seen
    }
}

/// Parameters of a top-level fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub league: LeagueTarget,
    /// `None` scans every category of the league's vocabulary
    pub category: Option<String>,
    pub limit: usize,
    pub mode: LadderMode,
}

impl ScanRequest {
    /// Reject combinations the source cannot serve
    pub fn validate(&self) -> ScanResult<()> {
        if self.limit == 0 {
            return Err(ScanError::InvalidRequest("limit must be at least 1".to_string()));
        }
        if self.mode.is_deep() && self.league.user_supplied {
            return Err(ScanError::InvalidRequest(
                "deep mode is only available for listed leagues".to_string(),
            ));
        }
        Ok(())
    }
}

/// One incremental ladder scan
///
/// Owned by exactly one worker while fetching; the caller gets it back with
/// the scan report.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub session_id: Uuid,
    pub league: LeagueTarget,
    pub category: Option<String>,
    pub mode: LadderMode,
    pub state: ScanState,
    pub stop_reason: Option<StopReason>,
    /// Offset of the next page to fetch
    page_offset: u32,
    all_seen_entries: Vec<RankedEntry>,
    seen_names: SeenNames,
    tally: SubclassTally,
    pages_fetched: usize,
    rejected_rows: usize,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ScanSession {
    pub fn new(request: ScanRequest, vocabulary: &CategoryVocabulary) -> ScanResult<Self> {
        request.validate()?;

        let tally = SubclassTally::for_query(vocabulary, request.category.as_deref(), request.limit);
        Ok(Self {
            session_id: Uuid::new_v4(),
            league: request.league,
            category: request.category,
            mode: request.mode,
            state: ScanState::Idle,
            stop_reason: None,
            page_offset: 0,
            all_seen_entries: Vec::new(),
            seen_names: SeenNames::default(),
            tally,
            pages_fetched: 0,
            rejected_rows: 0,
            started_at: Utc::now(),
            ended_at: None,
        })
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: ScanState) {
        tracing::debug!(
            session_id = %self.session_id,
            old_state = ?self.state,
            new_state = ?new_state,
            "Scan state transition"
        );
        self.state = new_state;

        match new_state {
            ScanState::Stopped | ScanState::Cancelled | ScanState::Failed => {
                self.ended_at = Some(Utc::now());
            }
            ScanState::Fetching => {
                self.stop_reason = None;
                self.ended_at = None;
            }
            ScanState::Idle => {}
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ScanState::Stopped | ScanState::Cancelled | ScanState::Failed
        )
    }

    pub fn limit(&self) -> usize {
        self.tally.limit()
    }

    /// Raise the per-category limit for "show more"
    ///
    /// Retention is rebuilt from the entries already seen; offset is kept.
    /// Lower values are ignored so the limit only grows.
    pub fn raise_limit(&mut self, new_limit: usize) {
        if new_limit <= self.limit() {
            return;
        }
        self.tally.rebuild(new_limit, &self.all_seen_entries);
    }

    pub fn page_offset(&self) -> u32 {
        self.page_offset
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn rejected_rows(&self) -> usize {
        self.rejected_rows
    }

    pub fn all_seen_entries(&self) -> &[RankedEntry] {
        &self.all_seen_entries
    }

    pub fn tally(&self) -> &SubclassTally {
        &self.tally
    }

    pub fn is_saturated(&self) -> bool {
        self.tally.is_saturated(self.limit())
    }

    /// Merge a fetched page and advance the offset by one page
    ///
    /// Entries whose name was already merged (the ladder shifted between
    /// requests) are skipped. Returns the number of entries merged.
    pub fn merge_page(&mut self, entries: Vec<RankedEntry>, rejected: usize, page_size: u32) -> usize {
        let mut merged = 0;
        for entry in entries {
            if !self.seen_names.insert(&entry) {
                tracing::debug!(name = %entry.name, "Duplicate ladder entry skipped");
                continue;
            }
            self.tally.observe(&entry);
            self.all_seen_entries.push(entry);
            merged += 1;
        }

        self.rejected_rows += rejected;
        self.pages_fetched += 1;
        self.page_offset = self.page_offset.saturating_add(page_size);
        merged
    }

    /// Current standings, sorted for display
    pub fn standings(&self) -> Vec<Standing> {
        self.tally.standings()
    }
}
