//! Event types for scan progress delivery
//!
//! Scans run on their own task. Everything the caller sees (interim standings,
//! final results, search progress, race refreshes) travels as a [`ScanEvent`]
//! over the [`EventBus`].

use crate::models::{RaceStandings, Standing};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Scan lifecycle and result events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScanEvent {
    /// A scan session began fetching (fresh or resumed)
    ScanStarted {
        session_id: Uuid,
        league_id: String,
        category: Option<String>,
        limit: usize,
        /// True for "show more" continuations
        resumed: bool,
        timestamp: DateTime<Utc>,
    },

    /// One ladder page was merged into the session
    PageFetched {
        session_id: Uuid,
        /// Offset of the merged page
        offset: u32,
        entries: usize,
        total_seen: usize,
        timestamp: DateTime<Utc>,
    },

    /// Standings after a page, emitted for all-category scans only
    InterimStandings {
        session_id: Uuid,
        standings: Vec<Standing>,
    },

    /// Scan reached a terminal state
    ScanFinished {
        session_id: Uuid,
        /// Human-readable terminal outcome
        outcome: String,
        standings: Vec<Standing>,
        timestamp: DateTime<Utc>,
    },

    /// Character search progress
    LookupProgress {
        name: String,
        scanned: usize,
    },

    /// Race neighbors refreshed
    RaceUpdated {
        standings: RaceStandings,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for [`ScanEvent`]s
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScanEvent>,
}

impl EventBus {
    /// Slow subscribers lose the oldest events once `capacity` is exceeded
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ScanEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
