//! Race neighbors
//!
//! Fetches a window of the ladder centred on a tracked character and reports
//! who is directly ahead and behind, both overall and within the character's
//! category. Neighbors missing from the window (edges, or the character fell
//! out of it) are taken from the entries of an earlier scan and marked stale.

use crate::error::{ScanError, ScanResult};
use crate::pagination::window_offset;
use crate::source::LadderSource;
use chrono::Utc;
use ladder_common::config::RaceSettings;
use ladder_common::events::{EventBus, ScanEvent};
use ladder_common::{
    FoundEntryContext, LadderMode, LeagueTarget, Neighbor, NeighborPair, RaceStandings,
    RankedEntry,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Compute race standings from a fresh window and a fallback list
///
/// `tracked` is the last known state of the character. If the window
/// contains it, the fresh row replaces it and neighbors are its direct
/// window neighbors; a side the window cuts off is filled from `cache` only
/// when the window does not already reach the top of the ladder there.
/// Otherwise every neighbor comes from `cache` and the result is marked
/// stale. A cached row is never used for a character present in the window.
pub fn resolve_neighbors(
    window: &[RankedEntry],
    cache: &[RankedEntry],
    tracked: &RankedEntry,
) -> RaceStandings {
    let fresh_tracked = window.iter().find(|e| e.name_matches(&tracked.name));
    let tracked_stale = fresh_tracked.is_none();
    let current = fresh_tracked.unwrap_or(tracked);

    // Nobody is ahead of a window that starts at rank 1
    let reaches_top = window.first().map_or(false, |e| e.global_rank <= 1);
    let usable: Vec<&RankedEntry> = cache
        .iter()
        .filter(|e| {
            tracked_stale
                || e.name_matches(&current.name)
                || !window.iter().any(|w| w.name_matches(&e.name))
        })
        .collect();

    let global = neighbor_pair(window.iter().collect(), usable.clone(), current, reaches_top);

    let same_category = |e: &&RankedEntry| e.category == current.category;
    let category = neighbor_pair(
        window.iter().filter(same_category).collect(),
        usable.into_iter().filter(same_category).collect(),
        current,
        reaches_top,
    );

    RaceStandings {
        tracked: current.clone(),
        global,
        category,
        tracked_stale,
    }
}

fn neighbor_pair(
    fresh: Vec<&RankedEntry>,
    cached: Vec<&RankedEntry>,
    tracked: &RankedEntry,
    reaches_top: bool,
) -> NeighborPair {
    let fresh_pos = fresh.iter().position(|e| e.name_matches(&tracked.name));
    let cached_pos = cached.iter().position(|e| e.name_matches(&tracked.name));

    let cached_ahead = || {
        cached_pos
            .and_then(|i| i.checked_sub(1))
            .map(|i| neighbor(cached[i], tracked, true))
    };
    let cached_behind = || {
        cached_pos
            .and_then(|i| cached.get(i + 1))
            .map(|e| neighbor(e, tracked, true))
    };

    match fresh_pos {
        Some(i) => NeighborPair {
            ahead: match i.checked_sub(1) {
                Some(i) => Some(neighbor(fresh[i], tracked, false)),
                None if reaches_top => None,
                None => cached_ahead(),
            },
            behind: fresh
                .get(i + 1)
                .map(|e| neighbor(e, tracked, false))
                .or_else(cached_behind),
        },
        None => NeighborPair {
            ahead: cached_ahead(),
            behind: cached_behind(),
        },
    }
}

fn neighbor(entry: &RankedEntry, tracked: &RankedEntry, stale: bool) -> Neighbor {
    Neighbor {
        entry: entry.clone(),
        experience_delta: (entry.experience as i64).saturating_sub(tracked.experience as i64),
        stale,
    }
}

/// Clears the in-flight flag when a refresh ends, including by cancellation
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Neighbor lookup around one tracked character
///
/// At most one refresh runs at a time; a refresh requested while another is
/// in flight returns `Ok(None)` immediately.
pub struct NeighborResolver {
    source: Arc<dyn LadderSource>,
    league_id: String,
    mode: LadderMode,
    window_size: u32,
    tracked: Mutex<RankedEntry>,
    cache: Vec<RankedEntry>,
    in_flight: AtomicBool,
}

impl NeighborResolver {
    /// `cache` is the entry list of the scan or search that found the character
    pub fn new(
        source: Arc<dyn LadderSource>,
        league: &LeagueTarget,
        mode: LadderMode,
        settings: &RaceSettings,
        found: &FoundEntryContext,
        cache: Vec<RankedEntry>,
    ) -> Self {
        Self {
            source,
            league_id: league.id.clone(),
            mode,
            window_size: settings.window_size.max(1),
            tracked: Mutex::new(found.entry.clone()),
            cache,
            in_flight: AtomicBool::new(false),
        }
    }

    pub async fn tracked(&self) -> RankedEntry {
        self.tracked.lock().await.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Fetch the window around the tracked character and resolve neighbors
    pub async fn refresh(&self) -> ScanResult<Option<RaceStandings>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Race refresh already in flight, request coalesced");
            return Ok(None);
        }
        let _guard = InFlight(&self.in_flight);

        let tracked = self.tracked().await;
        let offset = window_offset(tracked.global_rank, self.window_size);

        tracing::debug!(
            name = %tracked.name,
            rank = tracked.global_rank,
            offset,
            window = self.window_size,
            "Refreshing race window"
        );

        let page = self
            .source
            .fetch_ladder_page(&self.league_id, self.window_size, offset, self.mode)
            .await
            .map_err(ScanError::SourceUnavailable)?;

        let standings = resolve_neighbors(&page.entries, &self.cache, &tracked);
        if standings.tracked_stale {
            tracing::warn!(name = %tracked.name, offset, "Tracked character not in race window");
        } else {
            *self.tracked.lock().await = standings.tracked.clone();
        }

        Ok(Some(standings))
    }
}

/// Handle to a running [`RaceTracker`]
pub struct RaceHandle {
    trigger: mpsc::Sender<()>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RaceHandle {
    /// Ask for an immediate refresh
    ///
    /// Returns false when a request is already pending; it will cover this one.
    pub fn request_refresh(&self) -> bool {
        self.trigger.try_send(()).is_ok()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.handle.await
    }
}

/// Periodic race refresher
///
/// Refreshes on a fixed interval and on demand, emitting
/// [`ScanEvent::RaceUpdated`] for each successful refresh.
pub struct RaceTracker {
    resolver: Arc<NeighborResolver>,
    refresh_interval: Duration,
    events: EventBus,
}

impl RaceTracker {
    pub fn new(resolver: Arc<NeighborResolver>, settings: &RaceSettings, events: EventBus) -> Self {
        Self {
            resolver,
            refresh_interval: settings.refresh_interval(),
            events,
        }
    }

    pub fn spawn(self) -> RaceHandle {
        let (trigger, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move { self.run(rx, token).await });

        RaceHandle {
            trigger,
            cancel,
            handle,
        }
    }

    async fn run(self, mut triggers: mpsc::Receiver<()>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = self.refresh_interval.as_secs(),
            "Race tracker started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
                Some(()) = triggers.recv() => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.resolver.refresh() => result,
            };

            match result {
                Ok(Some(standings)) => self.events.emit_lossy(ScanEvent::RaceUpdated {
                    standings,
                    timestamp: Utc::now(),
                }),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Race refresh failed"),
            }

            // Requests that arrived during the refresh are already served
            while triggers.try_recv().is_ok() {}
            interval.reset();
        }

        tracing::info!("Race tracker stopped");
    }
}
