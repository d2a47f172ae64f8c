//! Scan controller
//!
//! Drives a [`ScanSession`] through the ladder page by page until the tally
//! is saturated, the ladder ends, the depth ceiling is reached, the caller
//! cancels, or a fetch fails. The same loop serves fresh fetches and
//! "show more" continuations.

use super::session::{ScanSession, ScanState, StopReason};
use crate::error::{ScanError, ScanResult};
use crate::pagination::Pagination;
use crate::source::LadderSource;
use chrono::Utc;
use ladder_common::config::ScanSettings;
use ladder_common::events::{EventBus, ScanEvent};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Terminal result of one scan run, handed back with the session
#[derive(Debug)]
pub struct ScanReport {
    pub session: ScanSession,
    pub outcome: ScanResult<StopReason>,
}

/// Scan running on its own task
///
/// Dropping the handle does not stop the task; cancel the token it was
/// spawned with.
pub struct ScanTask {
    session_id: Uuid,
    handle: JoinHandle<ScanReport>,
}

impl ScanTask {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Wait for the worker to hand the session back
    pub async fn join(self) -> Result<ScanReport, tokio::task::JoinError> {
        self.handle.await
    }
}

/// Resumable ladder scan driver
pub struct ScanController {
    source: Arc<dyn LadderSource>,
    settings: ScanSettings,
    events: EventBus,
}

impl ScanController {
    pub fn new(source: Arc<dyn LadderSource>, settings: ScanSettings, events: EventBus) -> Self {
        Self {
            source,
            settings,
            events,
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Run the page loop until a stopping condition
    ///
    /// Resumes from the session's current offset. On cancellation the
    /// in-flight page is discarded; on a fetch error everything merged before
    /// it is kept. Either way the session stays resumable.
    pub async fn run(
        &self,
        session: &mut ScanSession,
        cancel: &CancellationToken,
    ) -> ScanResult<StopReason> {
        let resumed = session.pages_fetched() > 0;
        session.transition_to(ScanState::Fetching);

        tracing::info!(
            session_id = %session.session_id,
            league = %session.league.id,
            category = ?session.category,
            limit = session.limit(),
            offset = session.page_offset(),
            mode = %session.mode,
            resumed,
            "Starting ladder scan"
        );

        self.events.emit_lossy(ScanEvent::ScanStarted {
            session_id: session.session_id,
            league_id: session.league.id.clone(),
            category: session.category.clone(),
            limit: session.limit(),
            resumed,
            timestamp: Utc::now(),
        });

        let outcome = self.page_loop(session, cancel).await;
        self.finish(session, &outcome);
        outcome
    }

    /// Raise the limit by `step` and continue the scan
    ///
    /// Retention is rebuilt from what the session already saw; fetching
    /// resumes at the saved offset, so no consumed page is requested again.
    pub async fn show_more_by(
        &self,
        session: &mut ScanSession,
        step: usize,
        cancel: &CancellationToken,
    ) -> ScanResult<StopReason> {
        if step == 0 {
            return Err(ScanError::InvalidRequest(
                "show more step must be at least 1".to_string(),
            ));
        }

        let new_limit = session.limit().saturating_add(step);
        tracing::debug!(
            session_id = %session.session_id,
            old_limit = session.limit(),
            new_limit,
            "Raising scan limit"
        );
        session.raise_limit(new_limit);
        self.run(session, cancel).await
    }

    /// Run a scan on a dedicated task
    ///
    /// The session moves into the worker and comes back in the [`ScanReport`].
    /// When `step` is set the run is a "show more" continuation.
    pub fn spawn(
        self: &Arc<Self>,
        mut session: ScanSession,
        step: Option<usize>,
        cancel: CancellationToken,
    ) -> ScanTask {
        let controller = Arc::clone(self);
        let session_id = session.session_id;

        let handle = tokio::spawn(async move {
            let outcome = match step {
                Some(step) => controller.show_more_by(&mut session, step, &cancel).await,
                None => controller.run(&mut session, &cancel).await,
            };
            ScanReport { session, outcome }
        });

        ScanTask { session_id, handle }
    }

    async fn page_loop(
        &self,
        session: &mut ScanSession,
        cancel: &CancellationToken,
    ) -> ScanResult<StopReason> {
        let pagination = Pagination::for_mode(&self.settings, session.mode);
        let mut fetched_this_run = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            let offset = session.page_offset();
            if pagination.ceiling_reached(offset) {
                return Ok(StopReason::DepthCeiling);
            }
            if session.is_saturated() {
                return Ok(StopReason::Saturated);
            }

            if fetched_this_run > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ScanError::Cancelled),
                    _ = tokio::time::sleep(self.settings.page_interval()) => {}
                }
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(ScanError::Cancelled),
                result = self.source.fetch_ladder_page(
                    &session.league.id,
                    pagination.page_size,
                    offset,
                    session.mode,
                ) => result,
            };
            fetched_this_run += 1;

            // Cancelled while the page was in flight: drop it
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            let first_page_of_private_league = offset == 0 && session.league.user_supplied;

            let page = match result {
                Ok(page) => page,
                Err(e) if first_page_of_private_league => {
                    tracing::warn!(league = %session.league.id, error = %e, "First ladder page failed");
                    return Err(ScanError::LeagueNotFound(session.league.id.clone()));
                }
                Err(e) => {
                    tracing::error!(
                        session_id = %session.session_id,
                        offset,
                        error = %e,
                        "Ladder page fetch failed"
                    );
                    return Err(ScanError::SourceUnavailable(e));
                }
            };

            if page.is_exhausted() {
                if first_page_of_private_league {
                    return Err(ScanError::LeagueNotFound(session.league.id.clone()));
                }
                return Ok(StopReason::EndOfLadder);
            }

            let received = page.entries.len() + page.rejected;
            let merged = session.merge_page(page.entries, page.rejected, pagination.page_size);

            tracing::debug!(
                session_id = %session.session_id,
                offset,
                received,
                merged,
                retained = session.tally().retained_total(),
                "Merged ladder page"
            );

            self.events.emit_lossy(ScanEvent::PageFetched {
                session_id: session.session_id,
                offset,
                entries: merged,
                total_seen: session.all_seen_entries().len(),
                timestamp: Utc::now(),
            });

            if session.category.is_none() {
                self.events.emit_lossy(ScanEvent::InterimStandings {
                    session_id: session.session_id,
                    standings: session.standings(),
                });
            }

            // A short page is the last one
            if received < pagination.page_size as usize {
                if session.is_saturated() {
                    return Ok(StopReason::Saturated);
                }
                return Ok(StopReason::EndOfLadder);
            }
        }
    }

    fn finish(&self, session: &mut ScanSession, outcome: &ScanResult<StopReason>) {
        let summary = match outcome {
            Ok(reason) => {
                session.stop_reason = Some(*reason);
                session.transition_to(ScanState::Stopped);
                tracing::info!(
                    session_id = %session.session_id,
                    reason = %reason,
                    pages = session.pages_fetched(),
                    seen = session.all_seen_entries().len(),
                    "Ladder scan stopped"
                );
                format!("Stopped ({})", reason)
            }
            Err(ScanError::Cancelled) => {
                session.transition_to(ScanState::Cancelled);
                tracing::info!(session_id = %session.session_id, "Ladder scan cancelled");
                "Cancelled".to_string()
            }
            Err(e) => {
                session.transition_to(ScanState::Failed);
                tracing::warn!(session_id = %session.session_id, error = %e, "Ladder scan failed");
                format!("Error: {}", e)
            }
        };

        self.events.emit_lossy(ScanEvent::ScanFinished {
            session_id: session.session_id,
            outcome: summary,
            standings: session.standings(),
            timestamp: Utc::now(),
        });
    }
}
