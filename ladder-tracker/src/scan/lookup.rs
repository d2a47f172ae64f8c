//! Character lookup
//!
//! Locates one named character and reports its category rank at discovery.
//! Entries already fetched by a scan of the same league are searched first
//! without touching the network; otherwise the ladder is walked from the top.

use super::session::{ScanSession, SeenNames, StopReason};
use super::tally::{Observation, SubclassTally};
use crate::error::{ScanError, ScanResult};
use crate::pagination::Pagination;
use crate::source::LadderSource;
use ladder_common::config::ScanSettings;
use ladder_common::events::{EventBus, ScanEvent};
use ladder_common::{FoundEntryContext, LadderMode, LeagueTarget, RankedEntry};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// What to look for and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub league: LeagueTarget,
    pub name: String,
    pub mode: LadderMode,
}

/// Where a match came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOrigin {
    /// Entries already fetched by a prior scan
    Cached,
    /// Fresh traversal of the ladder
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found {
        context: FoundEntryContext,
        origin: LookupOrigin,
    },
    /// Traversal ended without a match
    NotFound { scanned: usize, reason: StopReason },
}

/// Lookup result plus what the traversal consumed
///
/// `scanned` holds the entries of every fully processed page; the race
/// resolver uses them as its fallback list.
#[derive(Debug)]
pub struct LookupReport {
    pub result: ScanResult<LookupOutcome>,
    pub scanned: Vec<RankedEntry>,
    pub pages_fetched: usize,
}

impl LookupReport {
    fn finished(result: ScanResult<LookupOutcome>, walk: Walk) -> Self {
        Self {
            result,
            scanned: walk.scanned,
            pages_fetched: walk.pages_fetched,
        }
    }
}

/// Entries and category counts of a traversal
struct Walk {
    scanned: Vec<RankedEntry>,
    seen: SeenNames,
    /// Counts every category, retains nothing
    tally: SubclassTally,
    pages_fetched: usize,
}

impl Default for Walk {
    fn default() -> Self {
        Self {
            scanned: Vec::new(),
            seen: SeenNames::default(),
            tally: SubclassTally::counting(),
            pages_fetched: 0,
        }
    }
}

impl Walk {
    /// Count an entry; `None` for a duplicate
    fn observe(&mut self, entry: &RankedEntry) -> Option<Observation> {
        if !self.seen.insert(entry) {
            return None;
        }
        Some(self.tally.observe(entry))
    }

    /// Forget the uncommitted tail of the current page
    fn rollback(&mut self, committed: usize) {
        self.scanned.truncate(committed);
        self.seen = SeenNames::from_entries(&self.scanned);
        self.tally.rebuild(0, &self.scanned);
    }
}

/// Point lookup of a character by name
pub struct PointLookupEngine {
    source: Arc<dyn LadderSource>,
    settings: ScanSettings,
    events: EventBus,
}

impl PointLookupEngine {
    pub fn new(source: Arc<dyn LadderSource>, settings: ScanSettings, events: EventBus) -> Self {
        Self {
            source,
            settings,
            events,
        }
    }

    /// Search already-fetched entries; never touches the network
    ///
    /// Category counts are replayed in order so the reported rank matches
    /// what a fresh traversal would have computed up to the match.
    pub fn find_cached(entries: &[RankedEntry], name: &str) -> Option<FoundEntryContext> {
        let mut tally = SubclassTally::counting();
        for entry in entries {
            let observation = tally.observe(entry);
            if entry.name_matches(name) {
                return Some(FoundEntryContext {
                    entry: entry.clone(),
                    category_rank_at_discovery: observation.category_rank,
                    global_rank: entry.global_rank,
                });
            }
        }
        None
    }

    /// Locate `request.name`
    ///
    /// A prior session is only consulted when it scanned the same league.
    pub async fn find(
        &self,
        request: &LookupRequest,
        prior: Option<&ScanSession>,
        cancel: &CancellationToken,
    ) -> LookupReport {
        let name = request.name.trim();
        if name.is_empty() {
            return LookupReport::finished(
                Err(ScanError::InvalidRequest("character name is empty".to_string())),
                Walk::default(),
            );
        }

        if let Some(session) = prior.filter(|s| s.league.id == request.league.id) {
            if let Some(context) = Self::find_cached(session.all_seen_entries(), name) {
                tracing::info!(
                    name = %context.entry.name,
                    rank = context.global_rank,
                    "Character found in fetched entries"
                );
                return LookupReport {
                    result: Ok(LookupOutcome::Found {
                        context,
                        origin: LookupOrigin::Cached,
                    }),
                    scanned: session.all_seen_entries().to_vec(),
                    pages_fetched: 0,
                };
            }
        }

        tracing::info!(name, league = %request.league.id, "Searching ladder for character");
        self.search_remote(request, name, cancel).await
    }

    async fn search_remote(
        &self,
        request: &LookupRequest,
        name: &str,
        cancel: &CancellationToken,
    ) -> LookupReport {
        let pagination = Pagination::for_mode(&self.settings, request.mode);
        let budget = self.settings.search_timeout();
        let started = Instant::now();
        let mut walk = Walk::default();
        let mut offset = 0u32;

        loop {
            if cancel.is_cancelled() {
                return LookupReport::finished(Err(ScanError::Cancelled), walk);
            }
            if pagination.ceiling_reached(offset) {
                let scanned = walk.scanned.len();
                return LookupReport::finished(
                    Ok(LookupOutcome::NotFound {
                        scanned,
                        reason: StopReason::DepthCeiling,
                    }),
                    walk,
                );
            }

            if walk.pages_fetched > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return LookupReport::finished(Err(ScanError::Cancelled), walk);
                    }
                    _ = tokio::time::sleep(self.settings.page_interval()) => {}
                }
            }

            let remaining = match budget {
                Some(budget) => match budget.checked_sub(started.elapsed()) {
                    Some(remaining) if !remaining.is_zero() => remaining,
                    _ => return timed_out(started, walk),
                },
                None => Duration::MAX,
            };

            let fetch = self.source.fetch_ladder_page(
                &request.league.id,
                pagination.page_size,
                offset,
                request.mode,
            );
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    return LookupReport::finished(Err(ScanError::Cancelled), walk);
                }
                result = tokio::time::timeout(remaining, fetch) => match result {
                    Ok(result) => result,
                    Err(_) => return timed_out(started, walk),
                },
            };
            walk.pages_fetched += 1;

            if cancel.is_cancelled() {
                return LookupReport::finished(Err(ScanError::Cancelled), walk);
            }

            let first_page_of_private_league = offset == 0 && request.league.user_supplied;

            let page = match result {
                Ok(page) => page,
                Err(e) if first_page_of_private_league => {
                    tracing::warn!(league = %request.league.id, error = %e, "First ladder page failed");
                    return LookupReport::finished(
                        Err(ScanError::LeagueNotFound(request.league.id.clone())),
                        walk,
                    );
                }
                Err(e) => {
                    tracing::error!(offset, error = %e, "Ladder page fetch failed during search");
                    return LookupReport::finished(Err(ScanError::SourceUnavailable(e)), walk);
                }
            };

            if page.is_exhausted() {
                let result = if first_page_of_private_league {
                    Err(ScanError::LeagueNotFound(request.league.id.clone()))
                } else {
                    Ok(LookupOutcome::NotFound {
                        scanned: walk.scanned.len(),
                        reason: StopReason::EndOfLadder,
                    })
                };
                return LookupReport::finished(result, walk);
            }

            let received = page.entries.len() + page.rejected;
            let committed = walk.scanned.len();

            for entry in page.entries {
                if cancel.is_cancelled() {
                    walk.rollback(committed);
                    return LookupReport::finished(Err(ScanError::Cancelled), walk);
                }

                let Some(observation) = walk.observe(&entry) else {
                    continue;
                };
                let category_rank = observation.category_rank;
                if !entry.name_matches(name) {
                    walk.scanned.push(entry);
                    continue;
                }

                tracing::info!(
                    name = %entry.name,
                    rank = entry.global_rank,
                    category_rank,
                    pages = walk.pages_fetched,
                    "Character found"
                );
                let context = FoundEntryContext {
                    global_rank: entry.global_rank,
                    category_rank_at_discovery: category_rank,
                    entry: entry.clone(),
                };
                walk.scanned.push(entry);
                return LookupReport::finished(
                    Ok(LookupOutcome::Found {
                        context,
                        origin: LookupOrigin::Remote,
                    }),
                    walk,
                );
            }

            self.events.emit_lossy(ScanEvent::LookupProgress {
                name: name.to_string(),
                scanned: walk.scanned.len(),
            });

            if received < pagination.page_size as usize {
                let scanned = walk.scanned.len();
                return LookupReport::finished(
                    Ok(LookupOutcome::NotFound {
                        scanned,
                        reason: StopReason::EndOfLadder,
                    }),
                    walk,
                );
            }

            offset = pagination.next_offset(offset);
        }
    }
}

fn timed_out(started: Instant, walk: Walk) -> LookupReport {
    let elapsed = started.elapsed();
    let scanned = walk.scanned.len();
    tracing::warn!(elapsed_ms = elapsed.as_millis() as u64, scanned, "Character search timed out");
    LookupReport::finished(Err(ScanError::Timeout { elapsed, scanned }), walk)
}
