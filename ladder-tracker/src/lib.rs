//! ladder-tracker library interface
//!
//! Exposes the scan engine, the ladder API client and the shared
//! [`TrackerState`] used by the command-line front end and integration tests.

pub mod error;
pub mod pagination;
pub mod report;
pub mod scan;
pub mod services;
pub mod source;

pub use crate::error::{ScanError, ScanResult, SourceError};

use ladder_common::config::TomlConfig;
use ladder_common::events::EventBus;
use ladder_common::{CategoryVocabulary, LadderMode, League, LeagueTarget};
use scan::{PointLookupEngine, ScanController, ScanRequest, ScanSession, ScanTask};
use source::LadderSource;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// League used when nothing else is available
pub const DEFAULT_LEAGUE: &str = "Standard";

/// Scan currently owning the fetch slot
struct ActiveScan {
    session_id: Uuid,
    cancel: CancellationToken,
}

/// State shared by every command
#[derive(Clone)]
pub struct TrackerState {
    pub source: Arc<dyn LadderSource>,
    pub config: Arc<TomlConfig>,
    pub event_bus: EventBus,
    pub controller: Arc<ScanController>,
    pub lookup: Arc<PointLookupEngine>,
    /// Parent of every scan token; cancelled on shutdown
    pub shutdown: CancellationToken,
    /// At most one fetch runs at a time; starting another cancels it
    active_scan: Arc<RwLock<Option<ActiveScan>>>,
}

impl TrackerState {
    pub fn new(source: Arc<dyn LadderSource>, config: TomlConfig, event_bus: EventBus) -> Self {
        let controller = Arc::new(ScanController::new(
            Arc::clone(&source),
            config.scan.clone(),
            event_bus.clone(),
        ));
        let lookup = Arc::new(PointLookupEngine::new(
            Arc::clone(&source),
            config.scan.clone(),
            event_bus.clone(),
        ));

        Self {
            source,
            config: Arc::new(config),
            event_bus,
            controller,
            lookup,
            shutdown: CancellationToken::new(),
            active_scan: Arc::new(RwLock::new(None)),
        }
    }

    /// Start a top-level fetch, cancelling any scan still running
    ///
    /// The superseded scan stops at its next cancellation check and its
    /// in-flight page is discarded.
    pub async fn start_fetch(&self, session: ScanSession) -> ScanTask {
        self.launch(session, None).await
    }

    /// Continue `session` with the limit raised by the configured step
    pub async fn show_more(&self, session: ScanSession) -> ScanTask {
        let step = self.config.scan.show_more_step;
        self.launch(session, Some(step)).await
    }

    /// Session id of the scan holding the fetch slot
    pub async fn active_session(&self) -> Option<Uuid> {
        self.active_scan.read().await.as_ref().map(|a| a.session_id)
    }

    async fn launch(&self, session: ScanSession, step: Option<usize>) -> ScanTask {
        let mut active = self.active_scan.write().await;

        if let Some(previous) = active.take() {
            if previous.session_id != session.session_id {
                tracing::info!(
                    superseded = %previous.session_id,
                    session_id = %session.session_id,
                    "New fetch replaces running scan"
                );
            }
            previous.cancel.cancel();
        }

        let cancel = self.shutdown.child_token();
        let task = self.controller.spawn(session, step, cancel.clone());
        *active = Some(ActiveScan {
            session_id: task.session_id(),
            cancel,
        });
        task
    }

    /// Resolve a league from user input (or the default league)
    ///
    /// When the listing cannot be fetched, explicit input is used as a
    /// user-supplied id and the default falls back to "Standard".
    pub async fn resolve_league(&self, input: Option<&str>) -> LeagueTarget {
        let leagues = match self.source.fetch_leagues().await {
            Ok(leagues) => leagues,
            Err(e) => {
                tracing::warn!(error = %e, "League listing unavailable");
                Vec::new()
            }
        };

        match input.map(str::trim).filter(|s| !s.is_empty()) {
            Some(input) => LeagueTarget::resolve(&leagues, input),
            None => League::default_choice(&leagues)
                .map(LeagueTarget::listed)
                .unwrap_or_else(|| LeagueTarget::listed(&League::new(DEFAULT_LEAGUE, DEFAULT_LEAGUE))),
        }
    }

    /// Category vocabulary in effect for a league
    pub fn vocabulary_for(&self, league: &LeagueTarget) -> CategoryVocabulary {
        CategoryVocabulary::select(&self.config.all_vocabularies(), &league.display_name)
    }

    /// Build a validated fetch request
    ///
    /// The category is matched case-insensitively against the league's
    /// vocabulary and replaced by its canonical spelling.
    pub fn scan_request(
        &self,
        league: LeagueTarget,
        category: Option<&str>,
        limit: Option<usize>,
        mode: LadderMode,
    ) -> ScanResult<(ScanRequest, CategoryVocabulary)> {
        let vocabulary = self.vocabulary_for(&league);

        let category = match category {
            Some(input) => Some(
                vocabulary
                    .categories
                    .iter()
                    .find(|c| c.eq_ignore_ascii_case(input.trim()))
                    .cloned()
                    .ok_or_else(|| {
                        ScanError::InvalidRequest(format!(
                            "unknown category '{}' for league '{}'",
                            input, league.display_name
                        ))
                    })?,
            ),
            None => None,
        };

        let request = ScanRequest {
            league,
            category,
            limit: limit.unwrap_or(self.config.scan.initial_limit),
            mode,
        };
        request.validate()?;
        Ok((request, vocabulary))
    }
}
