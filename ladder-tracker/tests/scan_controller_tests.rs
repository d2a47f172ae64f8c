//! Integration tests for the scan controller
//!
//! Tests the page loop against a scripted source:
//! - stopping on saturation, end of ladder and depth ceiling
//! - "show more" resuming without refetching consumed pages
//! - cancellation discarding the in-flight page
//! - partial results surviving a failed fetch
//! - private leagues with an empty first page

mod helpers;

use helpers::{entry, entry_at_level, ladder, settings, StubSource};
use ladder_common::events::{EventBus, ScanEvent};
use ladder_common::{CategoryVocabulary, LadderMode, League, LeagueTarget};
use ladder_tracker::scan::{ScanController, ScanRequest, ScanSession, ScanState, StopReason};
use ladder_tracker::ScanError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn vocabulary(categories: &[&str]) -> CategoryVocabulary {
    CategoryVocabulary {
        name: "test".to_string(),
        league_match: Vec::new(),
        categories: categories.iter().map(|c| c.to_string()).collect(),
    }
}

fn listed_league() -> LeagueTarget {
    LeagueTarget::listed(&League::new("Standard", "Standard"))
}

fn session(vocab: &CategoryVocabulary, category: Option<&str>, limit: usize) -> ScanSession {
    ScanSession::new(
        ScanRequest {
            league: listed_league(),
            category: category.map(str::to_string),
            limit,
            mode: LadderMode::Public,
        },
        vocab,
    )
    .unwrap()
}

fn controller(source: &Arc<StubSource>, page_size: u32) -> (ScanController, EventBus) {
    let bus = EventBus::new(100);
    let controller = ScanController::new(source.clone(), settings(page_size), bus.clone());
    (controller, bus)
}

#[tokio::test]
async fn test_stops_after_second_page_when_saturated() {
    // Page 1 holds only X; Y first appears on page 2
    let entries = vec![
        entry(1, "x1", "X"),
        entry(2, "x2", "X"),
        entry(3, "x3", "X"),
        entry(4, "y4", "Y"),
        entry(5, "x5", "X"),
        entry(6, "y6", "Y"),
        entry(7, "y7", "Y"),
        entry(8, "x8", "X"),
        entry(9, "x9", "X"),
    ];
    let source = Arc::new(StubSource::new(entries));
    let (controller, _bus) = controller(&source, 3);
    let vocab = vocabulary(&["X", "Y"]);
    let mut session = session(&vocab, None, 1);

    let outcome = controller.run(&mut session, &CancellationToken::new()).await;

    assert_eq!(outcome.unwrap(), StopReason::Saturated);
    assert_eq!(source.fetch_count(), 2);
    assert_eq!(session.state, ScanState::Stopped);
    assert_eq!(session.stop_reason, Some(StopReason::Saturated));

    let names: Vec<String> = session.standings().into_iter().map(|s| s.entry.name).collect();
    assert_eq!(names, vec!["x1", "y4"]);
}

#[tokio::test]
async fn test_single_page_suffices_when_both_categories_present() {
    let entries = vec![entry(1, "x1", "X"), entry(2, "y2", "Y"), entry(3, "x3", "X"), entry(4, "y4", "Y")];
    let source = Arc::new(StubSource::new(entries));
    let (controller, _bus) = controller(&source, 3);
    let vocab = vocabulary(&["X", "Y"]);
    let mut session = session(&vocab, None, 1);

    let outcome = controller.run(&mut session, &CancellationToken::new()).await;

    assert_eq!(outcome.unwrap(), StopReason::Saturated);
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn test_short_page_ends_ladder() {
    let source = Arc::new(StubSource::new(ladder(1, &["X"], 5)));
    let (controller, _bus) = controller(&source, 2);
    let vocab = vocabulary(&["X"]);
    let mut session = session(&vocab, None, 10);

    let outcome = controller.run(&mut session, &CancellationToken::new()).await;

    assert_eq!(outcome.unwrap(), StopReason::EndOfLadder);
    assert_eq!(source.offsets(), vec![0, 2, 4]);
    assert_eq!(session.all_seen_entries().len(), 5);
    assert_eq!(session.tally().retained("X").len(), 5);
}

#[tokio::test]
async fn test_depth_ceiling_bounds_public_scan() {
    let source = Arc::new(StubSource::new(ladder(1, &["X"], 20)));
    let bus = EventBus::new(100);
    let mut scan_settings = settings(2);
    scan_settings.public_depth_ceiling = 4;
    let controller = ScanController::new(source.clone(), scan_settings, bus);
    let vocab = vocabulary(&["X", "Y"]);
    let mut session = session(&vocab, None, 100);

    let outcome = controller.run(&mut session, &CancellationToken::new()).await;

    assert_eq!(outcome.unwrap(), StopReason::DepthCeiling);
    assert_eq!(source.offsets(), vec![0, 2]);
    assert_eq!(session.all_seen_entries().len(), 4);

    // Continuing a capped session fetches nothing more
    let outcome = controller
        .show_more_by(&mut session, 10, &CancellationToken::new())
        .await;
    assert_eq!(outcome.unwrap(), StopReason::DepthCeiling);
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn test_show_more_resumes_at_saved_offset() {
    let source = Arc::new(StubSource::new(ladder(1, &["X"], 10)));
    let (controller, _bus) = controller(&source, 2);
    let vocab = vocabulary(&["X"]);
    let mut session = session(&vocab, None, 1);
    let cancel = CancellationToken::new();

    assert_eq!(controller.run(&mut session, &cancel).await.unwrap(), StopReason::Saturated);
    assert_eq!(source.offsets(), vec![0]);
    let before: Vec<_> = session.tally().retained("X").to_vec();

    let outcome = controller.show_more_by(&mut session, 2, &cancel).await;

    assert_eq!(outcome.unwrap(), StopReason::Saturated);
    assert_eq!(session.limit(), 3);
    assert_eq!(source.offsets(), vec![0, 2]);

    let after = session.tally().retained("X");
    assert_eq!(after.len(), 3);
    assert_eq!(&after[..1], &before[..]);
}

#[tokio::test]
async fn test_cancel_discards_in_flight_page() {
    let source = Arc::new(StubSource::new(ladder(1, &["X"], 10)));
    let (controller, _bus) = controller(&source, 2);
    let vocab = vocabulary(&["X"]);
    let mut session = session(&vocab, None, 100);

    let cancel = CancellationToken::new();
    source.cancel_during_fetch(2, cancel.clone());

    let outcome = controller.run(&mut session, &cancel).await;

    assert!(matches!(outcome, Err(ScanError::Cancelled)));
    assert_eq!(session.state, ScanState::Cancelled);
    assert_eq!(session.all_seen_entries().len(), 2);
    assert_eq!(session.page_offset(), 2);

    // Resumable from where it stopped
    let outcome = controller.run(&mut session, &CancellationToken::new()).await;
    assert_eq!(outcome.unwrap(), StopReason::EndOfLadder);
    assert_eq!(session.all_seen_entries().len(), 10);
    assert_eq!(source.offsets(), vec![0, 2, 2, 4, 6, 8, 10]);
}

#[tokio::test]
async fn test_cancelled_before_start_fetches_nothing() {
    let source = Arc::new(StubSource::new(ladder(1, &["X"], 10)));
    let (controller, _bus) = controller(&source, 2);
    let vocab = vocabulary(&["X"]);
    let mut session = session(&vocab, None, 5);

    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(matches!(
        controller.run(&mut session, &cancel).await,
        Err(ScanError::Cancelled)
    ));
    assert_eq!(source.fetch_count(), 0);
}

#[tokio::test]
async fn test_fetch_error_keeps_partial_results() {
    let source = Arc::new(StubSource::new(ladder(1, &["X", "Y"], 8)).fail_at(4));
    let (controller, _bus) = controller(&source, 2);
    let vocab = vocabulary(&["X", "Y"]);
    let mut session = session(&vocab, None, 10);

    let outcome = controller.run(&mut session, &CancellationToken::new()).await;

    assert!(matches!(outcome, Err(ScanError::SourceUnavailable(_))));
    assert_eq!(session.state, ScanState::Failed);
    assert_eq!(session.all_seen_entries().len(), 4);
    assert_eq!(session.standings().len(), 4);

    source.heal(4);
    let outcome = controller.run(&mut session, &CancellationToken::new()).await;
    assert_eq!(outcome.unwrap(), StopReason::EndOfLadder);
    assert_eq!(session.all_seen_entries().len(), 8);
}

#[tokio::test]
async fn test_private_league_with_empty_first_page_not_found() {
    let source = Arc::new(StubSource::new(Vec::new()));
    let (controller, _bus) = controller(&source, 2);
    let vocab = vocabulary(&["X"]);
    let mut session = ScanSession::new(
        ScanRequest {
            league: LeagueTarget::private("My Private League (PL999)"),
            category: None,
            limit: 5,
            mode: LadderMode::Public,
        },
        &vocab,
    )
    .unwrap();

    let outcome = controller.run(&mut session, &CancellationToken::new()).await;

    match outcome {
        Err(ScanError::LeagueNotFound(id)) => assert_eq!(id, "My Private League (PL999)"),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(session.state, ScanState::Failed);
}

#[tokio::test]
async fn test_listed_league_with_empty_ladder_ends_normally() {
    let source = Arc::new(StubSource::new(Vec::new()));
    let (controller, _bus) = controller(&source, 2);
    let vocab = vocabulary(&["X"]);
    let mut session = session(&vocab, None, 5);

    let outcome = controller.run(&mut session, &CancellationToken::new()).await;

    assert_eq!(outcome.unwrap(), StopReason::EndOfLadder);
    assert!(session.standings().is_empty());
}

#[tokio::test]
async fn test_single_category_stops_on_count() {
    let entries = vec![
        entry(1, "a", "Y"),
        entry(2, "b", "X"),
        entry(3, "c", "Y"),
        entry(4, "d", "X"),
        entry(5, "e", "X"),
        entry(6, "f", "Y"),
    ];
    let source = Arc::new(StubSource::new(entries));
    let (controller, _bus) = controller(&source, 2);
    let vocab = vocabulary(&["X", "Y"]);
    let mut session = session(&vocab, Some("X"), 2);

    let outcome = controller.run(&mut session, &CancellationToken::new()).await;

    assert_eq!(outcome.unwrap(), StopReason::Saturated);
    assert_eq!(source.fetch_count(), 2);
    let standings = session.standings();
    assert_eq!(standings.len(), 2);
    assert!(standings.iter().all(|s| s.entry.category == "X"));
    assert_eq!(standings[1].category_rank, 2);
}

#[tokio::test]
async fn test_interim_standings_only_for_all_categories() {
    let source = Arc::new(StubSource::new(ladder(1, &["X", "Y"], 6)));
    let (controller, bus) = controller(&source, 2);
    let vocab = vocabulary(&["X", "Y"]);
    let mut rx = bus.subscribe();

    let mut all = session(&vocab, None, 3);
    controller.run(&mut all, &CancellationToken::new()).await.unwrap();

    let mut single = session(&vocab, Some("X"), 3);
    controller.run(&mut single, &CancellationToken::new()).await.unwrap();

    let mut interim = Vec::new();
    let mut finished = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            ScanEvent::InterimStandings { session_id, .. } => interim.push(session_id),
            ScanEvent::ScanFinished { .. } => finished += 1,
            _ => {}
        }
    }

    assert_eq!(finished, 2);
    assert!(!interim.is_empty());
    assert!(interim.iter().all(|id| *id == all.session_id));
}

#[tokio::test]
async fn test_duplicate_names_across_pages_skipped() {
    // The ladder shifted: "x2" appears again at the top of page 2
    let entries = vec![
        entry(1, "x1", "X"),
        entry(2, "x2", "X"),
        entry(3, "x2", "X"),
        entry(4, "x4", "X"),
    ];
    let source = Arc::new(StubSource::new(entries));
    let (controller, _bus) = controller(&source, 2);
    let vocab = vocabulary(&["X"]);
    let mut session = session(&vocab, None, 10);

    controller.run(&mut session, &CancellationToken::new()).await.unwrap();

    assert_eq!(session.all_seen_entries().len(), 3);
    assert_eq!(session.tally().seen_count("X"), 3);
}

#[tokio::test]
async fn test_standings_sorted_by_category_then_level() {
    let entries = vec![
        entry_at_level(1, "b-low", "B", 90),
        entry_at_level(2, "a-low", "A", 91),
        entry_at_level(3, "a-high", "A", 99),
        entry_at_level(4, "b-high", "B", 95),
    ];
    let source = Arc::new(StubSource::new(entries));
    let (controller, _bus) = controller(&source, 10);
    let vocab = vocabulary(&["B", "A"]);
    let mut session = session(&vocab, None, 5);

    controller.run(&mut session, &CancellationToken::new()).await.unwrap();

    let names: Vec<String> = session.standings().into_iter().map(|s| s.entry.name).collect();
    assert_eq!(names, vec!["a-high", "a-low", "b-high", "b-low"]);
}

#[tokio::test]
async fn test_spawned_scan_returns_session() {
    let source = Arc::new(StubSource::new(ladder(1, &["X"], 4)));
    let controller = Arc::new(ScanController::new(source.clone(), settings(2), EventBus::new(10)));
    let vocab = vocabulary(&["X"]);

    let task = controller.spawn(session(&vocab, None, 1), None, CancellationToken::new());
    let report = task.join().await.unwrap();
    assert_eq!(report.outcome.unwrap(), StopReason::Saturated);
    assert_eq!(report.session.page_offset(), 2);

    let task = controller.spawn(report.session, Some(2), CancellationToken::new());
    let report = task.join().await.unwrap();
    assert_eq!(report.outcome.unwrap(), StopReason::Saturated);
    assert_eq!(report.session.limit(), 3);
    assert_eq!(source.offsets(), vec![0, 2]);
}
