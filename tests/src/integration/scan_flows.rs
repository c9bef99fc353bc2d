//! # Bulk Scan Flows
//!
//! Pause, resume and limit behaviour of the redemption scanner, with the
//! checkpoint persisted through the session file store.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc::unbounded_channel;
use tokio_util::sync::CancellationToken;
use trove_history::{
    CheckpointStore, EventKey, InMemoryCheckpointStore, RedemptionScanner, ScanMode, ScanState,
    ScanSupervisor, ScanUpdate, SessionFileCheckpointStore, TroveError, DEFAULT_SESSION_KEY,
};

use super::fixtures::{config, drain, seeded_source};

fn keys(records: &[trove_history::RedemptionRecord]) -> Vec<EventKey> {
    records.iter().map(|r| r.key()).collect()
}

#[tokio::test]
async fn test_resume_matches_uninterrupted_scan() {
    let config = config(50);
    let source = seeded_source(&config.contracts, 5);
    let (tx, _rx) = unbounded_channel();

    let reference = {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let mut scanner = RedemptionScanner::new(source.clone(), store, &config);
        scanner
            .start(None, &CancellationToken::new(), &tx)
            .await
            .unwrap()
    };
    assert_eq!(reference.state, ScanState::Completed);
    assert_eq!(reference.events.len(), 5);

    let dir = tempfile::tempdir().unwrap();
    let open_store = || Arc::new(SessionFileCheckpointStore::new(dir.path(), DEFAULT_SESSION_KEY));

    // Sweep, two candidates at two calls each, then the third candidate's
    // previous-state lookup is cut short.
    let calls_before = source.call_count();
    let cancel = CancellationToken::new();
    source.cancel_after(calls_before + 6, cancel.clone());

    let mut first = RedemptionScanner::new(source.clone(), open_store(), &config);
    let paused = first.start(None, &cancel, &tx).await.unwrap();
    assert_eq!(paused.state, ScanState::Paused);
    assert_eq!(paused.events.len(), 2);

    let saved = open_store().load().unwrap().unwrap();
    assert_eq!(saved.last_processed_index(), Some(1));
    assert_eq!(keys(&saved.redemptions), keys(&paused.events));
    assert!(!saved.completed);
    drop(first);

    // A new process picks the checkpoint up from disk.
    let mut second = RedemptionScanner::new(source.clone(), open_store(), &config);
    let resumed = second
        .resume(&CancellationToken::new(), &tx)
        .await
        .unwrap();
    assert_eq!(resumed.state, ScanState::Completed);
    assert_eq!(keys(&resumed.events), keys(&reference.events));
    assert_eq!(resumed.events, reference.events);
    assert!(open_store().load().unwrap().unwrap().completed);
}

#[tokio::test]
async fn test_resume_from_explicit_index() {
    let config = config(50);
    let source = seeded_source(&config.contracts, 4);
    let store = Arc::new(InMemoryCheckpointStore::new());
    let (tx, mut rx) = unbounded_channel();

    let cancel = CancellationToken::new();
    source.cancel_after(4, cancel.clone());
    let mut scanner = RedemptionScanner::new(source.clone(), store.clone(), &config);
    let paused = scanner.start(None, &cancel, &tx).await.unwrap();
    assert_eq!(paused.events.len(), 1);
    let checkpoint = scanner.checkpoint().unwrap().unwrap();
    assert_eq!(checkpoint.last_processed_index(), Some(0));
    drain(&mut rx);

    let resumed = scanner
        .start(Some(0), &CancellationToken::new(), &tx)
        .await
        .unwrap();
    assert_eq!(resumed.state, ScanState::Completed);
    assert_eq!(resumed.events.len(), 4);

    let updates = drain(&mut rx);
    let new_events = updates
        .iter()
        .filter(|u| matches!(u, ScanUpdate::NewEvent { .. }))
        .count();
    assert_eq!(new_events, 3);
}

#[tokio::test]
async fn test_no_duplicates_when_resuming_over_accepted_candidates() {
    let config = config(50);
    let source = seeded_source(&config.contracts, 3);
    let store = Arc::new(InMemoryCheckpointStore::new());
    let (tx, _rx) = unbounded_channel();

    let mut scanner = RedemptionScanner::new(source.clone(), store.clone(), &config);
    let cancel = CancellationToken::new();
    source.cancel_after(6, cancel.clone());
    scanner.start(None, &cancel, &tx).await.unwrap();

    // Rewind past records that are already in the checkpoint.
    let mut checkpoint = store.load().unwrap().unwrap();
    checkpoint.progress.last_processed_index = None;
    checkpoint.progress.current = 0;
    store.save(&checkpoint).unwrap();

    let report = scanner
        .resume(&CancellationToken::new(), &tx)
        .await
        .unwrap();
    let seen: HashSet<EventKey> = keys(&report.events).into_iter().collect();
    assert_eq!(report.events.len(), 3);
    assert_eq!(seen.len(), 3);
}

#[tokio::test]
async fn test_limit_yields_exactly_one_complete() {
    let config = config(50);
    let source = seeded_source(&config.contracts, 60);
    let store = Arc::new(InMemoryCheckpointStore::new());
    let (tx, mut rx) = unbounded_channel();

    let mut scanner = RedemptionScanner::new(source, store.clone(), &config);
    let report = scanner
        .start(None, &CancellationToken::new(), &tx)
        .await
        .unwrap();
    assert_eq!(report.state, ScanState::Completed);
    assert_eq!(report.events.len(), 50);
    assert_eq!(report.total, 60);

    let updates = drain(&mut rx);
    let completes: Vec<&ScanUpdate> = updates
        .iter()
        .filter(|u| matches!(u, ScanUpdate::Complete { .. }))
        .collect();
    assert_eq!(completes.len(), 1);
    match updates.last() {
        Some(ScanUpdate::Complete { events, message }) => {
            assert_eq!(events.len(), 50);
            assert_eq!(message, "Search complete");
        }
        other => panic!("expected Complete last, got {other:?}"),
    }
    for update in &updates {
        if let ScanUpdate::NewEvent { events, .. } = update {
            assert!(events.len() <= 50);
        }
    }

    // Newest first: the ten oldest redemptions fall past the cap.
    let newest = &report.events[0].event;
    assert_eq!(newest.tx_hash, "0xred59");
    assert!(report
        .events
        .windows(2)
        .all(|w| w[0].event.block_number > w[1].event.block_number));
    assert!(store.load().unwrap().unwrap().completed);
}

#[tokio::test]
async fn test_pause_during_sweep_leaves_nothing_to_resume() {
    let config = config(50);
    let source = seeded_source(&config.contracts, 3);
    let store = Arc::new(InMemoryCheckpointStore::new());
    let (tx, _rx) = unbounded_channel();

    let cancel = CancellationToken::new();
    source.cancel_after(1, cancel.clone());
    let mut scanner = RedemptionScanner::new(source, store.clone(), &config);
    let report = scanner.start(None, &cancel, &tx).await.unwrap();
    assert_eq!(report.state, ScanState::Paused);
    assert!(report.events.is_empty());
    assert!(store.load().unwrap().is_none());

    let result = scanner.resume(&CancellationToken::new(), &tx).await;
    assert!(matches!(result, Err(TroveError::CheckpointMissing)));
}

#[tokio::test]
async fn test_supervisor_pause_then_resume() {
    let config = config(50);
    let source = seeded_source(&config.contracts, 4);
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionFileCheckpointStore::new(dir.path(), DEFAULT_SESSION_KEY));
    let scanner = RedemptionScanner::new(source.clone(), store.clone(), &config);
    let mut supervisor = ScanSupervisor::new(scanner);
    let (tx, _rx) = unbounded_channel();

    let token = supervisor.launch(ScanMode::Fresh, tx.clone()).await.unwrap();
    source.cancel_after(4, token);
    let paused = supervisor.wait().await.unwrap().unwrap();
    assert_eq!(paused.state, ScanState::Paused);
    assert_eq!(supervisor.state(), ScanState::Paused);
    assert!(store.path().exists());

    supervisor.launch(ScanMode::Resume, tx).await.unwrap();
    let done = supervisor.wait().await.unwrap().unwrap();
    assert_eq!(done.state, ScanState::Completed);
    assert_eq!(done.events.len(), 4);
    assert_eq!(done.events[0].event.tx_hash, "0xred3");
}
