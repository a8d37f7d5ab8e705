//! Integration tests for StateManager with state change events
//!
//! These tests verify that the StateManager correctly:
//! - Emits state change events on mutations
//! - Supports multiple subscribers
//! - Folds classified tool output into the file table and counters
//! - Ignores output from sessions that are no longer active

use cleanmodels_front::models::{
    Encoding, FileStatus, IDLE_STATUS, LogEntry, LogStyle, ManagedFile, RUN_BANNER, RunCounters,
    RunMode, RunOutcome,
};
use cleanmodels_front::services::{OutputClassifier, OutputLine};
use cleanmodels_front::{StateChange, StateManager};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

fn listing(names: &[&str]) -> Vec<ManagedFile> {
    names
        .iter()
        .map(|name| ManagedFile::new(*name, 128, Encoding::Ascii))
        .collect()
}

fn classify(lines: &[&str]) -> Vec<OutputLine> {
    OutputClassifier::new().classify_lines(lines.iter().map(|l| l.to_string()))
}

async fn next_event(rx: &mut broadcast::Receiver<StateChange>) -> StateChange {
    timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed")
}

/// Every event currently queued.
fn drain(rx: &mut broadcast::Receiver<StateChange>) -> Vec<StateChange> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_begin_session_events() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    let session_id = state
        .begin_session(RunMode::Clean, listing(&["a.mdl", "b.mdl"]), Instant::now())
        .unwrap();

    assert_eq!(next_event(&mut rx).await, StateChange::LogCleared);
    assert_eq!(
        next_event(&mut rx).await,
        StateChange::RunStarted {
            session_id,
            mode: RunMode::Clean
        }
    );
    assert_eq!(
        next_event(&mut rx).await,
        StateChange::ListingRefreshed { detected: 2 }
    );

    let rest = drain(&mut rx);
    assert!(rest.contains(&StateChange::LogAppended {
        entry: LogEntry::plain(RUN_BANNER)
    }));
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = Arc::new(StateManager::new());
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();
    let mut rx3 = state.subscribe();

    state.set_status_text("Decompiling foo.mdl");

    let expected = StateChange::StatusTextChanged {
        text: "Decompiling foo.mdl".to_string(),
    };
    assert_eq!(next_event(&mut rx1).await, expected);
    assert_eq!(next_event(&mut rx2).await, expected);
    assert_eq!(next_event(&mut rx3).await, expected);
}

#[tokio::test]
async fn test_successful_file_lifecycle() {
    let state = Arc::new(StateManager::new());
    let t0 = Instant::now();
    let session_id = state
        .begin_session(RunMode::Clean, listing(&["foo.mdl"]), t0)
        .unwrap();
    state.mark_running(session_id);
    let mut rx = state.subscribe();

    let logged = state.apply_output(
        session_id,
        &classify(&[
            "Attempting to read foo.mdl",
            "MDL foo.mdl loaded.",
            "........",
            "Fixes made = 3",
            "foo.mdl written.",
        ]),
        t0 + Duration::from_millis(2_250),
    );
    // The divider is not logged
    assert_eq!(logged, 4);

    let snapshot = state.snapshot();
    let row = &snapshot.files[0];
    assert_eq!(row.status, FileStatus::Succeeded);
    assert_eq!(row.fixes, 3);
    assert_eq!(snapshot.counters, RunCounters { cleaned: 1, failed: 0 });

    // One update, so intermediate statuses collapse into the final one
    let events = drain(&mut rx);
    let file_events: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, StateChange::FileStatusChanged { .. }))
        .collect();
    assert_eq!(file_events.len(), 1);
    assert!(events.contains(&StateChange::CountersChanged {
        mode: RunMode::Clean,
        counters: RunCounters { cleaned: 1, failed: 0 }
    }));
    assert!(events.contains(&StateChange::LogAppended {
        entry: LogEntry::new("foo.mdl written.", LogStyle::Success)
    }));
}

#[tokio::test]
async fn test_failed_file_lifecycle() {
    let state = Arc::new(StateManager::new());
    let now = Instant::now();
    let session_id = state
        .begin_session(RunMode::Clean, listing(&["foo.mdl"]), now)
        .unwrap();
    state.mark_running(session_id);

    state.apply_output(
        session_id,
        &classify(&["Attempting to read foo.mdl", "*** Cannot open foo.mdl"]),
        now,
    );

    state.read(|s| {
        assert_eq!(s.files[0].status, FileStatus::Failed);
        assert_eq!(s.counters, RunCounters { cleaned: 0, failed: 1 });
        assert_eq!(
            s.log.last(),
            Some(&LogEntry::new("*** Cannot open foo.mdl", LogStyle::Error))
        );
    });
}

#[tokio::test]
async fn test_unknown_file_is_a_miss() {
    let state = Arc::new(StateManager::new());
    let now = Instant::now();
    let session_id = state
        .begin_session(RunMode::Clean, listing(&["foo.mdl"]), now)
        .unwrap();

    state.apply_output(
        session_id,
        &classify(&["Attempting to read ghost.mdl", "ghost.mdl written."]),
        now,
    );

    state.read(|s| {
        assert_eq!(s.files[0].status, FileStatus::None);
        assert_eq!(s.counters.cleaned, 1, "counters move even without a row");
    });
}

#[tokio::test]
async fn test_stale_session_output_is_ignored() {
    let state = Arc::new(StateManager::new());
    let now = Instant::now();

    let first = state
        .begin_session(RunMode::Clean, listing(&["foo.mdl"]), now)
        .unwrap();
    state.end_session(first, RunOutcome::Aborted, vec![LogEntry::plain("Aborted")], now);

    let second = state
        .begin_session(RunMode::Clean, listing(&["foo.mdl"]), now)
        .unwrap();
    assert_ne!(first, second);

    // Late output of the killed process
    let logged = state.apply_output(
        first,
        &classify(&["Attempting to read foo.mdl", "foo.mdl written."]),
        now,
    );
    assert_eq!(logged, 0);
    assert!(
        state
            .end_session(first, RunOutcome::Completed { exit_code: Some(0) }, vec![], now)
            .is_none()
    );

    state.read(|s| {
        assert_eq!(s.counters, RunCounters::default());
        assert_eq!(s.files[0].status, FileStatus::None);
        assert_eq!(s.active_session_id(), Some(second));
    });
}

#[tokio::test]
async fn test_end_session_records_summary() {
    let state = Arc::new(StateManager::new());
    let t0 = Instant::now();
    let session_id = state
        .begin_session(RunMode::Decompile, listing(&["a.mdl"]), t0)
        .unwrap();
    state.mark_running(session_id);
    state.apply_output(
        session_id,
        &classify(&["Attempting to read a.mdl", "a.mdl written."]),
        t0,
    );
    let mut rx = state.subscribe();

    let summary = state
        .end_session(
            session_id,
            RunOutcome::Completed { exit_code: Some(0) },
            vec![LogEntry::plain("warning on stderr")],
            t0 + Duration::from_secs(3),
        )
        .unwrap();

    assert_eq!(summary.cleaned, 1);
    assert_eq!(summary.mode, RunMode::Decompile);
    assert_eq!(summary.elapsed, Duration::from_secs(3));
    assert_eq!(state.summary(session_id), Some(summary.clone()));
    assert!(!state.is_running());

    let events = drain(&mut rx);
    assert!(events.contains(&StateChange::StatusTextChanged {
        text: IDLE_STATUS.to_string()
    }));
    assert!(events.contains(&StateChange::LogAppended {
        entry: LogEntry::plain("warning on stderr")
    }));
    assert_eq!(events.last(), Some(&StateChange::RunFinished { summary }));
}

#[tokio::test]
async fn test_listing_deferred_while_running() {
    let state = Arc::new(StateManager::new());
    let session_id = state
        .begin_session(RunMode::Clean, listing(&["a.mdl"]), Instant::now())
        .unwrap();

    state.replace_listing(listing(&["a.mdl", "b.mdl"]));
    state.read(|s| {
        assert_eq!(s.files.len(), 1);
        assert!(s.rescan_pending);
    });

    state.end_session(session_id, RunOutcome::Aborted, vec![], Instant::now());
    assert!(state.take_rescan_pending());
    assert!(!state.take_rescan_pending());

    state.replace_listing(listing(&["a.mdl", "b.mdl"]));
    assert_eq!(state.read(|s| s.files.len()), 2);
}

#[tokio::test]
async fn test_only_one_session_at_a_time() {
    let state = Arc::new(StateManager::new());
    let now = Instant::now();
    assert!(state.begin_session(RunMode::Clean, vec![], now).is_some());
    assert!(state.begin_session(RunMode::Decompile, vec![], now).is_none());
}

#[tokio::test]
async fn test_concurrent_state_access() {
    let state = Arc::new(StateManager::new());
    let mut handles = vec![];

    for i in 0..10 {
        let state_clone = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            state_clone.append_log(LogEntry::plain(format!("line {}", i)));
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(state.read(|s| s.log.len()), 10);
}
