// State management module
//
// Wraps AppState in Arc<RwLock<T>> and emits change events for the console presenter.

use crate::models::{
    AppState, CleanOptions, ConfigKey, FileStatus, LogEntry, ManagedFile, RunCounters, RunMode,
    RunOutcome, RunSummary,
};
use crate::services::output::OutputLine;
use indexmap::IndexMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::broadcast;

/// Change events emitted when state is modified
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The log view was emptied (a new run started)
    LogCleared,

    /// A session entered `Starting`
    RunStarted { session_id: u64, mode: RunMode },

    /// The subprocess was spawned
    RunRunning { session_id: u64 },

    /// The file table was replaced by a fresh scan
    ListingRefreshed { detected: usize },

    /// One row of the file table changed
    FileStatusChanged {
        name: String,
        status: FileStatus,
        fixes: u32,
        elapsed: String,
    },

    StatusTextChanged { text: String },

    CountersChanged { mode: RunMode, counters: RunCounters },

    LogAppended { entry: LogEntry },

    RunFinished { summary: RunSummary },

    /// The in-memory mirror of the configuration file changed
    OptionsChanged,
}

/// Thread-safe state manager with event emission
///
/// - Provides thread-safe access to [`AppState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// Every mutation goes through [`update()`](Self::update), so one update is
/// one atomic step as far as readers and subscribers are concerned. The run
/// controller relies on that to fold a whole stdout chunk at once.
pub struct StateManager {
    state: Arc<RwLock<AppState>>,

    /// Multiple subscribers can listen for state changes
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with default state and a 1024-event buffer
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(1024);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
        }
    }

    /// Clone of the whole state, safe to use without holding locks
    pub fn snapshot(&self) -> AppState {
        self.state.read().unwrap().clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let running = state_manager.read(|state| state.is_running());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap();
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// Captures the old state, applies `update_fn`, diffs, and broadcasts the
    /// detected changes in order. Returns the update function's result along
    /// with the emitted events.
    pub fn update_with<F, R>(&self, update_fn: F) -> (R, Vec<StateChange>)
    where
        F: FnOnce(&mut AppState) -> R,
    {
        let mut state = self.state.write().unwrap();
        let old_state = state.clone();

        let result = update_fn(&mut state);

        let changes = self.detect_changes(&old_state, &state);
        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        (result, changes)
    }

    /// Update the state and emit change events
    ///
    /// # Example
    /// ```ignore
    /// state_manager.update(|state| {
    ///     state.status_text = "Reading foo.mdl".to_string();
    /// });
    /// ```
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        self.update_with(update_fn).1
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// Detect what changed between two states and generate events
    fn detect_changes(&self, old: &AppState, new: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        let log_cleared = old.log_epoch != new.log_epoch;
        if log_cleared {
            changes.push(StateChange::LogCleared);
        }

        // A new session (possibly right after another one finished)
        let old_id = old.active_session_id();
        let new_id = new.active_session_id();
        if let Some(session) = new.session.as_ref().filter(|_| new_id != old_id) {
            changes.push(StateChange::RunStarted {
                session_id: session.id,
                mode: session.mode,
            });
        }

        if new.phase == crate::models::RunPhase::Running && old.phase != new.phase {
            if let Some(session_id) = new_id {
                changes.push(StateChange::RunRunning { session_id });
            }
        }

        if old.listing_generation != new.listing_generation {
            changes.push(StateChange::ListingRefreshed {
                detected: new.files.len(),
            });
        } else {
            for (before, after) in old.files.iter().zip(&new.files) {
                if before != after {
                    changes.push(StateChange::FileStatusChanged {
                        name: after.name.clone(),
                        status: after.status,
                        fixes: after.fixes,
                        elapsed: after.elapsed.clone(),
                    });
                }
            }
        }

        if old.status_text != new.status_text {
            changes.push(StateChange::StatusTextChanged {
                text: new.status_text.clone(),
            });
        }

        if old.counters != new.counters || old.counter_mode != new.counter_mode {
            changes.push(StateChange::CountersChanged {
                mode: new.counter_mode,
                counters: new.counters,
            });
        }

        let first_new = if log_cleared { 0 } else { old.log.len() };
        for entry in new.log.iter().skip(first_new) {
            changes.push(StateChange::LogAppended {
                entry: entry.clone(),
            });
        }

        for summary in new.finished.iter().skip(old.finished.len()) {
            changes.push(StateChange::RunFinished {
                summary: summary.clone(),
            });
        }

        if old.options != new.options {
            changes.push(StateChange::OptionsChanged);
        }

        changes
    }

    // Convenience methods for common state updates

    /// Apply freshly loaded configuration entries to the options mirror.
    ///
    /// Entries are applied in file order, so the last occurrence of a key wins.
    pub fn load_options(&self, entries: &IndexMap<ConfigKey, String>) -> Vec<StateChange> {
        self.update(|state| {
            let mut options = CleanOptions::default();
            let mut unknown = 0usize;
            for (key, value) in entries {
                if !options.apply(key, value) {
                    tracing::debug!("Ignoring unknown configuration key {}", key);
                    unknown += 1;
                }
            }
            state.options = options;

            tracing::info!(
                "Loaded options: indir={}, pattern={}, {} unknown key(s)",
                state.options.in_dir(),
                state.options.pattern(),
                unknown
            );
        })
    }

    pub fn set_options(&self, options: CleanOptions) -> Vec<StateChange> {
        self.update(|state| state.options = options)
    }

    /// Replace the file table. Ignored while a run is active; the rescan is
    /// deferred instead.
    pub fn replace_listing(&self, files: Vec<ManagedFile>) -> Vec<StateChange> {
        self.update(|state| {
            if state.is_running() {
                state.rescan_pending = true;
            } else {
                state.replace_listing(files);
            }
        })
    }

    /// Start a session and install the listing it runs against. Returns `None`
    /// when a session is already active.
    pub fn begin_session(
        &self,
        mode: RunMode,
        files: Vec<ManagedFile>,
        now: Instant,
    ) -> Option<u64> {
        self.update_with(|state| {
            if state.is_running() {
                return None;
            }
            let id = state.start_session(mode, now);
            state.replace_listing(files);
            state.rescan_pending = false;
            Some(id)
        })
        .0
    }

    pub fn mark_running(&self, session_id: u64) -> bool {
        self.update_with(|state| state.mark_running(session_id)).0
    }

    /// Fold a chunk of classified lines in one atomic update.
    pub fn apply_output(&self, session_id: u64, lines: &[OutputLine], now: Instant) -> usize {
        self.update_with(|state| {
            lines
                .iter()
                .filter_map(|line| state.apply_output(session_id, line, now))
                .count()
        })
        .0
    }

    /// Close a session, appending `trailing` log entries first (stderr, abort notice).
    pub fn end_session(
        &self,
        session_id: u64,
        outcome: RunOutcome,
        trailing: Vec<LogEntry>,
        now: Instant,
    ) -> Option<RunSummary> {
        self.update_with(|state| {
            if state.active_session_id() != Some(session_id) {
                return None;
            }
            for entry in trailing {
                state.push_log(entry);
            }
            state.finish_session(session_id, outcome, now)
        })
        .0
    }

    pub fn append_log(&self, entry: LogEntry) -> Vec<StateChange> {
        self.update(|state| state.push_log(entry))
    }

    pub fn set_status_text(&self, text: impl Into<String>) -> Vec<StateChange> {
        let text = text.into();
        self.update(|state| state.status_text = text)
    }

    pub fn defer_rescan(&self) {
        self.update(|state| state.rescan_pending = true);
    }

    /// Clear and return the deferred-rescan flag.
    pub fn take_rescan_pending(&self) -> bool {
        self.update_with(|state| std::mem::take(&mut state.rescan_pending))
            .0
    }

    pub fn is_running(&self) -> bool {
        self.read(|state| state.is_running())
    }

    pub fn summary(&self, session_id: u64) -> Option<RunSummary> {
        self.read(|state| state.find_summary(session_id).cloned())
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
