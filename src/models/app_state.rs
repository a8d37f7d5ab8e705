use crate::models::file_entry::{FileStatus, ManagedFile, format_elapsed};
use crate::models::options::CleanOptions;
use crate::services::output::{OutputEvent, OutputLine};
use std::fmt;
use std::time::{Duration, Instant};

/// First log line of every run.
pub const RUN_BANNER: &str = "Running cleanmodels";

/// Status text shown while no run is active.
pub const IDLE_STATUS: &str = "Idle";

/// What the tool is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Clean every model matched by the configuration file
    Clean,
    /// Convert binary models to ASCII (`-d`)
    Decompile,
}

impl RunMode {
    /// Label of the success counter for this mode.
    pub fn counter_label(&self) -> &'static str {
        match self {
            RunMode::Clean => "Files Cleaned",
            RunMode::Decompile => "Files Decompiled",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Clean => f.write_str("clean"),
            RunMode::Decompile => f.write_str("decompile"),
        }
    }
}

/// Lifecycle of the run controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    /// Requested, subprocess not spawned yet
    Starting,
    Running,
}

/// Presentation style of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStyle {
    Plain,
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub text: String,
    pub style: LogStyle,
}

impl LogEntry {
    pub fn new(text: impl Into<String>, style: LogStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, LogStyle::Plain)
    }
}

/// Success/failure counters shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunCounters {
    pub cleaned: usize,
    pub failed: usize,
}

/// The active subprocess execution.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSession {
    pub id: u64,
    pub mode: RunMode,
    pub started_at: Instant,
    pub current_file: Option<String>,
    pub file_started_at: Option<Instant>,
    pub cleaned: usize,
    pub failed: usize,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { exit_code: Option<i32> },
    Aborted,
    LaunchFailed,
}

/// Record of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub id: u64,
    pub mode: RunMode,
    pub cleaned: usize,
    pub failed: usize,
    pub outcome: RunOutcome,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn aborted(&self) -> bool {
        self.outcome == RunOutcome::Aborted
    }
}

/// Everything the front-end knows at a given moment.
///
/// Owned by [`StateManager`](crate::state::StateManager) behind a `RwLock`;
/// mutate it only through [`StateManager::update`](crate::state::StateManager::update)
/// so change events are emitted.
#[derive(Clone, Debug)]
pub struct AppState {
    // Mirror of the tool's configuration file
    pub options: CleanOptions,

    // Directory listing
    pub files: Vec<ManagedFile>,
    pub listing_generation: u64,
    pub rescan_pending: bool,

    // Run state
    pub phase: RunPhase,
    pub session: Option<RunSession>,
    pub counters: RunCounters,
    pub counter_mode: RunMode,
    pub status_text: String,
    pub finished: Vec<RunSummary>,
    next_session_id: u64,

    // Log view; the epoch changes whenever the log is cleared
    pub log: Vec<LogEntry>,
    pub log_epoch: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            options: CleanOptions::default(),
            files: Vec::new(),
            listing_generation: 0,
            rescan_pending: false,
            phase: RunPhase::Idle,
            session: None,
            counters: RunCounters::default(),
            counter_mode: RunMode::Clean,
            status_text: IDLE_STATUS.to_string(),
            finished: Vec::new(),
            next_session_id: 1,
            log: Vec::new(),
            log_epoch: 0,
        }
    }
}

impl AppState {
    pub fn is_running(&self) -> bool {
        self.phase != RunPhase::Idle
    }

    pub fn active_session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn find_file_mut(&mut self, name: &str) -> Option<&mut ManagedFile> {
        self.files.iter_mut().find(|f| f.name == name)
    }

    pub fn find_summary(&self, session_id: u64) -> Option<&RunSummary> {
        self.finished.iter().find(|s| s.id == session_id)
    }

    pub fn push_log(&mut self, entry: LogEntry) {
        self.log.push(entry);
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
        self.log_epoch += 1;
    }

    /// Replace the file table with a fresh scan. Counters start over.
    pub fn replace_listing(&mut self, files: Vec<ManagedFile>) {
        self.files = files;
        self.listing_generation += 1;
        self.counters = RunCounters::default();
    }

    /// Open a new session: reset the log and counters, enter `Starting`.
    ///
    /// Returns the new session id.
    pub fn start_session(&mut self, mode: RunMode, now: Instant) -> u64 {
        let id = self.next_session_id;
        self.next_session_id += 1;

        self.clear_log();
        self.push_log(LogEntry::plain(RUN_BANNER));
        self.counters = RunCounters::default();
        self.counter_mode = mode;
        self.phase = RunPhase::Starting;
        self.session = Some(RunSession {
            id,
            mode,
            started_at: now,
            current_file: None,
            file_started_at: None,
            cleaned: 0,
            failed: 0,
        });
        id
    }

    pub fn mark_running(&mut self, session_id: u64) -> bool {
        if self.active_session_id() == Some(session_id) && self.phase == RunPhase::Starting {
            self.phase = RunPhase::Running;
            true
        } else {
            false
        }
    }

    /// Close the session with the given id and record its summary.
    ///
    /// Does nothing (returns `None`) when that session is no longer active.
    pub fn finish_session(
        &mut self,
        session_id: u64,
        outcome: RunOutcome,
        now: Instant,
    ) -> Option<RunSummary> {
        if self.active_session_id() != Some(session_id) {
            return None;
        }
        let session = self.session.take()?;

        let summary = RunSummary {
            id: session.id,
            mode: session.mode,
            cleaned: session.cleaned,
            failed: session.failed,
            outcome,
            elapsed: now.saturating_duration_since(session.started_at),
        };

        self.phase = RunPhase::Idle;
        self.status_text = IDLE_STATUS.to_string();
        self.finished.push(summary.clone());
        Some(summary)
    }

    /// Fold one classified output line into the session and file table.
    ///
    /// Lines from any session other than the active one are ignored, so a
    /// killed process can never touch a newer session's counters. Returns the
    /// log entry appended for the line, if any.
    pub fn apply_output(
        &mut self,
        session_id: u64,
        line: &OutputLine,
        now: Instant,
    ) -> Option<LogEntry> {
        if self.active_session_id() != Some(session_id) {
            tracing::debug!(
                "Dropping output of stale session {}: {}",
                session_id,
                line.text
            );
            return None;
        }

        let entry = match &line.event {
            OutputEvent::Divider => return None,
            OutputEvent::ReadStarted { file } => {
                if let Some(session) = self.session.as_mut() {
                    session.current_file = Some(file.clone());
                    session.file_started_at = Some(now);
                }
                self.set_current_status(FileStatus::Reading, now);
                self.status_text = format!("Reading {}", file);
                LogEntry::new(line.text.clone(), LogStyle::Info)
            }
            OutputEvent::ModelLoaded { file } => {
                self.set_current_status(FileStatus::Cleaning, now);
                let current = self.current_file().unwrap_or(file).to_string();
                self.status_text = format!("Cleaning {}", current);
                LogEntry::new(line.text.clone(), LogStyle::Info)
            }
            OutputEvent::BinaryImport { file } => {
                self.status_text = format!("Decompiling {}", file);
                LogEntry::plain(line.text.clone())
            }
            OutputEvent::FixesMade { count } => {
                if let Some(row) = self.current_row_mut() {
                    row.fixes = *count;
                }
                LogEntry::plain(line.text.clone())
            }
            OutputEvent::Written => {
                if let Some(session) = self.session.as_mut() {
                    session.cleaned += 1;
                }
                self.counters.cleaned += 1;
                self.set_current_status(FileStatus::Succeeded, now);
                LogEntry::new(line.text.clone(), LogStyle::Success)
            }
            OutputEvent::Failed => {
                if let Some(session) = self.session.as_mut() {
                    session.failed += 1;
                }
                self.counters.failed += 1;
                self.set_current_status(FileStatus::Failed, now);
                LogEntry::new(line.text.clone(), LogStyle::Error)
            }
            OutputEvent::Other => LogEntry::plain(line.text.clone()),
        };

        self.push_log(entry.clone());
        Some(entry)
    }

    fn current_file(&self) -> Option<&str> {
        self.session.as_ref()?.current_file.as_deref()
    }

    fn current_row_mut(&mut self) -> Option<&mut ManagedFile> {
        let name = self.current_file()?.to_string();
        let row = self.find_file_mut(&name);
        if row.is_none() {
            tracing::warn!("Output refers to {} which is not in the listing", name);
        }
        row
    }

    fn set_current_status(&mut self, status: FileStatus, now: Instant) {
        let started = self
            .session
            .as_ref()
            .map(|s| s.file_started_at.unwrap_or(s.started_at));

        match self.current_row_mut() {
            Some(row) => {
                row.status = status;
                if status.is_finished() {
                    if let Some(started) = started {
                        row.elapsed = format_elapsed(now.saturating_duration_since(started));
                    }
                }
            }
            None => {
                if self.current_file().is_none() {
                    tracing::warn!("Output reported {:?} before any file was read", status);
                }
            }
        }
    }
}
