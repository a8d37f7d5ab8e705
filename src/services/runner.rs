//! Drives one `cleanmodels-cli` invocation at a time.
//!
//! A run request spawns the tool and returns immediately; a tokio task reads
//! stdout in chunks, re-splits it into lines, classifies them and folds each
//! chunk into the [`StateManager`] in one update. A request that arrives while
//! a run is active kills that run instead of starting another.

use crate::metrics::Metrics;
use crate::models::{LogEntry, LogStyle, ManagedFile, RunMode, RunOutcome, RunSummary};
use crate::services::output::{LineSplitter, OutputClassifier, OutputEvent, OutputLine};
use crate::services::scanner::{ScanError, scan_directory};
use crate::services::tool_locator::TOOL_BINARY_NAME;
use crate::services::watcher::RescanTarget;
use crate::state::StateManager;
use camino::Utf8PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Size of one stdout read.
const READ_CHUNK: usize = 4096;

/// Log line shown when the tool cannot be started.
pub fn launch_failure_message() -> String {
    format!(
        "Failed to run clean! Does the {} executable exist in the working directory or your PATH?",
        TOOL_BINARY_NAME
    )
}

/// Source of timestamps for elapsed-time stamping.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Input directory does not exist: {0}")]
    InvalidInputDir(Utf8PathBuf),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("A run is already starting")]
    Busy,

    #[error("{message} ({program})", message = launch_failure_message())]
    LaunchFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Run task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("No summary recorded for session {0}")]
    MissingSummary(u64),
}

/// Where and how the tool is invoked.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Executable to spawn; a bare name is resolved through `PATH`
    pub program: Utf8PathBuf,
    pub work_dir: Utf8PathBuf,
    pub config_file_name: String,
}

impl RunSettings {
    pub fn args(&self, mode: RunMode) -> Vec<String> {
        match mode {
            RunMode::Clean => vec![self.config_file_name.clone()],
            RunMode::Decompile => vec!["-d".to_string()],
        }
    }
}

/// Outcome of [`RunController::request_run`].
#[derive(Debug)]
pub enum RunRequest {
    Started(RunHandle),
    /// A run was active; it has been told to stop
    Aborted { session_id: u64 },
}

/// Handle on a started run.
pub struct RunHandle {
    session_id: u64,
    task: JoinHandle<Option<RunSummary>>,
    state: Arc<StateManager>,
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl RunHandle {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Wait for the run to end.
    pub async fn wait(self) -> Result<RunSummary, RunError> {
        let session_id = self.session_id;
        match self.task.await? {
            Some(summary) => Ok(summary),
            None => self
                .state
                .summary(session_id)
                .ok_or(RunError::MissingSummary(session_id)),
        }
    }
}

struct ActiveRun {
    session_id: u64,
    cancel_tx: watch::Sender<bool>,
}

/// Single-run subprocess controller.
#[derive(Clone)]
pub struct RunController {
    state: Arc<StateManager>,
    metrics: Arc<Metrics>,
    classifier: Arc<OutputClassifier>,
    clock: Arc<dyn Clock>,
    settings: Arc<RunSettings>,
    active: Arc<Mutex<Option<ActiveRun>>>,
}

impl RunController {
    pub fn new(state: Arc<StateManager>, metrics: Arc<Metrics>, settings: RunSettings) -> Self {
        Self::with_clock(state, metrics, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        state: Arc<StateManager>,
        metrics: Arc<Metrics>,
        settings: RunSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state,
            metrics,
            classifier: Arc::new(OutputClassifier::new()),
            clock,
            settings: Arc::new(settings),
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Input directory from the options, resolved against the working directory.
    pub fn input_dir(&self) -> Utf8PathBuf {
        let in_dir = self.state.read(|s| s.options.in_dir().to_string());
        self.settings.work_dir.join(in_dir)
    }

    fn scan(&self) -> Result<Vec<ManagedFile>, ScanError> {
        let pattern = self.state.read(|s| s.options.pattern().to_string());
        scan_directory(&self.input_dir(), &pattern)
    }

    /// Rescan the input directory into the file table.
    ///
    /// While a run is active the rescan is only marked pending and applied
    /// when the run ends. Returns the number of files detected.
    pub fn rescan(&self) -> Result<usize, ScanError> {
        if self.state.is_running() {
            self.state.defer_rescan();
            return Ok(self.state.read(|s| s.files.len()));
        }
        let files = self.scan()?;
        let detected = files.len();
        self.state.replace_listing(files);
        self.metrics.record_rescan();
        tracing::info!("Files detected: {}", detected);
        Ok(detected)
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().unwrap().is_some()
    }

    /// Ask the active run to stop. Returns false when nothing is running.
    pub fn abort(&self) -> bool {
        match self.active.lock().unwrap().as_ref() {
            Some(active) => {
                tracing::info!("Aborting session {}", active.session_id);
                let _ = active.cancel_tx.send(true);
                self.metrics.record_run_aborted();
                true
            }
            None => false,
        }
    }

    /// Start a run, or abort the active one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_run(&self, mode: RunMode) -> Result<RunRequest, RunError> {
        let mut active = self.active.lock().unwrap();

        if let Some(run) = active.as_ref() {
            tracing::info!("Run requested while session {} is active, aborting it", run.session_id);
            let _ = run.cancel_tx.send(true);
            self.metrics.record_run_aborted();
            return Ok(RunRequest::Aborted {
                session_id: run.session_id,
            });
        }

        let input_dir = self.input_dir();
        if !input_dir.is_dir() {
            return Err(RunError::InvalidInputDir(input_dir));
        }
        let files = self.scan()?;

        let session_id = self
            .state
            .begin_session(mode, files, self.clock.now())
            .ok_or(RunError::Busy)?;
        self.metrics.record_rescan();

        let program = self.settings.program.clone();
        let args = self.settings.args(mode);
        tracing::info!(
            "Starting session {}: {} {} (cwd {})",
            session_id,
            program,
            args.join(" "),
            self.settings.work_dir
        );

        let child = Command::new(program.as_std_path())
            .args(&args)
            .current_dir(self.settings.work_dir.as_std_path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(source) => {
                tracing::error!("Failed to start {}: {}", program, source);
                self.metrics.record_launch_failure();
                self.state.end_session(
                    session_id,
                    RunOutcome::LaunchFailed,
                    vec![
                        LogEntry::new(launch_failure_message(), LogStyle::Error),
                        LogEntry::plain(program.to_string()),
                    ],
                    self.clock.now(),
                );
                return Err(RunError::LaunchFailed {
                    program: program.to_string(),
                    source,
                });
            }
        };

        self.state.mark_running(session_id);
        self.metrics.record_run_started();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        *active = Some(ActiveRun {
            session_id,
            cancel_tx,
        });
        drop(active);

        let controller = self.clone();
        let task =
            tokio::spawn(async move { controller.drive(session_id, child, cancel_rx).await });

        Ok(RunRequest::Started(RunHandle {
            session_id,
            task,
            state: Arc::clone(&self.state),
        }))
    }

    async fn drive(
        &self,
        session_id: u64,
        mut child: Child,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> Option<RunSummary> {
        let started = self.clock.now();

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                buf
            })
        });

        let mut aborted = false;
        let mut splitter = LineSplitter::new();

        if let Some(mut stdout) = child.stdout.take() {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                tokio::select! {
                    read = stdout.read(&mut buf) => match read {
                        Ok(0) => break,
                        Ok(n) => {
                            let lines = splitter.push(&buf[..n]);
                            self.fold_lines(session_id, lines);
                        }
                        Err(e) => {
                            tracing::warn!("Reading tool output failed: {}", e);
                            break;
                        }
                    },
                    // A dropped sender means the controller is gone; stop too
                    _ = cancel_rx.changed() => {
                        aborted = true;
                        break;
                    }
                }
            }
        }

        let exit_code = if aborted {
            let _ = child.kill().await;
            None
        } else {
            if let Some(tail) = splitter.finish() {
                self.fold_lines(session_id, vec![tail]);
            }
            tokio::select! {
                status = child.wait() => status.ok().and_then(|s| s.code()),
                _ = cancel_rx.changed() => {
                    aborted = true;
                    let _ = child.kill().await;
                    None
                }
            }
        };

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };

        let mut trailing: Vec<LogEntry> = String::from_utf8_lossy(&stderr)
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(LogEntry::plain)
            .collect();

        let outcome = if aborted {
            trailing.push(LogEntry::plain("Aborted"));
            RunOutcome::Aborted
        } else {
            RunOutcome::Completed { exit_code }
        };

        let now = self.clock.now();
        self.metrics
            .record_run_time(now.saturating_duration_since(started));
        // Session end and clearing `active` happen under one lock
        let summary = {
            let mut active = self.active.lock().unwrap();
            let summary = self.state.end_session(session_id, outcome, trailing, now);
            if active.as_ref().map(|a| a.session_id) == Some(session_id) {
                *active = None;
            }
            summary
        };

        if let Some(summary) = &summary {
            tracing::info!(
                "Session {} finished: {:?}, {} succeeded, {} failed",
                summary.id,
                summary.outcome,
                summary.cleaned,
                summary.failed
            );
        }

        if self.state.take_rescan_pending() {
            tracing::debug!("Applying rescan deferred during session {}", session_id);
            if let Err(e) = self.rescan() {
                tracing::warn!("Deferred rescan failed: {}", e);
            }
        }

        summary
    }

    /// Classify complete lines and fold them as one update.
    fn fold_lines(&self, session_id: u64, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        let classified: Vec<OutputLine> = self.classifier.classify_lines(lines);
        self.record(&classified);
        for line in &classified {
            tracing::debug!("[{}] {:?}: {}", session_id, line.event, line.text);
        }
        self.state
            .apply_output(session_id, &classified, self.clock.now());
    }

    fn record(&self, lines: &[OutputLine]) {
        let count = |event: OutputEvent| lines.iter().filter(|l| l.event == event).count() as u64;
        self.metrics
            .record_lines(lines.len() as u64, count(OutputEvent::Divider));
        self.metrics
            .record_files(count(OutputEvent::Written), count(OutputEvent::Failed));
    }
}

impl RescanTarget for RunController {
    fn is_running(&self) -> bool {
        self.state.is_running()
    }

    fn rescan(&self) {
        if let Err(e) = RunController::rescan(self) {
            tracing::warn!("Rescan of {} failed: {}", self.input_dir(), e);
        }
    }

    fn defer_rescan(&self) {
        self.state.defer_rescan();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Encoding, FileStatus, RunCounters};
    use std::time::Duration;

    fn controller_with_clock(clock: MockClock) -> RunController {
        RunController::with_clock(
            Arc::new(StateManager::new()),
            Arc::new(Metrics::new()),
            RunSettings {
                program: Utf8PathBuf::from(TOOL_BINARY_NAME),
                work_dir: Utf8PathBuf::from("."),
                config_file_name: "last_dirs.pl".to_string(),
            },
            Arc::new(clock),
        )
    }

    #[test]
    fn test_args_per_mode() {
        let settings = RunSettings {
            program: Utf8PathBuf::from("cleanmodels-cli"),
            work_dir: Utf8PathBuf::from("."),
            config_file_name: "last_dirs.pl".to_string(),
        };
        assert_eq!(settings.args(RunMode::Clean), vec!["last_dirs.pl"]);
        assert_eq!(settings.args(RunMode::Decompile), vec!["-d"]);
    }

    #[test]
    fn test_fold_stamps_elapsed_from_clock() {
        let t0 = Instant::now();
        let mut clock = MockClock::new();
        let mut seq = mockall::Sequence::new();
        clock
            .expect_now()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(t0);
        clock
            .expect_now()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(t0 + Duration::from_millis(1_500));

        let controller = controller_with_clock(clock);
        let session_id = controller
            .state
            .begin_session(
                RunMode::Clean,
                vec![ManagedFile::new("foo.mdl", 5, Encoding::Ascii)],
                t0,
            )
            .unwrap();

        controller.fold_lines(
            session_id,
            vec![
                "Attempting to read foo.mdl".to_string(),
                "..........".to_string(),
            ],
        );
        controller.fold_lines(
            session_id,
            vec!["Fixes made = 2".to_string(), "foo.mdl written.".to_string()],
        );

        let state = controller.state.snapshot();
        assert_eq!(state.files[0].status, FileStatus::Succeeded);
        assert_eq!(state.files[0].fixes, 2);
        assert_eq!(state.files[0].elapsed, "00:01.500");
        assert_eq!(state.counters, RunCounters { cleaned: 1, failed: 0 });

        use std::sync::atomic::Ordering;
        assert_eq!(controller.metrics.lines_classified.load(Ordering::Relaxed), 4);
        assert_eq!(controller.metrics.lines_discarded.load(Ordering::Relaxed), 1);
        assert_eq!(controller.metrics.files_succeeded.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_abort_without_run() {
        let controller = controller_with_clock(MockClock::new());
        assert!(!controller.abort());
        assert!(!controller.is_active());
    }

    #[test]
    fn test_launch_failure_message_names_tool() {
        assert!(launch_failure_message().contains(TOOL_BINARY_NAME));
    }
}
