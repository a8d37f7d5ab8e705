// Front-end controller - Bridges the command surface with state and services
//
// Owns the Config Store for the tool's configuration file, the RunController
// that drives cleanmodels-cli, and the directory watcher. Commands from the
// command line or the interactive prompt go through here; presentation is
// left to the console presenter subscribed to the StateManager.

use crate::config::{ConfigStore, tool_config_path};
use crate::metrics::Metrics;
use crate::models::{
    ConfigKey, CoreKey, FrontendSettings, LogEntry, LogStyle, OptionError, RunMode, RunSummary,
    find_option,
};
use crate::services::runner::{RunController, RunError, RunRequest, RunSettings};
use crate::services::watcher::DirectoryWatcher;
use crate::state::StateManager;
use crate::ui::console::{render_catalogue, render_counters, render_file_table, render_options};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

/// How long `quit` waits for an aborted run to wind down.
const QUIT_GRACE: Duration = Duration::from_secs(5);

/// Result of [`FrontendController::set_option`].
#[derive(Debug, Clone, PartialEq)]
pub struct OptionUpdate {
    pub key: ConfigKey,
    /// Value as written to the file
    pub value: String,
    /// Assertion lines rewritten; zero when the key is missing from the file
    pub written: usize,
}

/// A line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Run(RunMode),
    Abort,
    List,
    Status,
    Rescan,
    Set { key: String, value: String },
    Show,
    Options,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("Unknown command '{0}', type 'help' for a list")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

const HELP: &str = "\
Commands:
  clean        start cleaning, or abort the active run
  decompile    start decompiling, or abort the active run
  abort        abort the active run
  list         show the file table
  status       show status text and counters
  rescan       rescan the input directory
  set KEY VAL  change an option
  show         show current option values
  options      list options and accepted values
  quit         leave";

/// Parse one non-empty prompt line.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, CommandError> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map(|(w, r)| (w, r.trim()))
        .unwrap_or((line, ""));

    let command = match word.to_ascii_lowercase().as_str() {
        "clean" => ConsoleCommand::Run(RunMode::Clean),
        "decompile" => ConsoleCommand::Run(RunMode::Decompile),
        "abort" | "stop" => ConsoleCommand::Abort,
        "list" | "ls" => ConsoleCommand::List,
        "status" => ConsoleCommand::Status,
        "rescan" => ConsoleCommand::Rescan,
        "show" => ConsoleCommand::Show,
        "options" => ConsoleCommand::Options,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        "set" => {
            let (key, value) = rest
                .split_once(char::is_whitespace)
                .map(|(k, v)| (k, v.trim()))
                .unwrap_or((rest, ""));
            if key.is_empty() {
                return Err(CommandError::Usage("set KEY VALUE"));
            }
            ConsoleCommand::Set {
                key: key.to_string(),
                value: unquote(value).to_string(),
            }
        }
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(command)
}

/// `"a b"` -> `a b`, so values with spaces or empty values can be typed.
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Coordinates configuration, runs and the directory watcher.
pub struct FrontendController {
    state: Arc<StateManager>,
    metrics: Arc<Metrics>,
    settings: FrontendSettings,
    store: ConfigStore,
    runner: RunController,
    watcher: Mutex<Option<DirectoryWatcher>>,
    /// Watching was requested; survives a directory that cannot be watched yet
    watching: AtomicBool,
}

impl FrontendController {
    /// Create a controller running `program` in the configured working directory.
    pub fn new(
        state: Arc<StateManager>,
        metrics: Arc<Metrics>,
        settings: FrontendSettings,
        program: Utf8PathBuf,
    ) -> Self {
        let store = ConfigStore::new(tool_config_path(&settings));
        let runner = RunController::new(
            Arc::clone(&state),
            Arc::clone(&metrics),
            RunSettings {
                program,
                work_dir: Utf8PathBuf::from(&settings.work_dir),
                config_file_name: settings.config_file_name.clone(),
            },
        );

        Self {
            state,
            metrics,
            settings,
            store,
            runner,
            watcher: Mutex::new(None),
            watching: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn runner(&self) -> &RunController {
        &self.runner
    }

    /// Seed the configuration file if needed, load it and scan the input directory.
    ///
    /// A missing input directory is logged, not fatal.
    pub fn initialize(&self) -> Result<()> {
        let template = self.settings.template_path.as_deref().map(Utf8Path::new);
        if self
            .store
            .ensure_seeded(template)
            .with_context(|| format!("Failed to create {}", self.store.path()))?
        {
            self.state.append_log(LogEntry::new(
                format!("Created {} with default options", self.store.path()),
                LogStyle::Info,
            ));
        }

        self.reload_options()?;
        self.refresh_listing();
        Ok(())
    }

    /// Re-read the configuration file into the options mirror.
    pub fn reload_options(&self) -> Result<()> {
        let entries = self
            .store
            .load()
            .with_context(|| format!("Failed to load {}", self.store.path()))?;
        self.state.load_options(&entries);
        Ok(())
    }

    /// Validate, write and apply one option.
    ///
    /// `name` is a core alias (`indir`, `pattern`, ...) or a catalogue option
    /// name. Nothing is written when the value is rejected.
    pub fn set_option(&self, name: &str, input: &str) -> Result<OptionUpdate> {
        let update = match CoreKey::from_alias(name) {
            Some(core) => {
                let input = core.parse(input)?;
                let key = core.config_key();
                let written = self.write(&key, input)?;
                self.state
                    .update(|s| s.options.set_core(core, input.to_string()));
                if matches!(core, CoreKey::InDir | CoreKey::Pattern) {
                    self.refresh_listing();
                    self.restart_watcher();
                }
                OptionUpdate {
                    key,
                    value: input.to_string(),
                    written,
                }
            }
            None => {
                let spec =
                    find_option(name).ok_or_else(|| OptionError::UnknownOption(name.to_string()))?;
                let value = spec.parse(input)?;
                let token = spec.encode(&value);
                let key = spec.config_key();
                let written = self.write(&key, &token)?;
                self.state.update(|s| {
                    s.options.set(spec.name, value);
                });
                OptionUpdate {
                    key,
                    value: token,
                    written,
                }
            }
        };

        tracing::info!(
            "Set {} = {} ({} line(s) written)",
            update.key,
            update.value,
            update.written
        );
        Ok(update)
    }

    fn write(&self, key: &ConfigKey, value: &str) -> Result<usize> {
        let written = self
            .store
            .write(key, value)
            .with_context(|| format!("Failed to write {} to {}", key, self.store.path()))?;
        if written > 0 {
            self.metrics.record_config_write();
        }
        Ok(written)
    }

    /// Rescan the input directory, logging failures instead of returning them.
    pub fn refresh_listing(&self) -> Option<usize> {
        match self.runner.rescan() {
            Ok(detected) => Some(detected),
            Err(e) => {
                tracing::warn!("Listing not refreshed: {}", e);
                self.state
                    .append_log(LogEntry::new(e.to_string(), LogStyle::Error));
                None
            }
        }
    }

    /// Start a run, or abort the active one.
    pub fn request_run(&self, mode: RunMode) -> Result<RunRequest, RunError> {
        let result = self.runner.request_run(mode);
        if let Err(e) = &result {
            // Launch failures are already in the log view
            if !matches!(e, RunError::LaunchFailed { .. }) {
                self.state
                    .append_log(LogEntry::new(e.to_string(), LogStyle::Error));
            }
        }
        result
    }

    pub fn abort(&self) -> bool {
        self.runner.abort()
    }

    /// Run to completion. Ctrl-C aborts the run instead of the process.
    ///
    /// Returns `None` when the request aborted a run that was already active.
    pub async fn run_to_completion(&self, mode: RunMode) -> Result<Option<RunSummary>> {
        let handle = match self.request_run(mode)? {
            RunRequest::Started(handle) => handle,
            RunRequest::Aborted { .. } => return Ok(None),
        };

        let wait = handle.wait();
        tokio::pin!(wait);
        loop {
            tokio::select! {
                summary = &mut wait => return Ok(Some(summary?)),
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, aborting the run");
                    self.abort();
                }
            }
        }
    }

    /// Copy the configuration file out. A missing extension becomes `.cm`.
    pub fn export_config(&self, dest: &Utf8Path) -> Result<Utf8PathBuf> {
        let dest = self
            .store
            .export_to(dest)
            .with_context(|| format!("Failed to export {}", self.store.path()))?;
        Ok(dest)
    }

    /// Replace the configuration file and reload everything that depends on it.
    pub fn import_config(&self, src: &Utf8Path) -> Result<()> {
        self.store
            .import_from(src)
            .with_context(|| format!("Failed to import {}", src))?;
        self.reload_options()?;
        self.refresh_listing();
        self.restart_watcher();
        Ok(())
    }

    /// Watch the input directory for changes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_watching(&self) {
        self.watching.store(true, Ordering::SeqCst);
        let dir = self.runner.input_dir();
        let spawned = DirectoryWatcher::spawn(
            dir.clone(),
            Duration::from_millis(self.settings.watch_poll_interval_ms),
            Duration::from_millis(self.settings.rescan_debounce_ms),
            Arc::new(self.runner.clone()),
        );
        // Replacing drops (and stops) the previous watcher
        let mut current = self.watcher.lock().unwrap();
        match spawned {
            Ok(watcher) => {
                *current = Some(watcher);
                tracing::info!("Watching {}", dir);
            }
            Err(e) => {
                *current = None;
                tracing::warn!("Cannot watch {}: {}", dir, e);
                self.state.append_log(LogEntry::new(
                    format!("Cannot watch {}: {}", dir, e),
                    LogStyle::Error,
                ));
            }
        }
    }

    pub fn stop_watching(&self) {
        self.watching.store(false, Ordering::SeqCst);
        if let Some(watcher) = self.watcher.lock().unwrap().take() {
            tracing::info!("Stopped watching {}", watcher.dir());
        }
    }

    pub fn watched_dir(&self) -> Option<Utf8PathBuf> {
        self.watcher
            .lock()
            .unwrap()
            .as_ref()
            .map(|w| w.dir().to_path_buf())
    }

    /// Point the watcher at the current input directory, if watching was requested.
    fn restart_watcher(&self) {
        if self.watching.load(Ordering::SeqCst) {
            self.start_watching();
        }
    }

    /// Status text, counters and file count.
    pub fn status_report(&self) -> String {
        self.state.read(|s| {
            format!(
                "Status: {}\n{}\nFiles detected: {}",
                s.status_text,
                render_counters(s.counter_mode, s.counters),
                s.files.len()
            )
        })
    }

    /// Read commands from stdin until `quit` or end of input.
    ///
    /// Watches the input directory for the duration.
    pub async fn run_interactive(&self) -> Result<()> {
        self.start_watching();
        println!("{}", HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read from stdin")?,
                _ = tokio::signal::ctrl_c() => {
                    if self.abort() {
                        continue;
                    }
                    None
                }
            };

            let Some(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }

            match parse_command(&line) {
                Ok(ConsoleCommand::Quit) => break,
                Ok(command) => self.execute(command),
                Err(e) => println!("{}", e),
            }
        }

        self.shutdown().await;
        Ok(())
    }

    fn execute(&self, command: ConsoleCommand) {
        tracing::debug!("Console command: {:?}", command);
        match command {
            ConsoleCommand::Run(mode) => match self.request_run(mode) {
                Ok(RunRequest::Started(handle)) => {
                    tracing::debug!("Session {} started from the prompt", handle.session_id());
                    // The drive task keeps running without the handle
                    drop(handle);
                }
                Ok(RunRequest::Aborted { session_id }) => {
                    println!("Aborting session {}", session_id);
                }
                Err(e) => tracing::warn!("Run not started: {}", e),
            },
            ConsoleCommand::Abort => {
                if !self.abort() {
                    println!("Nothing is running");
                }
            }
            ConsoleCommand::List => {
                let files = self.state.read(|s| s.files.clone());
                print!("{}", render_file_table(&files));
            }
            ConsoleCommand::Status => println!("{}", self.status_report()),
            ConsoleCommand::Rescan => {
                self.refresh_listing();
            }
            ConsoleCommand::Set { key, value } => match self.set_option(&key, &value) {
                Ok(update) if update.written == 0 => {
                    println!("{} is not in {}, file unchanged", update.key, self.store.path());
                }
                Ok(update) => println!("{} = {}", update.key, update.value),
                Err(e) => println!("{:#}", e),
            },
            ConsoleCommand::Show => {
                let options = self.state.read(|s| s.options.clone());
                print!("{}", render_options(&options));
            }
            ConsoleCommand::Options => print!("{}", render_catalogue()),
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => {}
        }
    }

    /// Stop watching and abort any active run, waiting briefly for it to end.
    pub async fn shutdown(&self) {
        self.stop_watching();
        if self.abort() {
            let deadline = tokio::time::Instant::now() + QUIT_GRACE;
            while self.runner.is_active() && tokio::time::Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}
