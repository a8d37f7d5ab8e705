// Console presenter
//
// Subscribes to StateManager events and renders the log view, the file table
// and the counters as styled terminal text.

use crate::models::{
    CleanOptions, CoreKey, FileStatus, LogEntry, LogStyle, ManagedFile, OptionKind, RunCounters,
    RunMode, RunOutcome, RunSummary, USER_OPTIONS,
};
use crate::state::{StateChange, StateManager};
use colored::Colorize;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// What the presenter prints besides log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenterOptions {
    /// Print status text changes
    pub show_status: bool,
    /// Print per-file results as they happen
    pub show_files: bool,
}

/// Background task printing state changes as they arrive.
pub struct ConsolePresenter {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ConsolePresenter {
    /// Must be called from within a tokio runtime.
    pub fn spawn(state: Arc<StateManager>, options: PresenterOptions) -> Self {
        let mut rx = state.subscribe();
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            tracing::debug!("Console presenter started");
            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Ok(change) => present(&change, &state, options),
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::warn!("Console presenter lagged, {} event(s) dropped", missed);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = stop_rx.changed() => {
                        // Print whatever was queued before the stop request
                        while let Ok(change) = rx.try_recv() {
                            present(&change, &state, options);
                        }
                        break;
                    }
                }
            }
            tracing::debug!("Console presenter stopped");
        });

        Self { stop_tx, handle }
    }

    /// Drain pending events and stop.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!("Console presenter task failed: {}", e);
        }
    }
}

fn present(change: &StateChange, state: &StateManager, options: PresenterOptions) {
    tracing::trace!("State change received: {:?}", change);

    match change {
        StateChange::LogAppended { entry } => println!("{}", render_log_entry(entry)),
        StateChange::StatusTextChanged { text } if options.show_status => {
            println!("{}", format!("Status: {}", text).dimmed());
        }
        StateChange::FileStatusChanged {
            name,
            status,
            fixes,
            elapsed,
        } if options.show_files && status.is_finished() => {
            println!(
                "  {} {} ({} fixes, {})",
                render_status(*status),
                name,
                fixes,
                elapsed
            );
        }
        StateChange::ListingRefreshed { detected } => {
            println!("{}", format!("Files detected: {}", detected).dimmed());
        }
        StateChange::RunFinished { summary } => {
            println!("{}", render_summary(summary));
            if options.show_files {
                let files = state.read(|s| s.files.clone());
                print!("{}", render_file_table(&files));
            }
        }
        _ => {}
    }
}

/// A log line styled by its kind.
pub fn render_log_entry(entry: &LogEntry) -> String {
    match entry.style {
        LogStyle::Plain => entry.text.clone(),
        LogStyle::Info => entry.text.blue().bold().to_string(),
        LogStyle::Success => entry.text.green().bold().to_string(),
        LogStyle::Error => entry.text.red().bold().to_string(),
    }
}

fn render_status(status: FileStatus) -> String {
    let label = status.label();
    match status {
        FileStatus::Succeeded => label.green().bold().to_string(),
        FileStatus::Failed => label.red().bold().to_string(),
        FileStatus::Reading | FileStatus::Cleaning => label.blue().to_string(),
        FileStatus::None => label.to_string(),
    }
}

/// Byte count in the largest unit that keeps it above 1.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// `Files Cleaned: 3  Failures: 1`
pub fn render_counters(mode: RunMode, counters: RunCounters) -> String {
    format!(
        "{}: {}  Failures: {}",
        mode.counter_label(),
        counters.cleaned,
        counters.failed
    )
}

pub fn render_summary(summary: &RunSummary) -> String {
    let counters = render_counters(
        summary.mode,
        RunCounters {
            cleaned: summary.cleaned,
            failed: summary.failed,
        },
    );
    let outcome = match &summary.outcome {
        RunOutcome::Completed {
            exit_code: Some(code),
        } => format!("exit code {}", code),
        RunOutcome::Completed { exit_code: None } => "terminated".to_string(),
        RunOutcome::Aborted => "aborted".to_string(),
        RunOutcome::LaunchFailed => "not started".to_string(),
    };
    format!(
        "{} ({}, {:.1}s)",
        counters.bold(),
        outcome,
        summary.elapsed.as_secs_f64()
    )
}

/// The file table: file, type, size, status, fixes, time.
pub fn render_file_table(files: &[ManagedFile]) -> String {
    let name_width = files
        .iter()
        .map(|f| f.name.len())
        .max()
        .unwrap_or(0)
        .max("File".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<name_width$}  {:<10}  {:>10}  {:<8}  {:>5}  {:>9}",
        "File", "Type", "Size", "Status", "Fixes", "Time"
    );
    for file in files {
        let _ = writeln!(
            out,
            "{:<name_width$}  {:<10}  {:>10}  {:<8}  {:>5}  {:>9}",
            file.name,
            file.encoding.label(),
            format_size(file.size),
            file.status.label(),
            file.fixes,
            file.elapsed
        );
    }
    let _ = writeln!(out, "Files detected: {}", files.len());
    out
}

/// Current option values in file order.
pub fn render_options(options: &CleanOptions) -> String {
    let mut out = String::new();
    for key in CoreKey::ALL {
        let _ = writeln!(out, "{:<28} '{}'", key.predicate(), options.core(key));
    }
    for spec in USER_OPTIONS {
        let token = options.token(spec.name).unwrap_or_default();
        let _ = writeln!(out, "{:<28} {}", spec.name, token);
    }
    out
}

/// The option catalogue with accepted values.
pub fn render_catalogue() -> String {
    let mut out = String::new();
    for key in CoreKey::ALL {
        let _ = writeln!(out, "{:<28} text (core)", key.predicate());
    }
    for spec in USER_OPTIONS {
        let accepted = match spec.kind {
            OptionKind::Choice(tokens) => tokens.join(" | "),
            OptionKind::Toggle { on, off } => format!("{} | {}", on, off),
            OptionKind::Text => "text".to_string(),
            OptionKind::Integer => "integer".to_string(),
            OptionKind::Float => "number".to_string(),
            OptionKind::Rescale => "no | factor | x,y,z".to_string(),
        };
        let _ = writeln!(out, "{:<28} {}", spec.name, accepted);
    }
    out
}
