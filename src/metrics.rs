// Run metrics
//
// Lightweight counters collected over the life of the process and logged at shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process-wide counters
///
/// Uses atomic operations for thread-safe metric tracking without locks.
#[derive(Debug)]
pub struct Metrics {
    pub runs_started: AtomicU64,
    pub runs_aborted: AtomicU64,
    pub launch_failures: AtomicU64,

    /// Output lines seen, dividers included
    pub lines_classified: AtomicU64,
    pub lines_discarded: AtomicU64,

    pub files_succeeded: AtomicU64,
    pub files_failed: AtomicU64,

    pub config_writes: AtomicU64,
    pub rescans: AtomicU64,

    /// Wall time spent with a subprocess running
    pub total_run_time_ms: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_aborted: AtomicU64::new(0),
            launch_failures: AtomicU64::new(0),
            lines_classified: AtomicU64::new(0),
            lines_discarded: AtomicU64::new(0),
            files_succeeded: AtomicU64::new(0),
            files_failed: AtomicU64::new(0),
            config_writes: AtomicU64::new(0),
            rescans: AtomicU64::new(0),
            total_run_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_aborted(&self) {
        self.runs_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_launch_failure(&self) {
        self.launch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lines(&self, classified: u64, discarded: u64) {
        self.lines_classified.fetch_add(classified, Ordering::Relaxed);
        self.lines_discarded.fetch_add(discarded, Ordering::Relaxed);
    }

    pub fn record_files(&self, succeeded: u64, failed: u64) {
        self.files_succeeded.fetch_add(succeeded, Ordering::Relaxed);
        self.files_failed.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn record_config_write(&self) {
        self.config_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rescan(&self) {
        self.rescans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_time(&self, duration: Duration) {
        self.total_run_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average run length in milliseconds over completed and aborted runs
    pub fn avg_run_time_ms(&self) -> f64 {
        let total = self.total_run_time_ms.load(Ordering::Relaxed);
        let count = self.runs_started.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Runs: {} started, {} aborted, {} failed to launch (avg {:.0}ms)",
            self.runs_started.load(Ordering::Relaxed),
            self.runs_aborted.load(Ordering::Relaxed),
            self.launch_failures.load(Ordering::Relaxed),
            self.avg_run_time_ms()
        );
        tracing::info!(
            "Files: {} succeeded, {} failed",
            self.files_succeeded.load(Ordering::Relaxed),
            self.files_failed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Output lines: {} classified, {} dividers discarded",
            self.lines_classified.load(Ordering::Relaxed),
            self.lines_discarded.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Config writes: {}, rescans: {}",
            self.config_writes.load(Ordering::Relaxed),
            self.rescans.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
