use camino::{Utf8Path, Utf8PathBuf};
use notify::{Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// What to do when the debounce timer is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceAction {
    /// Timer not armed or not expired yet
    Idle,
    Rescan,
    /// Timer fired during a run; rescan once it ends
    Defer,
}

/// Collapses bursts of directory changes into one rescan.
///
/// Every change restarts the timer; only a quiet period of `delay` lets it fire.
#[derive(Debug, Clone)]
pub struct RescanDebouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl RescanDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn notify_changed(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn poll(&mut self, now: Instant, run_active: bool) -> DebounceAction {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                if run_active {
                    DebounceAction::Defer
                } else {
                    DebounceAction::Rescan
                }
            }
            _ => DebounceAction::Idle,
        }
    }
}

/// Receiver of watcher decisions.
pub trait RescanTarget: Send + Sync + 'static {
    fn is_running(&self) -> bool;
    fn rescan(&self);
    fn defer_rescan(&self);
}

/// Turn a notify result into "something changed", ignoring plain reads.
fn is_change(result: &notify::Result<Event>) -> bool {
    match result {
        Ok(event) => !matches!(event.kind, EventKind::Access(_)),
        Err(e) => {
            tracing::warn!("Directory watch error: {}", e);
            false
        }
    }
}

/// Native watcher for `dir`, or a polling one when the platform backend fails.
fn create_watcher(
    dir: &Utf8Path,
    poll_interval: Duration,
    tx: mpsc::UnboundedSender<notify::Result<Event>>,
) -> notify::Result<Box<dyn Watcher + Send>> {
    let native_tx = tx.clone();
    let native = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = native_tx.send(res);
    })
    .and_then(|mut watcher| {
        watcher.watch(dir.as_std_path(), RecursiveMode::NonRecursive)?;
        Ok(watcher)
    });

    match native {
        Ok(watcher) => Ok(Box::new(watcher)),
        Err(e) if dir.is_dir() => {
            tracing::warn!(
                "Native watcher unavailable for {} ({}), polling every {:?}",
                dir,
                e,
                poll_interval
            );
            let config = notify::Config::default().with_poll_interval(poll_interval);
            let mut watcher = PollWatcher::new(
                move |res: notify::Result<Event>| {
                    let _ = tx.send(res);
                },
                config,
            )?;
            watcher.watch(dir.as_std_path(), RecursiveMode::NonRecursive)?;
            Ok(Box::new(watcher))
        }
        Err(e) => Err(e),
    }
}

/// Filesystem watcher on one directory feeding a debounced rescan task.
///
/// Stops when [`stop`](Self::stop) is called or the watcher is dropped.
pub struct DirectoryWatcher {
    dir: Utf8PathBuf,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    _watcher: Box<dyn Watcher + Send>,
}

impl DirectoryWatcher {
    /// Must be called from within a tokio runtime.
    ///
    /// `poll_interval` only applies when the native backend is unavailable
    /// and the polling fallback is used.
    pub fn spawn<T: RescanTarget>(
        dir: Utf8PathBuf,
        poll_interval: Duration,
        debounce: Duration,
        target: Arc<T>,
    ) -> notify::Result<Self> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let watcher = create_watcher(&dir, poll_interval, event_tx)?;
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let watched = dir.clone();

        let handle = tokio::spawn(async move {
            let mut debouncer = RescanDebouncer::new(debounce);
            tracing::debug!("Watching {}", watched);

            loop {
                let deadline = debouncer.deadline().unwrap_or_else(Instant::now);
                tokio::select! {
                    received = event_rx.recv() => match received {
                        Some(result) => {
                            if is_change(&result) {
                                debouncer.notify_changed(Instant::now());
                            }
                        }
                        None => break,
                    },
                    _ = tokio::time::sleep_until(deadline.into()), if debouncer.is_armed() => {
                        match debouncer.poll(Instant::now(), target.is_running()) {
                            DebounceAction::Rescan => {
                                tracing::debug!("{} changed, rescanning", watched);
                                target.rescan();
                            }
                            DebounceAction::Defer => {
                                tracing::debug!("{} changed during a run, rescan deferred", watched);
                                target.defer_rescan();
                            }
                            DebounceAction::Idle => {}
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }

            tracing::debug!("Stopped watching {}", watched);
        });

        Ok(Self {
            dir,
            stop_tx,
            handle,
            _watcher: watcher,
        })
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
