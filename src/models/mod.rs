//! Data models for the front-end.
//!
//! - [`AppState`]: the single state record (options mirror, file table, run session, log)
//! - [`CleanOptions`]: typed view of the tool's Prolog-style configuration file
//! - [`ManagedFile`]: one row of the file table
//! - [`FrontendSettings`]: the front-end's own YAML settings
//!
//! State updates go through [`StateManager`](crate::state::StateManager), which
//! wraps [`AppState`] in `Arc<RwLock<>>` and emits change events.

pub mod app_state;
pub mod config;
pub mod file_entry;
pub mod options;

pub use app_state::{
    AppState, IDLE_STATUS, LogEntry, LogStyle, RUN_BANNER, RunCounters, RunMode, RunOutcome,
    RunPhase, RunSession, RunSummary,
};
pub use config::{DEFAULT_CONFIG_FILE_NAME, FrontendSettings};
pub use file_entry::{Encoding, FileStatus, ManagedFile, ZERO_ELAPSED, format_elapsed};
pub use options::{
    CleanOptions, ConfigKey, CoreKey, OptionError, OptionKind, OptionSpec, OptionValue, Rescale,
    USER_OPTIONS, find_option, quote_atom,
};
