//! Services module - the work behind the front-end.
//!
//! These services have no dependencies on the presentation layer; everything
//! they produce goes through the [`StateManager`](crate::state::StateManager).
//!
//! # Components
//!
//! - [`RunController`]: Spawns `cleanmodels-cli` in clean or decompile mode,
//!   one run at a time. A request while a run is active aborts it.
//! - [`OutputClassifier`]: Maps each line of tool output to an [`OutputEvent`]
//!   (file read, model loaded, fixes made, written, failed, divider, other).
//!   [`LineSplitter`] re-splits raw stdout chunks into whole lines first.
//! - [`scan_directory`]: Lists the input directory through the filename
//!   pattern and detects ASCII or binary models.
//! - [`DirectoryWatcher`]: Watches the input directory and rescans after a
//!   debounce delay, deferring while a run is active.
//! - [`locate_tool`]: Finds the tool executable.
//!
//! # Usage Example
//!
//! ```ignore
//! use cleanmodels_front::services::{RunController, RunRequest, RunSettings};
//!
//! let controller = RunController::new(state, metrics, RunSettings {
//!     program: "cleanmodels-cli".into(),
//!     work_dir: ".".into(),
//!     config_file_name: "last_dirs.pl".to_string(),
//! });
//!
//! if let RunRequest::Started(handle) = controller.request_run(RunMode::Clean)? {
//!     let summary = handle.wait().await?;
//! }
//! ```

pub mod output;
pub mod runner;
pub mod scanner;
pub mod tool_locator;
pub mod watcher;

pub use output::{LineSplitter, OutputClassifier, OutputEvent, OutputLine};
pub use runner::{Clock, RunController, RunError, RunHandle, RunRequest, RunSettings, SystemClock};
pub use scanner::{NameFilter, ScanError, detect_encoding, scan_directory};
pub use tool_locator::{TOOL_BINARY_NAME, locate_tool};
pub use watcher::{DebounceAction, DirectoryWatcher, RescanDebouncer, RescanTarget};
