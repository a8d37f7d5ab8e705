use serde::{Deserialize, Serialize};

/// Default name of the tool's configuration file, passed as its only argument.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "last_dirs.pl";

/// Settings of the front-end itself, stored in `cleanmodels-front.yaml`.
///
/// These never reach the external tool; the tool's own options live in the
/// Prolog-style configuration file handled by [`ConfigStore`](crate::config::ConfigStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendSettings {
    /// Explicit path to `cleanmodels-cli`, skipping the search
    #[serde(default)]
    pub tool_path: Option<String>,

    /// Directory the tool runs in and where its configuration file lives
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    #[serde(default = "default_config_file_name")]
    pub config_file_name: String,

    /// Template copied when the configuration file does not exist yet
    #[serde(default)]
    pub template_path: Option<String>,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub debug_mode: bool,

    /// Poll interval of the fallback watcher, used when native filesystem
    /// notifications are unavailable
    #[serde(default = "default_watch_poll_interval_ms")]
    pub watch_poll_interval_ms: u64,

    #[serde(default = "default_rescan_debounce_ms")]
    pub rescan_debounce_ms: u64,
}

impl Default for FrontendSettings {
    fn default() -> Self {
        Self {
            tool_path: None,
            work_dir: default_work_dir(),
            config_file_name: default_config_file_name(),
            template_path: None,
            log_dir: default_log_dir(),
            debug_mode: false,
            watch_poll_interval_ms: default_watch_poll_interval_ms(),
            rescan_debounce_ms: default_rescan_debounce_ms(),
        }
    }
}

fn default_work_dir() -> String {
    ".".to_string()
}

fn default_config_file_name() -> String {
    DEFAULT_CONFIG_FILE_NAME.to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_watch_poll_interval_ms() -> u64 {
    250
}

fn default_rescan_debounce_ms() -> u64 {
    500
}
