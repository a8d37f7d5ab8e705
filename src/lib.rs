// cleanmodels-front - console front-end for the cleanmodels-cli model cleaner
//
// This is the library crate containing the configuration store, the run
// controller and output classifier, and the state they share.
// The binary crate (main.rs) provides the command-line entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::{ConfigManager, ConfigStore};
pub use metrics::Metrics;
pub use models::{AppState, CleanOptions, FrontendSettings, RunMode};
pub use services::{OutputClassifier, RunController};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
