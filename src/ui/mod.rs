// UI module - console front-end
//
// This module contains:
// - ConsolePresenter: prints state changes (log lines, file results, counters)
// - FrontendController: routes commands to the config store, runs and the watcher

pub mod console;
pub mod controller;

pub use console::{ConsolePresenter, PresenterOptions};
pub use controller::{CommandError, ConsoleCommand, FrontendController, OptionUpdate, parse_command};
