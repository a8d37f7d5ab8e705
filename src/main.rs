//! cleanmodels-front - console front-end for cleanmodels-cli
//!
//! Main entry point for the command-line application.
//!
//! # Overview
//!
//! Initializes, in order:
//! - Front-end settings ([`ConfigManager`]): YAML file plus `CLEANMODELS_*` overrides
//! - Logging infrastructure (daily rotating file, optional stderr output)
//! - Tokio async runtime (subprocess I/O, directory watcher, Ctrl-C)
//! - State management ([`StateManager`]) and the [`FrontendController`]
//!
//! Then runs one subcommand. `clean`/`decompile` stream the tool's output
//! through the console presenter until the run ends; Ctrl-C aborts the run.
//! `interactive` keeps watching the input directory and reads commands from
//! stdin.

mod cli;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{CommandFactory, Parser};
use cleanmodels_front::config::SETTINGS_FILE_NAME;
use cleanmodels_front::logging::{LOG_PREFIX, setup_logging_with_console};
use cleanmodels_front::services::{TOOL_BINARY_NAME, locate_tool};
use cleanmodels_front::ui::console::{render_catalogue, render_file_table, render_options};
use cleanmodels_front::ui::{ConsolePresenter, FrontendController, PresenterOptions};
use cleanmodels_front::{
    APP_NAME, ConfigManager, FrontendSettings, Metrics, RunMode, StateManager, VERSION,
};
use cli::{Cli, Commands};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_long_help()?;
        return Ok(());
    };

    let work_dir = cli.work_dir.clone().unwrap_or_else(|| Utf8PathBuf::from("."));
    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(|| work_dir.join(SETTINGS_FILE_NAME));
    let config_manager = ConfigManager::with_settings_path(&settings_path);

    let mut settings = config_manager.load_settings()?;
    if cli.work_dir.is_some() {
        settings.work_dir = work_dir.to_string();
    }
    let debug_mode = cli.debug || settings.debug_mode;

    let log_dir = Utf8Path::new(&settings.work_dir).join(&settings.log_dir);
    let _guard = setup_logging_with_console(&log_dir, LOG_PREFIX, debug_mode, cli.verbose)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!("Settings: {:?}", settings);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("cleanmodels-worker")
        .build()
        .context("Failed to create the tokio runtime")?;

    let metrics = Arc::new(Metrics::new());
    let result = runtime.block_on(run(
        command,
        settings,
        &config_manager,
        Arc::clone(&metrics),
        cli.verbose,
    ));

    runtime.shutdown_timeout(Duration::from_secs(5));
    metrics.log_summary();

    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    tracing::info!("Application shutdown complete");
    result
}

async fn run(
    command: Commands,
    settings: FrontendSettings,
    config_manager: &ConfigManager,
    metrics: Arc<Metrics>,
    verbose: bool,
) -> Result<()> {
    match command {
        Commands::Options => {
            print!("{}", render_catalogue());
            return Ok(());
        }
        Commands::InitSettings => {
            config_manager.save_settings(&settings)?;
            println!("Wrote {}", config_manager.settings_path());
            return Ok(());
        }
        _ => {}
    }

    let work_dir = Utf8PathBuf::from(&settings.work_dir);
    let program = match locate_tool(settings.tool_path.as_deref().map(Utf8Path::new), &work_dir) {
        Some(path) => {
            tracing::info!("Found {} at {}", TOOL_BINARY_NAME, path);
            path
        }
        None => {
            tracing::warn!(
                "{} not found in PATH, {} or next to {}, runs will likely fail",
                TOOL_BINARY_NAME,
                work_dir,
                APP_NAME
            );
            Utf8PathBuf::from(TOOL_BINARY_NAME)
        }
    };

    let state = Arc::new(StateManager::new());
    let controller = FrontendController::new(Arc::clone(&state), metrics, settings, program);

    match command {
        Commands::Clean => run_once(&controller, RunMode::Clean, verbose).await,
        Commands::Decompile => run_once(&controller, RunMode::Decompile, verbose).await,
        Commands::Interactive => {
            let presenter = ConsolePresenter::spawn(
                Arc::clone(&state),
                PresenterOptions {
                    show_status: verbose,
                    show_files: true,
                },
            );
            let result = match controller.initialize() {
                Ok(()) => controller.run_interactive().await,
                Err(e) => Err(e),
            };
            presenter.shutdown().await;
            result
        }
        Commands::List => {
            controller.initialize()?;
            let files = state.read(|s| s.files.clone());
            print!("{}", render_file_table(&files));
            Ok(())
        }
        Commands::Show => {
            controller.initialize()?;
            let options = state.read(|s| s.options.clone());
            print!("{}", render_options(&options));
            Ok(())
        }
        Commands::Set { key, value } => {
            controller.initialize()?;
            let update = controller.set_option(&key, &value)?;
            if update.written == 0 {
                println!(
                    "{} is not in {}, file unchanged",
                    update.key,
                    controller.store().path()
                );
            } else {
                println!("{} = {}", update.key, update.value);
            }
            Ok(())
        }
        Commands::Export { file } => {
            controller.initialize()?;
            let dest = controller.export_config(&file)?;
            println!("Exported {} to {}", controller.store().path(), dest);
            Ok(())
        }
        Commands::Import { file } => {
            controller.initialize()?;
            controller.import_config(&file)?;
            println!("Imported {} into {}", file, controller.store().path());
            Ok(())
        }
        Commands::Options | Commands::InitSettings => Ok(()),
    }
}

/// Start one run and stream it to the console until it ends.
async fn run_once(controller: &FrontendController, mode: RunMode, verbose: bool) -> Result<()> {
    let presenter = ConsolePresenter::spawn(
        Arc::clone(controller.state()),
        PresenterOptions {
            show_status: verbose,
            show_files: true,
        },
    );

    let result = match controller.initialize() {
        Ok(()) => controller.run_to_completion(mode).await.map(|_| ()),
        Err(e) => Err(e),
    };

    presenter.shutdown().await;
    result
}
