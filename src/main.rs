//! treesift - command-line entry point.
//!
//! Runs one scan and filter pass through the [`StateCoordinator`] and prints the settled
//! [`ViewModel`](treesift::ViewModel) as JSON on stdout. Logs go to `logs/` and, with
//! `--debug`, to stderr.
//!
//! # Execution Flow
//!
//! 1. Initialize logging
//! 2. Load configuration (`treesift.yaml` in `--config-dir`, then `TREESIFT_*` variables)
//! 3. Start the coordinator on a tokio runtime
//! 4. Select the root, wait for the scan, apply filters and selection flags
//! 5. Print the final view model

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use std::sync::Arc;
use treesift::models::AppConfig;
use treesift::{APP_NAME, ConfigManager, FileSystemScanner, StateCoordinator, VERSION};

#[derive(Parser, Debug)]
#[command(name = "treesift", version, about = "Index a directory and print a filtered tree")]
struct Cli {
    /// Directory to scan
    root: Utf8PathBuf,

    /// Substring to match against file names
    #[arg(long, default_value = "")]
    name: String,

    /// Extensions to keep, e.g. "rs,toml"
    #[arg(long, default_value = "")]
    ext: String,

    /// Text that file contents must contain
    #[arg(long, default_value = "")]
    content: String,

    /// Select every visible file
    #[arg(long)]
    select_all: bool,

    /// Expand every visible directory
    #[arg(long)]
    expand_all: bool,

    /// Directory holding treesift.yaml
    #[arg(long)]
    config_dir: Option<Utf8PathBuf>,

    /// Verbose logging on stderr
    #[arg(long)]
    debug: bool,
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    match &cli.config_dir {
        Some(dir) => ConfigManager::new(dir)?.load_config(),
        None => Ok(AppConfig::default()),
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let coordinator = StateCoordinator::spawn(config, Arc::new(FileSystemScanner::new()));

    coordinator.select_directory(cli.root.clone())?;
    let view = coordinator.settled().await?;
    if view.current_path.is_none() {
        anyhow::bail!("{}", view.status_message);
    }

    if !cli.name.is_empty() || !cli.ext.is_empty() || !cli.content.is_empty() {
        coordinator.update_filters(&cli.name, &cli.ext, &cli.content)?;
    }
    if cli.select_all {
        coordinator.select_all()?;
    }
    if cli.expand_all {
        coordinator.expand_collapse_all(true)?;
    }

    let view = coordinator.settled().await?;
    tracing::info!(
        "{}: {} visible of {} entries, {} selected",
        view.status_message,
        view.visible_count,
        view.total_count,
        view.selected_count
    );

    let json = serde_json::to_string_pretty(&view).context("Failed to serialize view model")?;
    println!("{}", json);

    coordinator.metrics().log_summary();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = treesift::logging::setup_logging_with_console("logs", "treesift", cli.debug, cli.debug)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let config = load_config(&cli)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("treesift-worker")
        .build()?;

    let result = runtime.block_on(run(cli, config));

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    result.inspect_err(|e| tracing::error!("treesift failed: {:#}", e))
}
