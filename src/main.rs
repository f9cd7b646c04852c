//! ondie-cache - OnDie CA artifact cache updater
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use ondie_cache::cli::{Cli, Commands};
use ondie_cache::config::{Config, ConfigManager};
use ondie_cache::error::CacheResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> CacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    ondie_cache::ui::init_theme();

    match cli.command {
        Commands::Update(args) => ondie_cache::cli::commands::update(args, &config).await,
        Commands::Status(args) => ondie_cache::cli::commands::status(args, &config).await,
        Commands::Promote(args) => ondie_cache::cli::commands::promote(args, &config).await,
        Commands::Config(args) => {
            ondie_cache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// Initialize logging: 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("ondie_cache=warn"),
        1 => EnvFilter::new("ondie_cache=info"),
        _ => EnvFilter::new("ondie_cache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
