//! CLI argument definitions using clap derive

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ondie-cache - OnDie CA artifact cache updater
///
/// Downloads the OnDie certificate and CRL bundle into a local cache as
/// `.new` files and signals readers that an update is ready.
#[derive(Parser, Debug)]
#[command(name = "ondie-cache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(long, global = true, env = "ONDIE_CACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the bundle and stage it for readers
    Update(UpdateArgs),

    /// Show live, staged and pending state of a cache directory
    Status(StatusArgs),

    /// Promote staged files over live ones (reader side)
    Promote(PromoteArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Cache directory selection shared by cache commands
#[derive(Args, Debug, Clone, Default)]
pub struct CacheDirArg {
    /// Local directory holding cache artifacts (defaults to cache.dir in config)
    #[arg(short = 'c', long = "cache-dir", visible_alias = "cachedir", env = "ONDIE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Arguments for the update command
#[derive(Parser, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub cache: CacheDirArg,

    /// Update even when a previous update has not been processed yet
    #[arg(short, long)]
    pub force: bool,

    /// Bundle URL or path (overrides source.url)
    #[arg(long)]
    pub source: Option<String>,

    /// Transfer timeout in seconds, 0 for none (overrides source.timeout_secs)
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub cache: CacheDirArg,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the promote command
#[derive(Parser, Debug)]
pub struct PromoteArgs {
    #[command(flatten)]
    pub cache: CacheDirArg,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for the status command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Table,
    /// JSON output
    Json,
}
