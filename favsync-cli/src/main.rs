//! favsync: mirror catalog favorites into a dated library with XMP sidecars.
//!
//! # Usage
//!
//! ```text
//! favsync sync --user <name> --api-key <key> [--mode session|pool] [--workers N]
//! favsync migrate
//! favsync status [--json]
//! favsync inspect <sidecar>
//! ```
//!
//! Global options: `--config <file>`, `--library <dir>`, `--log <filter>`,
//! `--mode session|pool`, `--exiftool <program>`.

mod catalog;
mod commands;
mod config;
mod download;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{inspect::InspectArgs, migrate::MigrateArgs, status::StatusArgs, sync::SyncArgs};
use config::{FileConfig, Settings};
use favsync_exiftool::ChannelMode;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "favsync",
    version,
    about = "Sync favorited catalog posts into a local library with metadata sidecars",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command; each overrides the config file.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct GlobalArgs {
    /// Config file (default: <config dir>/favsync/config.yaml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Library root (default: ./library).
    #[arg(long, global = true)]
    pub library: Option<PathBuf>,

    /// Log filter, e.g. `info` or `favsync_library=debug`. RUST_LOG wins.
    #[arg(long, global = true)]
    pub log: Option<String>,

    /// How exiftool is driven: one stay-open session or a process per call.
    #[arg(long, global = true)]
    pub mode: Option<ChannelMode>,

    /// exiftool executable.
    #[arg(long, global = true)]
    pub exiftool: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch favorites, download missing assets and refresh their sidecars.
    Sync(SyncArgs),

    /// Open the library, running any pending layout migration.
    Migrate(MigrateArgs),

    /// Show the library version and file counts.
    Status(StatusArgs),

    /// Print the metadata recorded in a sidecar as JSON.
    Inspect(InspectArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let file = FileConfig::load(cli.global.config.as_deref())?;
    let settings = Settings::resolve(&cli.global, file);
    init_tracing(&settings.log);

    match cli.command {
        Commands::Sync(args) => args.run(&settings),
        Commands::Migrate(args) => args.run(&settings),
        Commands::Status(args) => args.run(&settings),
        Commands::Inspect(args) => args.run(&settings),
    }
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
