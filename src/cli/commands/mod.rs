//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `scan`: library scanning and store listings
//! - `audit`: matching the store against the external catalog
//! - `check`: finding unreadable audio files
//! - `serve`: the browse API
//! - `config`: writing and showing the config file

mod audit;
mod check;
mod config;
mod scan;
mod serve;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

use crate::config::Config;

pub use audit::cmd_audit;
pub use check::cmd_check;
pub use config::{cmd_config_init, cmd_config_show};
pub use scan::{cmd_list, cmd_scan, cmd_stats};
pub use serve::cmd_serve;

/// Catalog Audit CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the OS config directory)
    #[arg(long, global = true, env = "CATALOG_AUDIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Scan a directory tree into the local store
    Scan {
        /// Root directory to scan (defaults to the configured roots)
        path: Option<PathBuf>,
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
        /// Write skipped files and reasons to this file
        #[arg(long)]
        problems: Option<PathBuf>,
    },
    /// Show library totals
    Stats {
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List all albums in the store
    List {
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Match stored albums against the external catalog
    Audit {
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
        /// External catalog connection URL
        #[arg(long, env = "CATALOG_AUDIT_CATALOG_URL")]
        catalog_url: Option<String>,
        /// Write the per-album report here (CSV)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write external albums with no local match here (CSV)
        #[arg(long)]
        undigitized: Option<PathBuf>,
    },
    /// List audio files that cannot be read
    Check {
        /// Root directory to check
        path: PathBuf,
    },
    /// Serve the read-only browse API
    Serve {
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
        /// Address to bind, e.g. 127.0.0.1:8080
        #[arg(long)]
        bind: Option<String>,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let rt = Runtime::new()?;

    match &cli.command {
        Commands::Scan { path, db, problems } => {
            let roots = match path {
                Some(path) => vec![path.clone()],
                None => config.library.roots.clone(),
            };
            if roots.is_empty() {
                anyhow::bail!("No scan root given and none configured in [library] roots");
            }
            cmd_scan(
                &rt,
                &roots,
                &db_path(db.as_deref(), config),
                problems.as_deref(),
                &config.library,
            )
        }
        Commands::Stats { db } => cmd_stats(&rt, &db_path(db.as_deref(), config)),
        Commands::List { db } => cmd_list(&rt, &db_path(db.as_deref(), config)),
        Commands::Audit {
            db,
            catalog_url,
            output,
            undigitized,
        } => {
            let mut catalog = config.catalog.clone();
            if let Some(url) = catalog_url {
                catalog.url = Some(url.clone());
            }
            cmd_audit(
                &rt,
                &db_path(db.as_deref(), config),
                &catalog,
                output.as_deref(),
                undigitized.as_deref(),
            )
        }
        Commands::Check { path } => cmd_check(path, &config.library),
        Commands::Serve { db, bind } => cmd_serve(
            &rt,
            &db_path(db.as_deref(), config),
            bind.as_deref().unwrap_or(&config.server.bind),
        ),
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => cmd_config_init(cli.config.as_deref(), *force),
            ConfigAction::Show => cmd_config_show(config),
        },
    }
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Database path from the flag, falling back to the config.
fn db_path(flag: Option<&Path>, config: &Config) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| config.library.database.clone())
}

/// Format whole seconds as `H:MM:SS`.
pub(crate) fn format_runtime(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
