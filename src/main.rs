//! Catalog Audit - a digital music catalog cross-referenced against a
//! physical media inventory.
//!
//! Scans a music tree into a local SQLite store, matches the stored albums
//! against an external catalog database, and serves a small browse API.

pub mod audit;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod library;
pub mod matcher;
pub mod metadata;
pub mod model;
pub mod normalize;
pub mod scanner;
pub mod server;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Crate path plus the explicit targets used by the tracing macros.
const LOG_TARGETS: &[&str] = &[
    "catalog_audit",
    "scanner",
    "metadata",
    "db",
    "matcher",
    "audit",
    "server",
];

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let mut filter = EnvFilter::from_default_env();
    for target in LOG_TARGETS {
        let directive: Directive = format!("{target}={level}").parse()?;
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    let config = match &args.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    };

    cli::run_command(&args, &config)
}
