//! Command-line interface for catalog-audit.
//!
//! This module provides CLI commands for scanning a music tree into the
//! local store, auditing it against the external catalog, and browsing it.

mod commands;

pub use commands::{Cli, run_command};
