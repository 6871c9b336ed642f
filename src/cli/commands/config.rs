//! Config file commands.

use anyhow::Context;
use std::path::Path;

use crate::config::{self, Config};

/// Write a default config file
pub fn cmd_config_init(path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let target = match path {
        Some(path) => path.to_path_buf(),
        None => config::config_path().context("Could not determine config directory")?,
    };

    if target.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            target.display()
        );
    }

    config::save_to(&Config::default(), &target)?;
    println!("Wrote default config to {}", target.display());
    Ok(())
}

/// Print the effective configuration as TOML
pub fn cmd_config_show(config: &Config) -> anyhow::Result<()> {
    let mut shown = config.clone();
    if shown.catalog.password.is_some() {
        shown.catalog.password = Some("********".to_string());
    }
    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}
