//! Unreadable file check.

use std::path::Path;

use crate::config::LibraryConfig;
use crate::library::check_files;

/// List audio files under `path` that cannot be opened
pub fn cmd_check(path: &Path, library: &LibraryConfig) -> anyhow::Result<()> {
    if !path.is_dir() {
        anyhow::bail!("{} is not a directory", path.display());
    }

    println!("Checking {}", path.display());
    let problems = check_files(path, library);

    if problems.is_empty() {
        println!("All audio files are readable.");
    } else {
        println!("Unreadable files:");
        for (file, reason) in &problems {
            println!("  ✗ {}", file.display());
            println!("      {}", reason);
        }
        println!("{} unreadable file(s).", problems.len());
    }
    Ok(())
}
