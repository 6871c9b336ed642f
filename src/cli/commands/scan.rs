//! Library scanning and store listing commands.

use anyhow::Context;
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

use crate::config::LibraryConfig;
use crate::db;
use crate::library::{self, ScanEvent, ScanSummary};

use super::format_runtime;

/// Scan one or more roots into the store
pub fn cmd_scan(
    rt: &Runtime,
    roots: &[PathBuf],
    db_path: &Path,
    problems: Option<&Path>,
    library_config: &LibraryConfig,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = db::init_db(&db::db_url(Some(db_path)))
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;

        let mut summary = ScanSummary::default();
        for root in roots {
            println!("Scanning directory: {}", root.display());
            let stream = library::scan_library(pool.clone(), root.clone(), library_config.clone());
            let mut stream = std::pin::pin!(stream);

            while let Some(event) = stream.next().await {
                match &event {
                    ScanEvent::Album { path, tracks, .. } => {
                        print!("\rScanned {} albums...", summary.albums + 1);
                        std::io::stdout().flush().ok();
                        tracing::debug!(target: "scanner", dir = %path.display(), tracks, "Album stored");
                    }
                    ScanEvent::Error(p, e) => {
                        eprintln!("\nError processing {}: {}", p.display(), e);
                    }
                }
                summary.record(event);
            }
        }

        println!(
            "\nScan complete: {} albums, {} tracks, {} conflicts, {} problem files.",
            summary.albums,
            summary.tracks,
            summary.conflicts,
            summary.problems.len()
        );

        if let Some(path) = problems {
            summary
                .write_problems(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Problem files written to {}", path.display());
        }
        Ok(())
    })
}

/// Print library totals
pub fn cmd_stats(rt: &Runtime, db_path: &Path) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = db::init_db(&db::db_url(Some(db_path)))
            .await
            .context("Failed to open database")?;
        let stats = db::library_stats(&pool).await?;

        println!("Library Statistics");
        println!("==================");
        println!("Artists: {}", stats.artists);
        println!("Albums:  {}", stats.albums);
        println!("Tracks:  {}", stats.tracks);
        println!("Runtime: {}", format_runtime(stats.runtime_seconds));
        Ok(())
    })
}

/// List all albums in the store
pub fn cmd_list(rt: &Runtime, db_path: &Path) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = db::init_db(&db::db_url(Some(db_path)))
            .await
            .context("Failed to open database")?;
        let albums = db::album_summaries(&pool).await?;

        for album in albums {
            let year = album
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "----".to_string());
            println!(
                "{} | {} - {} ({} tracks) {}",
                year, album.artist_name, album.title, album.track_count, album.directory_path
            );
        }
        Ok(())
    })
}
