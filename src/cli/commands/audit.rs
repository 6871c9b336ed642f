//! External catalog audit command.

use anyhow::Context;
use std::fs::File;
use std::path::Path;
use tokio::runtime::Runtime;

use crate::audit::{self, write_report, write_undigitized};
use crate::catalog::SqlCatalog;
use crate::config::CatalogConfig;
use crate::db;
use crate::model::MatchStatus;

/// Match every stored album against the external catalog
pub fn cmd_audit(
    rt: &Runtime,
    db_path: &Path,
    catalog_config: &CatalogConfig,
    output: Option<&Path>,
    undigitized: Option<&Path>,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = db::init_db(&db::db_url(Some(db_path)))
            .await
            .context("Failed to open database")?;
        let catalog = SqlCatalog::from_config(catalog_config).await?;

        let report = audit::run_audit(&pool, &catalog).await?;

        match output {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                write_report(&report.results, file)?;
                println!("Report written to {}", path.display());
            }
            None => write_report(&report.results, std::io::stdout().lock())?,
        }

        if let Some(path) = undigitized {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_undigitized(&report.undigitized, file)?;
            println!("Undigitized list written to {}", path.display());
        }

        eprintln!();
        eprintln!("Audit Summary");
        eprintln!("=============");
        eprintln!("Albums audited: {}", report.results.len());
        eprintln!("  Exact:       {}", report.count(MatchStatus::ExactMatch));
        eprintln!("  Ambiguous:   {}", report.count(MatchStatus::AmbiguousMatch));
        eprintln!("  Unmatched:   {}", report.count(MatchStatus::Unmatched));
        if report.skipped > 0 {
            eprintln!("  Skipped:     {}", report.skipped);
        }
        eprintln!("Not yet digitized: {}", report.undigitized.len());
        Ok(())
    })
}
