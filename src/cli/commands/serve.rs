//! Browse API command.

use anyhow::Context;
use std::path::Path;
use tokio::runtime::Runtime;

use crate::{db, server};

/// Serve the browse API until interrupted
pub fn cmd_serve(rt: &Runtime, db_path: &Path, bind: &str) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = db::init_db(&db::db_url(Some(db_path)))
            .await
            .context("Failed to open database")?;
        println!("Serving {} on http://{}", db_path.display(), bind);
        server::serve(pool, bind)
            .await
            .with_context(|| format!("Server on {bind} failed"))?;
        Ok(())
    })
}
