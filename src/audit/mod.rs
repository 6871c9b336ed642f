//! Audit pass: match every stored album against the external catalog.
//!
//! Produces one [`MatchResult`] per local album plus the list of external
//! albums that no local album matched. Both can be written as CSV.

use futures::StreamExt;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::io;

use crate::catalog::ExternalCatalog;
use crate::db;
use crate::error::{Error, Result, ResultExt};
use crate::matcher::CatalogIndex;
use crate::model::{ExternalCatalogAlbum, MatchResult, MatchStatus};

/// Outcome of one audit run.
#[derive(Debug, Default)]
pub struct AuditReport {
    /// One per local album, in store order
    pub results: Vec<MatchResult>,
    /// External albums no local album matched, by classification code
    pub undigitized: Vec<ExternalCatalogAlbum>,
    /// Local albums that could not be loaded from the store
    pub skipped: usize,
}

impl AuditReport {
    pub fn count(&self, status: MatchStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

/// Match every album in the local store.
///
/// A local album that fails to load is logged and skipped; the rest of the
/// audit carries on.
pub async fn run_audit(pool: &SqlitePool, catalog: &dyn ExternalCatalog) -> Result<AuditReport> {
    let external = catalog
        .albums()
        .await
        .with_context("Failed to load external catalog")?;
    let mut seen = HashSet::with_capacity(external.len());
    if let Some(dup) = external.iter().find(|a| !seen.insert(a.id)) {
        return Err(Error::catalog(format!(
            "album id {} appears more than once",
            dup.id
        )));
    }
    let index = CatalogIndex::new(external);

    let mut report = AuditReport::default();
    let mut matched: HashSet<i64> = HashSet::new();
    let mut albums = db::all_albums(pool);

    while let Some(row) = albums.next().await {
        let album = match row {
            Ok(album) => album,
            Err(e) => {
                tracing::error!(target: "audit", error = %e, "Failed to read album row");
                report.skipped += 1;
                continue;
            }
        };
        let record = match db::album_record(pool, &album).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(target: "audit", album = %album.title, error = %e, "Failed to load album");
                report.skipped += 1;
                continue;
            }
        };

        let result = index.match_album(record);
        matched.extend(result.candidates.iter().map(|c| c.id));
        report.results.push(result);
    }

    let mut undigitized: Vec<ExternalCatalogAlbum> = index
        .albums()
        .iter()
        .filter(|a| !matched.contains(&a.id))
        .cloned()
        .collect();
    undigitized.sort_by(|a, b| a.classification_code.cmp(&b.classification_code));
    report.undigitized = undigitized;

    tracing::info!(
        target: "audit",
        albums = report.results.len(),
        exact = report.count(MatchStatus::ExactMatch),
        ambiguous = report.count(MatchStatus::AmbiguousMatch),
        unmatched = report.count(MatchStatus::Unmatched),
        undigitized = report.undigitized.len(),
        "Audit complete"
    );

    Ok(report)
}

/// One line of the audit report.
#[derive(Debug, Serialize)]
pub struct ReportRow {
    pub matching_status: &'static str,
    pub digitized: &'static str,
    pub external_ids: String,
    pub library_codes: String,
    pub formats: String,
    pub title: String,
    pub artist: String,
    pub year: Option<i32>,
    pub track_count: usize,
    pub path: String,
}

impl From<&MatchResult> for ReportRow {
    fn from(result: &MatchResult) -> Self {
        let join = |f: fn(&ExternalCatalogAlbum) -> String| {
            result
                .candidates
                .iter()
                .map(f)
                .collect::<Vec<_>>()
                .join(";")
        };
        let album = &result.local_album;
        Self {
            matching_status: result.status.as_str(),
            digitized: if result.candidates.is_empty() { "" } else { "Yes" },
            external_ids: join(|c| c.id.to_string()),
            library_codes: join(|c| c.classification_code.clone()),
            formats: join(ExternalCatalogAlbum::formats_display),
            title: album.title.clone(),
            artist: album.artist.name.clone(),
            year: album.year,
            track_count: album.track_count(),
            path: album.directory_path.to_string_lossy().into_owned(),
        }
    }
}

/// External album row of the "not yet digitized" list.
#[derive(Debug, Serialize)]
pub struct UndigitizedRow<'a> {
    pub library_code: &'a str,
    pub id: i64,
    pub title: &'a str,
    pub artist: &'a str,
    pub track_count: i64,
    pub format: String,
    pub missing: bool,
}

impl<'a> From<&'a ExternalCatalogAlbum> for UndigitizedRow<'a> {
    fn from(album: &'a ExternalCatalogAlbum) -> Self {
        Self {
            library_code: &album.classification_code,
            id: album.id,
            title: &album.title,
            artist: &album.artist,
            track_count: album.track_count,
            format: album.formats_display(),
            missing: album.missing,
        }
    }
}

/// Write one CSV row per local album.
pub fn write_report<W: io::Write>(results: &[MatchResult], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for result in results {
        csv.serialize(ReportRow::from(result))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the external albums nobody matched.
pub fn write_undigitized<W: io::Write>(albums: &[ExternalCatalogAlbum], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for album in albums {
        csv.serialize(UndigitizedRow::from(album))?;
    }
    csv.flush()?;
    Ok(())
}
