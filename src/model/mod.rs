//! Core data models for the catalog.
//!
//! Two families of types live here:
//! - scan-time records ([`TrackRecord`], [`AlbumRecord`], [`ArtistRef`]) built
//!   from the filesystem before anything touches the store
//! - stored rows ([`Artist`], [`Album`], [`Track`]) read back through SQLx
//!
//! plus the external catalog view ([`ExternalCatalogAlbum`]) and the audit
//! outcome ([`MatchResult`]).
//!
//! None of these hold a database handle. Related rows are fetched through
//! explicit calls in [`crate::db`].

use serde::Serialize;
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::normalize;

/// Metadata extracted from one audio file.
///
/// Only `source_path` is guaranteed; every other field may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackRecord {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub track_number: Option<u32>,
    pub release_year: Option<i32>,
    /// Whole seconds, truncated
    pub duration: u64,
    pub source_path: PathBuf,
}

/// An artist identified by name.
///
/// Two refs are the same artist when their [`ArtistRef::key`]s match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtistRef {
    pub name: String,
}

impl ArtistRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Accent-stripped, lower-cased identity key.
    pub fn key(&self) -> String {
        normalize::fold(&self.name)
    }

    /// Shared artist used when one directory holds several artists.
    pub fn various() -> Self {
        Self::new(VARIOUS_ARTISTS)
    }
}

/// Display name of the shared compilation artist.
pub const VARIOUS_ARTISTS: &str = "Various Artists";

/// All tracks found in one scanned directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumRecord {
    pub title: String,
    pub year: Option<i32>,
    /// Unique per album; the dedup key in the store
    pub directory_path: PathBuf,
    pub artist: ArtistRef,
    /// Never empty
    pub tracks: Vec<TrackRecord>,
}

impl AlbumRecord {
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

// ============================================================================
// Stored rows
// ============================================================================

/// An artist row in the local store.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Artist {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Display name as first seen
    pub name: String,
    /// Identity key, see [`ArtistRef::key`]
    pub normalized_name: String,
}

/// An album row in the local store.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Album {
    /// Database ID (auto-generated)
    pub id: i64,
    pub title: String,
    /// Release year (optional)
    pub year: Option<i64>,
    /// Directory the album was scanned from (unique)
    pub directory_path: String,
    pub artist_id: i64,
}

/// A track row in the local store.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Track {
    /// Database ID (auto-generated)
    pub id: i64,
    pub title: Option<String>,
    pub track_number: Option<i64>,
    /// Duration in seconds
    pub duration: i64,
    /// Absolute file path (unique identifier)
    pub path: String,
    pub album_id: i64,
    pub artist_id: Option<i64>,
}

// ============================================================================
// External catalog
// ============================================================================

/// An album in the external (physical media) catalog. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalCatalogAlbum {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub track_count: i64,
    /// Shelf code, e.g. `RO00042B`
    pub classification_code: String,
    /// Media formats the album is held in (CD, vinyl, ...)
    pub media_format: BTreeSet<String>,
    /// Flagged as missing from the shelves
    pub missing: bool,
}

impl ExternalCatalogAlbum {
    /// Media formats joined for display.
    pub fn formats_display(&self) -> String {
        self.media_format
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Outcome of matching one local album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchStatus {
    /// No candidate found
    Unmatched,
    /// Exactly one candidate
    ExactMatch,
    /// Several equally valid candidates
    AmbiguousMatch,
}

impl MatchStatus {
    /// Status implied by the number of candidates found.
    pub fn from_candidate_count(count: usize) -> Self {
        match count {
            0 => MatchStatus::Unmatched,
            1 => MatchStatus::ExactMatch,
            _ => MatchStatus::AmbiguousMatch,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Unmatched => "Unmatched",
            MatchStatus::ExactMatch => "ExactMatch",
            MatchStatus::AmbiguousMatch => "AmbiguousMatch",
        }
    }
}

/// A local album with the external candidates found for it.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub local_album: AlbumRecord,
    pub candidates: Vec<ExternalCatalogAlbum>,
    pub status: MatchStatus,
}

impl MatchResult {
    pub fn new(local_album: AlbumRecord, candidates: Vec<ExternalCatalogAlbum>) -> Self {
        let status = MatchStatus::from_candidate_count(candidates.len());
        Self {
            local_album,
            candidates,
            status,
        }
    }
}
