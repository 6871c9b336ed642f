//! Local catalog store.
//!
//! Uses SQLx with SQLite for lightweight, embedded storage of the scanned
//! library. Provides:
//! - album persistence with dedup on the album's directory path
//! - artist identity by accent/case-insensitive name
//! - plain projection queries for reporting and browsing
//!
//! All reads return plain data. Related rows (an album's tracks or artist)
//! are fetched with explicit calls such as [`tracks_of`] and [`artist_of`].
//!
//! # Example
//!
//! ```ignore
//! use catalog_audit::db::{init_db, persist_album};
//!
//! let pool = init_db("sqlite:catalog_audit.db").await?;
//! let stored = persist_album(&pool, &album).await?;
//! ```

use futures::stream::BoxStream;
use serde::Serialize;
use sqlx::SqliteConnection;
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};

use crate::config::DEFAULT_DB_NAME;
use crate::model::{Album, AlbumRecord, Artist, ArtistRef, Track, TrackRecord};

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist.
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

// ============================================================================
// Persistence
// ============================================================================

/// A stored value that disagreed with a rescan of the same directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlbumConflict {
    Title { stored: String, incoming: String },
    Year { stored: Option<i64>, incoming: Option<i64> },
    /// The album was re-pointed to "Various Artists"
    Artist { stored: String, incoming: String },
}

/// Result of [`persist_album`].
#[derive(Debug, Clone)]
pub struct PersistedAlbum {
    pub id: i64,
    /// Empty for a first insert or a consistent rescan
    pub conflicts: Vec<AlbumConflict>,
}

/// Get or create an artist by name.
///
/// Identity is the accent-stripped, lower-cased name, so `"Björk"` and
/// `"bjork"` share one row. The display name of the first sighting is kept.
pub async fn get_or_create_artist(pool: &SqlitePool, name: &str) -> sqlx::Result<i64> {
    let mut conn = pool.acquire().await?;
    artist_id_for(&mut conn, name).await
}

async fn artist_id_for(conn: &mut SqliteConnection, name: &str) -> sqlx::Result<i64> {
    let key = ArtistRef::new(name).key();
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM artists WHERE normalized_name = ?")
        .bind(&key)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some((id,)) = row {
        Ok(id)
    } else {
        let result = sqlx::query("INSERT INTO artists (name, normalized_name) VALUES (?, ?)")
            .bind(name.trim())
            .bind(&key)
            .execute(&mut *conn)
            .await?;
        tracing::debug!(target: "db::persist", artist = %name, "New artist");
        Ok(result.last_insert_rowid())
    }
}

/// Persist an album and its tracks.
///
/// The directory path is the dedup key. When an album already exists at
/// that path the stored row stays authoritative: title and year differences
/// are only reported, while an artist difference re-points the album to the
/// shared "Various Artists" artist. Tracks are reconciled by path.
///
/// Runs in a single transaction.
pub async fn persist_album(pool: &SqlitePool, album: &AlbumRecord) -> sqlx::Result<PersistedAlbum> {
    let mut tx = pool.begin().await?;
    let directory = album.directory_path.to_string_lossy();
    let artist_id = artist_id_for(&mut tx, &album.artist.name).await?;
    let year = album.year.map(i64::from);

    let existing = sqlx::query_as::<_, Album>(
        "SELECT id, title, year, directory_path, artist_id FROM albums WHERE directory_path = ?",
    )
    .bind(directory.as_ref())
    .fetch_optional(&mut *tx)
    .await?;

    let (album_id, conflicts) = match existing {
        None => {
            let result = sqlx::query(
                "INSERT INTO albums (title, year, directory_path, artist_id) VALUES (?, ?, ?, ?)",
            )
            .bind(&album.title)
            .bind(year)
            .bind(directory.as_ref())
            .bind(artist_id)
            .execute(&mut *tx)
            .await?;
            (result.last_insert_rowid(), Vec::new())
        }
        Some(stored) => {
            let conflicts = reconcile_album(&mut tx, &stored, album, artist_id).await?;
            (stored.id, conflicts)
        }
    };

    for track in &album.tracks {
        let track_artist_id = match track.artist.as_deref() {
            Some(name) if !name.trim().is_empty() => artist_id_for(&mut tx, name).await?,
            _ => artist_id,
        };
        upsert_track(&mut tx, track, album_id, track_artist_id).await?;
    }

    tx.commit().await?;

    tracing::debug!(
        target: "db::persist",
        album = %album.title,
        tracks = album.tracks.len(),
        id = album_id,
        "Album persisted"
    );

    Ok(PersistedAlbum {
        id: album_id,
        conflicts,
    })
}

async fn reconcile_album(
    conn: &mut SqliteConnection,
    stored: &Album,
    incoming: &AlbumRecord,
    incoming_artist_id: i64,
) -> sqlx::Result<Vec<AlbumConflict>> {
    let mut conflicts = Vec::new();
    let path = &stored.directory_path;

    if stored.title != incoming.title {
        tracing::warn!(
            target: "db::persist",
            path = %path,
            stored = %stored.title,
            incoming = %incoming.title,
            "Album at this path has a different title; keeping stored"
        );
        conflicts.push(AlbumConflict::Title {
            stored: stored.title.clone(),
            incoming: incoming.title.clone(),
        });
    }

    let incoming_year = incoming.year.map(i64::from);
    if stored.year != incoming_year {
        tracing::warn!(
            target: "db::persist",
            path = %path,
            stored = ?stored.year,
            incoming = ?incoming_year,
            "Album at this path has a different year; keeping stored"
        );
        conflicts.push(AlbumConflict::Year {
            stored: stored.year,
            incoming: incoming_year,
        });
    }

    if stored.artist_id != incoming_artist_id {
        let various_id = artist_id_for(conn, &ArtistRef::various().name).await?;
        if stored.artist_id != various_id {
            let stored_name: (String,) = sqlx::query_as("SELECT name FROM artists WHERE id = ?")
                .bind(stored.artist_id)
                .fetch_one(&mut *conn)
                .await?;
            tracing::warn!(
                target: "db::persist",
                path = %path,
                stored = %stored_name.0,
                incoming = %incoming.artist.name,
                "Album at this path has a different artist; re-pointing to Various Artists"
            );
            sqlx::query("UPDATE albums SET artist_id = ? WHERE id = ?")
                .bind(various_id)
                .bind(stored.id)
                .execute(&mut *conn)
                .await?;
            conflicts.push(AlbumConflict::Artist {
                stored: stored_name.0,
                incoming: incoming.artist.name.clone(),
            });
        }
    }

    Ok(conflicts)
}

async fn upsert_track(
    conn: &mut SqliteConnection,
    track: &TrackRecord,
    album_id: i64,
    artist_id: i64,
) -> sqlx::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO tracks (title, track_number, duration, path, album_id, artist_id)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(path) DO UPDATE SET
            title = excluded.title,
            track_number = excluded.track_number,
            duration = excluded.duration,
            album_id = excluded.album_id,
            artist_id = excluded.artist_id
        RETURNING id
        "#,
    )
    .bind(&track.title)
    .bind(track.track_number.map(i64::from))
    .bind(track.duration as i64)
    .bind(track.source_path.to_string_lossy().as_ref())
    .bind(album_id)
    .bind(artist_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.0)
}

// ============================================================================
// Reads
// ============================================================================

const ALBUM_COLUMNS: &str = "id, title, year, directory_path, artist_id";

/// Stream every stored album in insertion order.
///
/// Each call issues a fresh query, so the sequence can be restarted.
pub fn all_albums(pool: &SqlitePool) -> BoxStream<'_, sqlx::Result<Album>> {
    sqlx::query_as::<_, Album>(
        "SELECT id, title, year, directory_path, artist_id FROM albums ORDER BY id",
    )
    .fetch(pool)
}

/// Tracks of an album, in track-number order (unnumbered tracks last).
pub async fn tracks_of(pool: &SqlitePool, album_id: i64) -> sqlx::Result<Vec<Track>> {
    sqlx::query_as::<_, Track>(
        r#"
        SELECT id, title, track_number, duration, path, album_id, artist_id
        FROM tracks
        WHERE album_id = ?
        ORDER BY track_number IS NULL, track_number, path
        "#,
    )
    .bind(album_id)
    .fetch_all(pool)
    .await
}

/// The artist an album is attributed to.
pub async fn artist_of(pool: &SqlitePool, album_id: i64) -> sqlx::Result<Option<Artist>> {
    sqlx::query_as::<_, Artist>(
        r#"
        SELECT ar.id, ar.name, ar.normalized_name
        FROM artists ar
        JOIN albums al ON al.artist_id = ar.id
        WHERE al.id = ?
        "#,
    )
    .bind(album_id)
    .fetch_optional(pool)
    .await
}

#[derive(sqlx::FromRow)]
struct TrackWithArtistRow {
    title: Option<String>,
    track_number: Option<i64>,
    duration: i64,
    path: String,
    artist_name: Option<String>,
}

/// Rebuild the scan-time view of a stored album.
pub async fn album_record(pool: &SqlitePool, album: &Album) -> sqlx::Result<AlbumRecord> {
    let artist = artist_of(pool, album.id)
        .await?
        .map(|a| ArtistRef::new(a.name))
        .unwrap_or_else(ArtistRef::various);

    let rows = sqlx::query_as::<_, TrackWithArtistRow>(
        r#"
        SELECT t.title, t.track_number, t.duration, t.path, a.name AS artist_name
        FROM tracks t
        LEFT JOIN artists a ON t.artist_id = a.id
        WHERE t.album_id = ?
        ORDER BY t.track_number IS NULL, t.track_number, t.path
        "#,
    )
    .bind(album.id)
    .fetch_all(pool)
    .await?;

    let year = album.year.and_then(|y| i32::try_from(y).ok());
    let tracks = rows
        .into_iter()
        .map(|row| TrackRecord {
            title: row.title,
            artist: row.artist_name,
            album: Some(album.title.clone()),
            album_artist: None,
            track_number: row.track_number.and_then(|n| u32::try_from(n).ok()),
            release_year: year,
            duration: u64::try_from(row.duration).unwrap_or_default(),
            source_path: PathBuf::from(row.path),
        })
        .collect();

    Ok(AlbumRecord {
        title: album.title.clone(),
        year,
        directory_path: PathBuf::from(&album.directory_path),
        artist,
        tracks,
    })
}

/// Get an album by its database ID.
pub async fn get_album(pool: &SqlitePool, album_id: i64) -> sqlx::Result<Option<Album>> {
    sqlx::query_as::<_, Album>(&format!("SELECT {ALBUM_COLUMNS} FROM albums WHERE id = ?"))
        .bind(album_id)
        .fetch_optional(pool)
        .await
}

/// Get an album by the directory it was scanned from.
pub async fn get_album_by_path(pool: &SqlitePool, path: &str) -> sqlx::Result<Option<Album>> {
    sqlx::query_as::<_, Album>(&format!(
        "SELECT {ALBUM_COLUMNS} FROM albums WHERE directory_path = ?"
    ))
    .bind(path)
    .fetch_optional(pool)
    .await
}

/// Get an artist by its database ID.
pub async fn get_artist(pool: &SqlitePool, artist_id: i64) -> sqlx::Result<Option<Artist>> {
    sqlx::query_as::<_, Artist>("SELECT id, name, normalized_name FROM artists WHERE id = ?")
        .bind(artist_id)
        .fetch_optional(pool)
        .await
}

/// All artists, by name.
pub async fn get_all_artists(pool: &SqlitePool) -> sqlx::Result<Vec<Artist>> {
    sqlx::query_as::<_, Artist>(
        "SELECT id, name, normalized_name FROM artists ORDER BY normalized_name",
    )
    .fetch_all(pool)
    .await
}

/// Albums attributed to an artist, newest first.
pub async fn albums_by_artist(pool: &SqlitePool, artist_id: i64) -> sqlx::Result<Vec<Album>> {
    sqlx::query_as::<_, Album>(&format!(
        "SELECT {ALBUM_COLUMNS} FROM albums WHERE artist_id = ? ORDER BY year DESC, title"
    ))
    .bind(artist_id)
    .fetch_all(pool)
    .await
}

/// Album with joined artist name and track count.
///
/// Used by listings where human-readable names are needed rather than
/// foreign key IDs.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AlbumSummary {
    pub id: i64,
    pub title: String,
    pub year: Option<i64>,
    pub directory_path: String,
    pub artist_id: i64,
    pub artist_name: String,
    pub track_count: i64,
}

const ALBUM_SUMMARY_SELECT: &str = r#"
    SELECT al.id, al.title, al.year, al.directory_path, al.artist_id,
           ar.name AS artist_name,
           (SELECT COUNT(*) FROM tracks t WHERE t.album_id = al.id) AS track_count
    FROM albums al
    JOIN artists ar ON al.artist_id = ar.id
"#;

/// All albums with artist names, in insertion order.
pub async fn album_summaries(pool: &SqlitePool) -> sqlx::Result<Vec<AlbumSummary>> {
    sqlx::query_as::<_, AlbumSummary>(&format!("{ALBUM_SUMMARY_SELECT} ORDER BY al.id"))
        .fetch_all(pool)
        .await
}

/// Artists whose name contains `fragment` (case-insensitive, accents ignored).
pub async fn search_artists(pool: &SqlitePool, fragment: &str) -> sqlx::Result<Vec<Artist>> {
    sqlx::query_as::<_, Artist>(
        "SELECT id, name, normalized_name FROM artists WHERE normalized_name LIKE ? ORDER BY normalized_name",
    )
    .bind(like_pattern(&crate::normalize::fold(fragment)))
    .fetch_all(pool)
    .await
}

/// Albums whose title contains `fragment`.
pub async fn search_albums(pool: &SqlitePool, fragment: &str) -> sqlx::Result<Vec<AlbumSummary>> {
    sqlx::query_as::<_, AlbumSummary>(&format!(
        "{ALBUM_SUMMARY_SELECT} WHERE al.title LIKE ? ORDER BY al.title"
    ))
    .bind(like_pattern(fragment))
    .fetch_all(pool)
    .await
}

/// Tracks whose title contains `fragment`.
pub async fn search_tracks(pool: &SqlitePool, fragment: &str) -> sqlx::Result<Vec<Track>> {
    sqlx::query_as::<_, Track>(
        r#"
        SELECT id, title, track_number, duration, path, album_id, artist_id
        FROM tracks
        WHERE title LIKE ?
        ORDER BY title
        "#,
    )
    .bind(like_pattern(fragment))
    .fetch_all(pool)
    .await
}

fn like_pattern(fragment: &str) -> String {
    format!("%{}%", fragment.trim())
}

/// Library totals for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    pub artists: i64,
    pub albums: i64,
    pub tracks: i64,
    /// Sum of all track durations, in seconds
    pub runtime_seconds: i64,
}

/// Count artists, albums, tracks and total runtime.
pub async fn library_stats(pool: &SqlitePool) -> sqlx::Result<LibraryStats> {
    let (artists,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM artists")
        .fetch_one(pool)
        .await?;
    let (albums,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM albums")
        .fetch_one(pool)
        .await?;
    let (tracks, runtime_seconds): (i64, i64) =
        sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(duration), 0) FROM tracks")
            .fetch_one(pool)
            .await?;

    Ok(LibraryStats {
        artists,
        albums,
        tracks,
        runtime_seconds,
    })
}
