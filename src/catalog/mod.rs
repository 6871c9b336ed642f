//! External catalog access.
//!
//! The external catalog is the physical-media inventory that local albums
//! are reconciled against. It is owned by someone else and only ever read.
//!
//! Access goes through the [`ExternalCatalog`] trait so the audit can run
//! against the real database or an in-memory stand-in. [`SqlCatalog`] reads
//! from any database sqlx's `Any` driver can reach (MySQL in production,
//! SQLite for local copies), expecting these tables:
//!
//! ```text
//! album(id, name, artist_id, letter, missing)
//! artist(id, name, genre_id, lib_number)
//! genre(id, abbreviation)
//! song(id, album_id)
//! format(id, name)
//! album_format(album_id, format_id)
//! ```

use async_trait::async_trait;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use std::collections::{BTreeSet, HashMap};

use crate::config::CatalogConfig;
use crate::error::{Error, Result, ResultExt};
use crate::model::ExternalCatalogAlbum;

/// Read-only view of an external catalog.
#[async_trait]
pub trait ExternalCatalog: Send + Sync {
    /// Every album in the catalog, in a stable order.
    ///
    /// Each album carries its track count, classification code and media
    /// formats, so no further lookups are needed.
    async fn albums(&self) -> Result<Vec<ExternalCatalogAlbum>>;
}

/// Shelf code: genre abbreviation, artist number padded to five digits,
/// then the album letter. `("RO", 42, "B")` -> `"RO00042B"`.
pub fn classification_code(genre: &str, lib_number: i64, letter: &str) -> String {
    format!("{genre}{lib_number:0>5}{letter}")
}

/// External catalog backed by a SQL database.
pub struct SqlCatalog {
    pool: AnyPool,
}

#[derive(sqlx::FromRow)]
struct AlbumRow {
    id: i64,
    title: String,
    artist: String,
    genre: String,
    lib_number: i64,
    letter: String,
    track_count: i64,
    missing: i64,
}

// CAST(.. AS SIGNED) yields a 64-bit integer in MySQL and is a no-op in SQLite.
const ALBUMS_QUERY: &str = r#"
    SELECT CAST(a.id AS SIGNED) AS id,
           a.name AS title,
           ar.name AS artist,
           COALESCE(g.abbreviation, '') AS genre,
           CAST(COALESCE(ar.lib_number, 0) AS SIGNED) AS lib_number,
           COALESCE(a.letter, '') AS letter,
           CAST((SELECT COUNT(*) FROM song s WHERE s.album_id = a.id) AS SIGNED) AS track_count,
           CAST(COALESCE(a.missing, 0) AS SIGNED) AS missing
    FROM album a
    JOIN artist ar ON a.artist_id = ar.id
    LEFT JOIN genre g ON ar.genre_id = g.id
    ORDER BY a.id
"#;

const FORMATS_QUERY: &str = r#"
    SELECT CAST(af.album_id AS SIGNED) AS album_id, f.name AS name
    FROM album_format af
    JOIN format f ON af.format_id = f.id
"#;

impl SqlCatalog {
    /// Open a single connection to the catalog at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .with_context("Failed to connect to external catalog")?;
        Ok(Self::from_pool(pool))
    }

    /// Connect using the configured URL and credentials.
    pub async fn from_config(config: &CatalogConfig) -> Result<Self> {
        let url = config
            .connection_url()
            .ok_or_else(|| Error::config("no external catalog URL configured ([catalog] url)"))?;
        Self::connect(&url).await
    }

    pub fn from_pool(pool: AnyPool) -> Self {
        Self { pool }
    }

    async fn formats(&self) -> Result<HashMap<i64, BTreeSet<String>>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(FORMATS_QUERY)
            .fetch_all(&self.pool)
            .await
            .with_context("Failed to read album formats")?;

        let mut formats: HashMap<i64, BTreeSet<String>> = HashMap::new();
        for (album_id, name) in rows {
            formats.entry(album_id).or_default().insert(name);
        }
        Ok(formats)
    }
}

#[async_trait]
impl ExternalCatalog for SqlCatalog {
    async fn albums(&self) -> Result<Vec<ExternalCatalogAlbum>> {
        let rows = sqlx::query_as::<_, AlbumRow>(ALBUMS_QUERY)
            .fetch_all(&self.pool)
            .await
            .with_context("Failed to read external catalog albums")?;
        let mut formats = self.formats().await?;

        tracing::info!(target: "audit", albums = rows.len(), "External catalog loaded");

        Ok(rows
            .into_iter()
            .map(|row| ExternalCatalogAlbum {
                id: row.id,
                classification_code: classification_code(&row.genre, row.lib_number, &row.letter),
                title: row.title,
                artist: row.artist,
                track_count: row.track_count,
                media_format: formats.remove(&row.id).unwrap_or_default(),
                missing: row.missing != 0,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_code_pads_artist_number() {
        assert_eq!(classification_code("RO", 42, "B"), "RO00042B");
        assert_eq!(classification_code("JZ", 123456, "A"), "JZ123456A");
        assert_eq!(classification_code("", 7, ""), "00007");
    }

    async fn sqlite_catalog(dir: &std::path::Path) -> SqlCatalog {
        let url = format!("sqlite:{}?mode=rwc", dir.join("catalog.db").display());
        let catalog = SqlCatalog::connect(&url).await.unwrap();

        for statement in [
            "CREATE TABLE genre (id INTEGER PRIMARY KEY, abbreviation TEXT NOT NULL)",
            "CREATE TABLE artist (id INTEGER PRIMARY KEY, name TEXT NOT NULL, genre_id INTEGER, lib_number INTEGER)",
            "CREATE TABLE album (id INTEGER PRIMARY KEY, name TEXT NOT NULL, artist_id INTEGER NOT NULL, letter TEXT NOT NULL, missing INTEGER NOT NULL)",
            "CREATE TABLE song (id INTEGER PRIMARY KEY, album_id INTEGER NOT NULL)",
            "CREATE TABLE format (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            "CREATE TABLE album_format (album_id INTEGER NOT NULL, format_id INTEGER NOT NULL)",
            "INSERT INTO genre VALUES (1, 'RO'), (2, 'JZ')",
            "INSERT INTO artist VALUES (1, 'Pink Floyd', 1, 42), (2, 'Miles Davis', 2, 7)",
            "INSERT INTO album VALUES (10, 'The Wall', 1, 'B', 0), (11, 'Kind of Blue', 2, 'A', 1)",
            "INSERT INTO song (album_id) VALUES (10), (10), (10), (11)",
            "INSERT INTO format VALUES (1, 'CD'), (2, 'Vinyl')",
            "INSERT INTO album_format VALUES (10, 1), (10, 2), (11, 2)",
        ] {
            sqlx::query(statement).execute(&catalog.pool).await.unwrap();
        }
        catalog
    }

    #[tokio::test]
    async fn test_sql_catalog_reads_albums() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = sqlite_catalog(dir.path()).await;

        let albums = catalog.albums().await.unwrap();
        assert_eq!(albums.len(), 2);

        let wall = &albums[0];
        assert_eq!(wall.id, 10);
        assert_eq!(wall.title, "The Wall");
        assert_eq!(wall.artist, "Pink Floyd");
        assert_eq!(wall.track_count, 3);
        assert_eq!(wall.classification_code, "RO00042B");
        assert_eq!(wall.formats_display(), "CD/Vinyl");
        assert!(!wall.missing);

        let blue = &albums[1];
        assert_eq!(blue.classification_code, "JZ00007A");
        assert_eq!(blue.track_count, 1);
        assert!(blue.missing);
    }

    #[tokio::test]
    async fn test_sql_catalog_album_without_songs_or_formats() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = sqlite_catalog(dir.path()).await;
        sqlx::query("INSERT INTO album VALUES (12, 'Unreleased', 1, 'C', 0)")
            .execute(&catalog.pool)
            .await
            .unwrap();

        let albums = catalog.albums().await.unwrap();
        let unreleased = albums.iter().find(|a| a.id == 12).unwrap();
        assert_eq!(unreleased.track_count, 0);
        assert!(unreleased.media_format.is_empty());
    }

    #[tokio::test]
    async fn test_from_config_requires_url() {
        let result = SqlCatalog::from_config(&CatalogConfig::default()).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_catalog_fails() {
        let result = SqlCatalog::connect("sqlite:/nonexistent/dir/catalog.db").await;
        assert!(result.is_err());
    }
}
