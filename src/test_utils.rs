//! Test utilities and fixtures for catalog-audit tests.
//!
//! This module provides a temporary store, record factories, small audio
//! fixture writers and an in-memory external catalog to reduce boilerplate
//! in tests.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{temp_db, mock_album};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (pool, _dir) = temp_db().await;
//!     let album = mock_album("/music/A/B", "B", "A", 3);
//!     // ... test logic
//! }
//! ```

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt, TagType};
use sqlx::sqlite::SqlitePool;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::catalog::ExternalCatalog;
use crate::error::Result;
use crate::model::{AlbumRecord, ArtistRef, ExternalCatalogAlbum, TrackRecord};

/// Creates a temporary database for testing.
///
/// The database is created in a temporary directory that is automatically
/// cleaned up when the returned `TempDir` is dropped. Migrations are run
/// automatically.
///
/// Keep the TempDir alive for the duration of your test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// Creates a mock TrackRecord numbered `n` at `path`.
///
/// Customize using struct update syntax:
///
/// ```ignore
/// let custom = TrackRecord {
///     artist: None,
///     ..mock_track_record("/m/A/B/01.mp3", 1)
/// };
/// ```
pub fn mock_track_record(path: &str, n: u32) -> TrackRecord {
    TrackRecord {
        title: Some(format!("Track {n}")),
        artist: Some("Test Artist".to_string()),
        album: Some("Test Album".to_string()),
        album_artist: None,
        track_number: Some(n),
        release_year: Some(1979),
        duration: 180,
        source_path: PathBuf::from(path),
    }
}

/// Creates an album at `dir` with `tracks` numbered tracks by `artist`.
pub fn mock_album(dir: &str, title: &str, artist: &str, tracks: u32) -> AlbumRecord {
    let directory_path = PathBuf::from(dir);
    let tracks = (1..=tracks)
        .map(|n| {
            let path = directory_path.join(format!("{n:02} Track {n}.mp3"));
            TrackRecord {
                artist: Some(artist.to_string()),
                album: Some(title.to_string()),
                ..mock_track_record(&path.to_string_lossy(), n)
            }
        })
        .collect();

    AlbumRecord {
        title: title.to_string(),
        year: Some(1979),
        directory_path,
        artist: ArtistRef::new(artist),
        tracks,
    }
}

/// Creates an external catalog album with a shelf code derived from its id.
pub fn mock_external(id: i64, title: &str, artist: &str, track_count: i64) -> ExternalCatalogAlbum {
    ExternalCatalogAlbum {
        id,
        title: title.to_string(),
        artist: artist.to_string(),
        track_count,
        classification_code: crate::catalog::classification_code("RO", id, "A"),
        media_format: ["CD".to_string()].into_iter().collect(),
        missing: false,
    }
}

/// External catalog held in memory.
pub struct MemoryCatalog(pub Vec<ExternalCatalogAlbum>);

#[async_trait]
impl ExternalCatalog for MemoryCatalog {
    async fn albums(&self) -> Result<Vec<ExternalCatalogAlbum>> {
        Ok(self.0.clone())
    }
}

// ============================================================================
// Audio fixtures
// ============================================================================

/// Tags written by [`write_tagged_mp3`]. `None` leaves the frame out.
pub struct Mp3Tags<'a> {
    pub title: Option<&'a str>,
    pub artist: Option<&'a str>,
    pub album: Option<&'a str>,
    pub date: Option<&'a str>,
    pub track: Option<u32>,
}

// MPEG-1 Layer III, 128 kbps, 44.1 kHz, no padding: 417 bytes per frame
const MP3_FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x00];
const MP3_FRAME_LEN: usize = 417;

/// Write a short silent MP3 with an ID3v2 tag.
pub fn write_tagged_mp3(path: &Path, tags: &Mp3Tags) {
    let mut frame = vec![0u8; MP3_FRAME_LEN];
    frame[..4].copy_from_slice(&MP3_FRAME_HEADER);
    std::fs::write(path, frame.repeat(20)).expect("Failed to write mp3 fixture");

    let mut tag = Tag::new(TagType::Id3v2);
    if let Some(title) = tags.title {
        tag.set_title(title.to_string());
    }
    if let Some(artist) = tags.artist {
        tag.set_artist(artist.to_string());
    }
    if let Some(album) = tags.album {
        tag.set_album(album.to_string());
    }
    if let Some(track) = tags.track {
        tag.set_track(track);
    }
    if let Some(date) = tags.date {
        tag.insert_text(ItemKey::RecordingDate, date.to_string());
    }
    tag.save_to_path(path, WriteOptions::default())
        .expect("Failed to tag mp3 fixture");
}

/// Write a short silent MP3 behind a hand-built ID3v2.4 tag.
///
/// Frames are written verbatim as UTF-8 text frames, so values a tag
/// writer would reject (a TDRC of `"unknown"`) end up in the file.
pub fn write_id3v24_mp3(path: &Path, frames: &[(&str, &str)]) {
    let mut body = Vec::new();
    for (id, value) in frames {
        let len = value.len() as u32 + 1;
        body.extend_from_slice(id.as_bytes());
        body.extend_from_slice(&synchsafe(len));
        body.extend_from_slice(&[0, 0]);
        body.push(3); // UTF-8
        body.extend_from_slice(value.as_bytes());
    }

    let mut bytes = Vec::with_capacity(10 + body.len());
    bytes.extend_from_slice(b"ID3");
    bytes.extend_from_slice(&[4, 0, 0]);
    bytes.extend_from_slice(&synchsafe(body.len() as u32));
    bytes.extend_from_slice(&body);

    let mut frame = vec![0u8; MP3_FRAME_LEN];
    frame[..4].copy_from_slice(&MP3_FRAME_HEADER);
    bytes.extend_from_slice(&frame.repeat(20));
    std::fs::write(path, bytes).expect("Failed to write mp3 fixture");
}

fn synchsafe(n: u32) -> [u8; 4] {
    [
        ((n >> 21) & 0x7F) as u8,
        ((n >> 14) & 0x7F) as u8,
        ((n >> 7) & 0x7F) as u8,
        (n & 0x7F) as u8,
    ]
}

/// Write a mono 16-bit PCM WAV of `frames` silent samples.
pub fn write_wav(path: &Path, sample_rate: u32, frames: u32) {
    let data_len = frames * 2;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);
    std::fs::write(path, bytes).expect("Failed to write wav fixture");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_db_creates_working_database() {
        let (pool, _dir) = temp_db().await;

        let artists = crate::db::get_all_artists(&pool).await.unwrap();
        assert!(artists.is_empty());
    }

    #[test]
    fn test_mock_album_defaults() {
        let album = mock_album("/music/A/B", "B", "A", 3);
        assert_eq!(album.track_count(), 3);
        assert_eq!(album.tracks[2].track_number, Some(3));
        assert_eq!(
            album.tracks[0].source_path,
            PathBuf::from("/music/A/B/01 Track 1.mp3")
        );
        assert_eq!(album.tracks[0].artist.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_memory_catalog() {
        let catalog = MemoryCatalog(vec![mock_external(7, "T", "A", 2)]);
        let albums = catalog.albums().await.unwrap();
        assert_eq!(albums[0].classification_code, "RO00007A");
    }

    #[test]
    fn test_write_wav_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.wav");
        write_wav(&path, 8000, 100);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 44 + 200);
    }
}
