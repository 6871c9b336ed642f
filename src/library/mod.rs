//! Album aggregation and the scan pipeline.
//!
//! A scan walks the root, extracts every audio file, folds each directory's
//! tracks into one [`AlbumRecord`] and persists it. Files that cannot be
//! read are reported as [`ScanEvent::Error`] and skipped; they never stop
//! the scan.

use futures::{Stream, StreamExt, stream};
use sqlx::SqlitePool;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::LibraryConfig;
use crate::error::{Error, Result, ResultExt};
use crate::model::{AlbumRecord, ArtistRef, TrackRecord};
use crate::normalize::fold;
use crate::scanner::{self, AlbumDirectory};
use crate::{db, metadata};

/// Artist used when no track names one and the path gives nothing either.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Fold one directory's tracks into an album.
///
/// Title and year come from the first track that has them (the title falls
/// back to the directory name). The artist is a plurality vote over the
/// tracks' artists, ties going to whichever appeared first.
///
/// # Errors
///
/// [`Error::EmptyAlbum`] if `tracks` is empty.
pub fn aggregate(tracks: Vec<TrackRecord>, directory_path: &Path) -> Result<AlbumRecord> {
    if tracks.is_empty() {
        return Err(Error::EmptyAlbum(directory_path.to_path_buf()));
    }

    let title = tracks
        .iter()
        .find_map(|t| t.album.clone())
        .or_else(|| {
            directory_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| directory_path.to_string_lossy().into_owned());
    let year = tracks.iter().find_map(|t| t.release_year);

    let artist = plurality(tracks.iter().filter_map(|t| t.artist.as_deref()))
        .or_else(|| plurality(tracks.iter().filter_map(|t| t.album_artist.as_deref())))
        .or_else(|| {
            directory_path
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    Ok(AlbumRecord {
        title,
        year,
        directory_path: directory_path.to_path_buf(),
        artist: ArtistRef::new(artist),
        tracks,
    })
}

/// Most frequent name (compared folded), first seen wins ties.
fn plurality<'a>(names: impl Iterator<Item = &'a str>) -> Option<String> {
    // (key, display name, count) in order of first appearance
    let mut tally: Vec<(String, &str, usize)> = Vec::new();
    for name in names.filter(|n| !n.trim().is_empty()) {
        let key = fold(name);
        match tally.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, count)) => *count += 1,
            None => tally.push((key, name, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (_, name, count) in tally {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| name.trim().to_string())
}

// ============================================================================
// Scan pipeline
// ============================================================================

#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// An album directory was persisted
    Album {
        path: PathBuf,
        id: i64,
        tracks: usize,
        conflicts: usize,
    },
    /// A file (or a whole directory) was skipped
    Error(PathBuf, String),
}

/// Scan `root` and persist every album found.
///
/// Directories are processed one at a time, in path order.
pub fn scan_library(
    pool: SqlitePool,
    root: PathBuf,
    library: LibraryConfig,
) -> impl Stream<Item = ScanEvent> {
    let directories = scanner::album_directories(&root, &library);
    tracing::info!(target: "scanner", root = %root.display(), albums = directories.len(), "Scanning");

    stream::iter(directories)
        .then(move |dir| {
            let pool = pool.clone();
            let library = library.clone();
            async move { scan_directory(&pool, dir, &library).await }
        })
        .flat_map(stream::iter)
}

async fn scan_directory(
    pool: &SqlitePool,
    dir: AlbumDirectory,
    library: &LibraryConfig,
) -> Vec<ScanEvent> {
    let mut events = Vec::new();
    let mut tracks = Vec::with_capacity(dir.files.len());

    for file in &dir.files {
        match metadata::extract(file, library) {
            Ok(track) => tracks.push(track),
            Err(e) => {
                tracing::warn!(target: "scanner", path = %file.display(), error = %e, "Skipping unreadable file");
                events.push(ScanEvent::Error(file.clone(), e.to_string()));
            }
        }
    }

    if tracks.is_empty() {
        tracing::warn!(target: "scanner", dir = %dir.path.display(), "No readable tracks, skipping directory");
        return events;
    }

    let stored = match aggregate(tracks, &dir.path) {
        Ok(album) => db::persist_album(pool, &album)
            .await
            .map(|stored| (stored, album.track_count()))
            .map_err(Error::from),
        Err(e) => Err(e),
    };

    match stored {
        Ok((stored, track_count)) => events.push(ScanEvent::Album {
            path: dir.path,
            id: stored.id,
            tracks: track_count,
            conflicts: stored.conflicts.len(),
        }),
        Err(e) => {
            tracing::error!(target: "scanner", dir = %dir.path.display(), error = %e, "Failed to persist album");
            events.push(ScanEvent::Error(dir.path, e.to_string()));
        }
    }

    events
}

/// Totals of one scan run.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub albums: usize,
    pub tracks: usize,
    /// Albums whose stored values disagreed with this scan
    pub conflicts: usize,
    /// Skipped files and directories, with the reason
    pub problems: Vec<(PathBuf, String)>,
}

impl ScanSummary {
    pub fn record(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::Album {
                tracks, conflicts, ..
            } => {
                self.albums += 1;
                self.tracks += tracks;
                if conflicts > 0 {
                    self.conflicts += 1;
                }
            }
            ScanEvent::Error(path, reason) => self.problems.push((path, reason)),
        }
    }

    /// Write the problem list, one `path<TAB>reason` line each.
    pub fn write_problems(&self, path: &Path) -> Result<()> {
        write_problem_list(&self.problems, path)
    }
}

/// Run a full scan and collect its summary.
pub async fn scan(pool: &SqlitePool, root: &Path, library: &LibraryConfig) -> ScanSummary {
    let events = scan_library(pool.clone(), root.to_path_buf(), library.clone());
    let mut events = std::pin::pin!(events);
    let mut summary = ScanSummary::default();
    while let Some(event) = events.next().await {
        summary.record(event);
    }
    tracing::info!(
        target: "scanner",
        albums = summary.albums,
        tracks = summary.tracks,
        problems = summary.problems.len(),
        "Scan complete"
    );
    summary
}

/// Files under `root` with an audio extension that cannot be read.
///
/// Nothing is written to the store.
pub fn check_files(root: &Path, library: &LibraryConfig) -> Vec<(PathBuf, String)> {
    scanner::audio_files(root, library)
        .into_iter()
        .filter_map(|path| match metadata::extract(&path, library) {
            Ok(_) => None,
            Err(e) => Some((path, e.to_string())),
        })
        .collect()
}

pub fn write_problem_list(problems: &[(PathBuf, String)], path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(format!("Failed to create {}", path.display()))?;
    for (problem, reason) in problems {
        writeln!(file, "{}\t{}", problem.display(), reason)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::library_stats;
    use crate::test_utils::{Mp3Tags, mock_track_record, temp_db, write_tagged_mp3, write_wav};

    fn with_artist(path: &str, artist: Option<&str>) -> TrackRecord {
        TrackRecord {
            artist: artist.map(String::from),
            ..mock_track_record(path, 1)
        }
    }

    #[test]
    fn test_aggregate_empty_is_error() {
        let result = aggregate(Vec::new(), Path::new("/m/A/B"));
        assert!(matches!(result, Err(Error::EmptyAlbum(_))));
    }

    #[test]
    fn test_plurality_vote() {
        let tracks = vec![
            with_artist("/m/x/B/1.mp3", Some("A")),
            with_artist("/m/x/B/2.mp3", Some("A")),
            with_artist("/m/x/B/3.mp3", Some("B")),
            with_artist("/m/x/B/4.mp3", Some("A")),
        ];
        let album = aggregate(tracks, Path::new("/m/x/B")).unwrap();
        assert_eq!(album.artist.name, "A");
        assert_eq!(album.track_count(), 4);
    }

    #[test]
    fn test_plurality_tie_goes_to_first_seen() {
        let tracks = vec![
            with_artist("/m/x/B/1.mp3", Some("B")),
            with_artist("/m/x/B/2.mp3", Some("A")),
            with_artist("/m/x/B/3.mp3", None),
            with_artist("/m/x/B/4.mp3", Some("A")),
            with_artist("/m/x/B/5.mp3", Some("B")),
        ];
        let album = aggregate(tracks, Path::new("/m/x/B")).unwrap();
        assert_eq!(album.artist.name, "B");
    }

    #[test]
    fn test_plurality_counts_accent_variants_together() {
        let tracks = vec![
            with_artist("/m/x/B/1.mp3", Some("Björk")),
            with_artist("/m/x/B/2.mp3", Some("Sugarcubes")),
            with_artist("/m/x/B/3.mp3", Some("bjork")),
        ];
        let album = aggregate(tracks, Path::new("/m/x/B")).unwrap();
        assert_eq!(album.artist.name, "Björk");
    }

    #[test]
    fn test_aggregate_fallbacks() {
        let tracks = vec![TrackRecord {
            source_path: PathBuf::from("/m/Artist Dir/Album Dir/1.wav"),
            ..Default::default()
        }];
        let album = aggregate(tracks, Path::new("/m/Artist Dir/Album Dir")).unwrap();
        assert_eq!(album.title, "Album Dir");
        assert_eq!(album.artist.name, "Artist Dir");
        assert_eq!(album.year, None);
    }

    #[test]
    fn test_aggregate_takes_first_present_year() {
        let mut tracks = vec![mock_track_record("/m/A/B/1.mp3", 1), mock_track_record("/m/A/B/2.mp3", 2)];
        tracks[0].release_year = None;
        tracks[1].release_year = Some(1985);
        let album = aggregate(tracks, Path::new("/m/A/B")).unwrap();
        assert_eq!(album.year, Some(1985));
    }

    #[tokio::test]
    async fn test_scan_end_to_end() {
        let (pool, _db_dir) = temp_db().await;
        let music = tempfile::tempdir().unwrap();
        let wall = music.path().join("Pink Floyd").join("The Wall");
        std::fs::create_dir_all(&wall).unwrap();

        let titles = ["In the Flesh?", "The Thin Ice", "Another Brick in the Wall", "The Happiest Days"];
        for (i, title) in titles.iter().enumerate() {
            let number = i as u32 + 1;
            write_tagged_mp3(
                &wall.join(format!("{number:02} {title}.mp3")),
                &Mp3Tags {
                    title: Some(title),
                    artist: Some("Pink Floyd"),
                    album: Some("The Wall"),
                    date: Some("1979-11-30"),
                    track: Some(number),
                },
            );
        }

        let summary = scan(&pool, music.path(), &LibraryConfig::default()).await;
        assert_eq!(summary.albums, 1);
        assert_eq!(summary.tracks, 4);
        assert!(summary.problems.is_empty());

        let stats = library_stats(&pool).await.unwrap();
        assert_eq!(stats.artists, 1);
        assert_eq!(stats.albums, 1);
        assert_eq!(stats.tracks, 4);

        let album = db::get_album_by_path(&pool, &wall.to_string_lossy())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(album.title, "The Wall");
        assert_eq!(album.year, Some(1979));
        let artist = db::artist_of(&pool, album.id).await.unwrap().unwrap();
        assert_eq!(artist.name, "Pink Floyd");
    }

    #[tokio::test]
    async fn test_scan_skips_bad_files_and_continues() {
        let (pool, _db_dir) = temp_db().await;
        let music = tempfile::tempdir().unwrap();
        let album = music.path().join("Artist").join("Album");
        let broken = music.path().join("Artist").join("Broken");
        std::fs::create_dir_all(&album).unwrap();
        std::fs::create_dir_all(&broken).unwrap();

        write_wav(&album.join("01 Good.wav"), 8000, 16_000);
        std::fs::write(album.join("02 Bad.wav"), b"not audio").unwrap();
        std::fs::write(broken.join("01 Also Bad.flac"), b"not audio").unwrap();

        let summary = scan(&pool, music.path(), &LibraryConfig::default()).await;
        assert_eq!(summary.albums, 1);
        assert_eq!(summary.tracks, 1);
        assert_eq!(summary.problems.len(), 2);

        let problems_file = music.path().join("problems.txt");
        summary.write_problems(&problems_file).unwrap();
        let written = std::fs::read_to_string(&problems_file).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.contains("02 Bad.wav"));
    }

    #[tokio::test]
    async fn test_rescan_is_idempotent() {
        let (pool, _db_dir) = temp_db().await;
        let music = tempfile::tempdir().unwrap();
        let album = music.path().join("Artist").join("Album");
        std::fs::create_dir_all(&album).unwrap();
        write_wav(&album.join("01 One.wav"), 8000, 8000);
        write_wav(&album.join("02 Two.wav"), 8000, 8000);

        let library = LibraryConfig::default();
        scan(&pool, music.path(), &library).await;
        let again = scan(&pool, music.path(), &library).await;
        assert_eq!(again.conflicts, 0);

        let stats = library_stats(&pool).await.unwrap();
        assert_eq!(stats.albums, 1);
        assert_eq!(stats.tracks, 2);
        assert_eq!(stats.runtime_seconds, 2);
    }

    #[test]
    fn test_check_files_lists_unreadable() {
        let music = tempfile::tempdir().unwrap();
        write_wav(&music.path().join("ok.wav"), 8000, 8000);
        std::fs::write(music.path().join("bad.mp3"), b"garbage").unwrap();
        std::fs::write(music.path().join("notes.txt"), b"ignored").unwrap();

        let problems = check_files(music.path(), &LibraryConfig::default());
        assert_eq!(problems.len(), 1);
        assert!(problems[0].0.ends_with("bad.mp3"));
    }
}
