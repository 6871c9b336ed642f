//! Filesystem walk.
//!
//! Any directory holding at least one file with a recognized audio
//! extension is one album. Only the files directly inside that directory
//! belong to it; subdirectories are albums of their own.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::LibraryConfig;

/// Resource-fork directories left behind by macOS archive tools.
const IGNORED_DIRS: &[&str] = &["__MACOSX"];

/// A directory that holds audio files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumDirectory {
    pub path: PathBuf,
    /// Audio files directly inside `path`, sorted by name
    pub files: Vec<PathBuf>,
}

/// Recursively collect all audio files under `root`, sorted by path.
pub fn audio_files(root: &Path, library: &LibraryConfig) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored(e))
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                tracing::warn!(target: "scanner", error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| library.is_audio_file(e.path()))
        .map(|e| e.into_path())
        .collect()
}

/// Group the audio files under `root` by containing directory.
///
/// Directories come back in path order, which makes a scan's insertion
/// order reproducible.
pub fn album_directories(root: &Path, library: &LibraryConfig) -> Vec<AlbumDirectory> {
    let mut grouped: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for path in audio_files(root, library) {
        let Some(dir) = path.parent() else {
            continue;
        };
        grouped.entry(dir.to_path_buf()).or_default().push(path);
    }

    grouped
        .into_iter()
        .map(|(path, mut files)| {
            files.sort();
            tracing::debug!(target: "scanner", dir = %path.display(), files = files.len(), "Album found");
            AlbumDirectory { path, files }
        })
        .collect()
}

fn is_ignored(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_scan_audio_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        File::create(root.join("song.mp3")).unwrap();
        File::create(root.join("music.flac")).unwrap();
        File::create(root.join("notes.txt")).unwrap(); // Should be ignored
        File::create(root.join("image.png")).unwrap(); // Should be ignored
        File::create(root.join("UPPERCASE.WAV")).unwrap(); // case-insensitive

        let subdir = root.join("subdir");
        std::fs::create_dir(&subdir).unwrap();
        File::create(subdir.join("track.dts")).unwrap();
        File::create(subdir.join("ignore.doc")).unwrap();

        let paths = audio_files(root, &LibraryConfig::default());
        let file_names: Vec<String> = paths
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(|s| s.to_string()))
            .collect();

        assert_eq!(paths.len(), 4);
        assert!(file_names.contains(&"song.mp3".to_string()));
        assert!(file_names.contains(&"music.flac".to_string()));
        assert!(file_names.contains(&"UPPERCASE.WAV".to_string()));
        assert!(file_names.contains(&"track.dts".to_string()));
        assert!(!file_names.contains(&"notes.txt".to_string()));
    }

    #[test]
    fn test_album_directories_groups_by_parent() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let wall = root.join("Pink Floyd").join("The Wall");
        let animals = root.join("Pink Floyd").join("Animals");
        let empty = root.join("Pink Floyd").join("Scans");
        for d in [&wall, &animals, &empty] {
            std::fs::create_dir_all(d).unwrap();
        }
        File::create(wall.join("02 b.mp3")).unwrap();
        File::create(wall.join("01 a.mp3")).unwrap();
        File::create(animals.join("01 Pigs on the Wing.flac")).unwrap();
        File::create(empty.join("cover.jpg")).unwrap();

        let albums = album_directories(root, &LibraryConfig::default());
        assert_eq!(albums.len(), 2);
        assert_eq!(albums[0].path, animals);
        assert_eq!(albums[1].path, wall);
        assert_eq!(
            albums[1].files,
            vec![wall.join("01 a.mp3"), wall.join("02 b.mp3")]
        );
    }

    #[test]
    fn test_macosx_directories_are_skipped() {
        let dir = tempdir().unwrap();
        let junk = dir.path().join("__MACOSX").join("Album");
        std::fs::create_dir_all(&junk).unwrap();
        File::create(junk.join("._01 song.mp3")).unwrap();

        assert!(album_directories(dir.path(), &LibraryConfig::default()).is_empty());
    }
}
