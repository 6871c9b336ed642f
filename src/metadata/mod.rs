//! Track metadata extraction.
//!
//! Every audio file becomes a [`TrackRecord`]. How the fields are found
//! depends on the container:
//!
//! - **tag-bearing** files (mp3, flac, m4a, wma by default) are read with
//!   lofty; fields missing from the tags are filled from the path
//! - **tag-absent** files (wav, aac, ac3, dts, ...) get everything from the
//!   path, and their duration from the raw stream via symphonia
//!
//! Path heuristics assume `.../Artist/Album/NN Title.ext`.
//!
//! A degenerate tag value (bad date, non-numeric track number) never fails
//! extraction; it falls back to the path-derived value or stays `None`.
//! A tag-bearing extension lofty has no reader for (wma) is handled like a
//! tag-absent file. Only a container that cannot be opened at all is an error.

use chrono::{Datelike, NaiveDate};
use lofty::config::{ParseOptions, ParsingMode};
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::fs::File;
use std::path::Path;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::config::LibraryConfig;
use crate::error::{Error, Result};
use crate::model::TrackRecord;

/// How a file's metadata is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Container carries embedded tags
    TagBearing,
    /// Metadata comes from the filename and directory names
    TagAbsent,
}

/// Classify a file by its extension.
pub fn classify(path: &Path, library: &LibraryConfig) -> FileKind {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    if library.is_tag_bearing(ext) {
        FileKind::TagBearing
    } else {
        FileKind::TagAbsent
    }
}

/// Extract a [`TrackRecord`] from an audio file.
///
/// # Errors
///
/// [`Error::UnreadableMetadata`] when the tag container (tag-bearing) or
/// the raw audio stream (tag-absent) cannot be opened.
pub fn extract(path: &Path, library: &LibraryConfig) -> Result<TrackRecord> {
    let derived = PathInfo::from_path(path);
    match classify(path, library) {
        FileKind::TagBearing => read_tagged(path, derived),
        FileKind::TagAbsent => read_untagged(path, derived),
    }
}

fn read_tagged(path: &Path, derived: PathInfo) -> Result<TrackRecord> {
    // Relaxed parsing drops malformed frames (e.g. a TDRC of "0") instead of
    // rejecting the whole tag
    let probe = Probe::open(path)
        .map_err(|e| Error::unreadable(path, format!("failed to open file for probing: {e}")))?
        .options(ParseOptions::new().parsing_mode(ParsingMode::Relaxed));

    if probe.file_type().is_none() {
        tracing::debug!(target: "metadata", path = %path.display(), "No tag reader for container, using path");
        let duration = stream_duration(path).unwrap_or_else(|e| {
            tracing::warn!(target: "metadata", path = %path.display(), error = %e, "Stream length unknown");
            0
        });
        return Ok(path_record(path, derived, duration));
    }

    let tagged_file = probe
        .read()
        .map_err(|e| Error::unreadable(path, format!("failed to read file metadata: {e}")))?;

    // Get the primary tag, or fall back to the first available tag
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag());

    let release_year = tag.and_then(|t| tag_release_year(t, path));

    let track_number = tag
        .and_then(|t| text(t, ItemKey::TrackNumber))
        .and_then(|raw| {
            let parsed = parse_track_number(&raw);
            if parsed.is_none() {
                tracing::debug!(target: "metadata", path = %path.display(), raw = %raw, "Unparseable track number, using filename");
            }
            parsed
        })
        .or(derived.track_number);

    Ok(TrackRecord {
        title: tag
            .and_then(|t| text(t, ItemKey::TrackTitle))
            .or(derived.title),
        artist: tag
            .and_then(|t| text(t, ItemKey::TrackArtist))
            .or(derived.artist),
        album: tag
            .and_then(|t| text(t, ItemKey::AlbumTitle))
            .or(derived.album),
        album_artist: tag.and_then(|t| text(t, ItemKey::AlbumArtist)),
        track_number,
        release_year,
        duration: tagged_file.properties().duration().as_secs(),
        source_path: path.to_path_buf(),
    })
}

fn read_untagged(path: &Path, derived: PathInfo) -> Result<TrackRecord> {
    let duration = stream_duration(path)?;
    Ok(path_record(path, derived, duration))
}

fn path_record(path: &Path, derived: PathInfo, duration: u64) -> TrackRecord {
    TrackRecord {
        title: derived.title,
        artist: derived.artist,
        album: derived.album,
        album_artist: None,
        track_number: derived.track_number,
        release_year: None,
        duration,
        source_path: path.to_path_buf(),
    }
}

/// Non-empty, trimmed text value for `key`.
fn text(tag: &Tag, key: ItemKey) -> Option<String> {
    tag.get_string(&key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn tag_release_year(tag: &Tag, path: &Path) -> Option<i32> {
    match text(tag, ItemKey::RecordingDate) {
        Some(raw) => {
            let year = parse_release_year(&raw);
            if year.is_none() {
                tracing::debug!(target: "metadata", path = %path.display(), raw = %raw, "Degenerate release date ignored");
            }
            year
        }
        None => tag.year().filter(|y| *y > 0).map(|y| y as i32),
    }
}

/// Duration of the first audio stream: sample count / sample rate,
/// truncated to whole seconds.
pub fn stream_duration(path: &Path) -> Result<u64> {
    let file = File::open(path).map_err(|e| Error::unreadable(path, e.to_string()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(&ext.to_string_lossy());
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::unreadable(path, format!("unsupported audio stream: {e}")))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::unreadable(path, "no audio track found"))?;

    let frames = track
        .codec_params
        .n_frames
        .ok_or_else(|| Error::unreadable(path, "unknown sample count"))?;
    let sample_rate = track
        .codec_params
        .sample_rate
        .filter(|rate| *rate > 0)
        .ok_or_else(|| Error::unreadable(path, "unknown sample rate"))?;

    Ok(frames / u64::from(sample_rate))
}

// ============================================================================
// Field parsers
// ============================================================================

/// Parse `"N"` or `"N/total"`, keeping only `N`.
pub fn parse_track_number(raw: &str) -> Option<u32> {
    raw.trim().split('/').next()?.trim().parse().ok()
}

/// Parse the year out of a release-date tag.
///
/// Accepts full dates (`1979-11-30`, `1979/11/30`, day-month swapped
/// `1979-30-11`), timestamps (`1979-11-30T00:00:00`), and partial dates
/// (`1979`, `1979-11`, `1979-00-00`). Empty, all-zero, or otherwise
/// unparseable values yield `None`.
pub fn parse_release_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if !raw.chars().any(|c| c.is_ascii_alphanumeric() && c != '0') {
        return None;
    }

    let date_part = raw.split([' ', 'T']).next()?;
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y-%d-%m"] {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return (date.year() > 0).then_some(date.year());
        }
    }

    let mut parts = date_part.split(['-', '/', '.']);
    let year_str = parts.next()?;
    if year_str.len() != 4 || !year_str.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year_str.parse().ok().filter(|y| *y > 0)?;

    let rest = parts
        .map(|p| p.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    match rest.as_slice() {
        [] => Some(year),
        [month] if *month <= 12 => Some(year),
        // A non-zero day would have parsed as a full date above
        [month, 0] if *month <= 12 => Some(year),
        _ => None,
    }
}

/// Split a filename into track number and title.
///
/// A leading digit run, followed by optional `.`, `-`, `_` or whitespace
/// separators, is the track number; the rest (with `_`/whitespace runs
/// collapsed to single spaces) is the title. Without a leading number, or
/// with nothing after it, the whole stem is the title.
pub fn parse_filename(file_name: &str) -> (Option<u32>, Option<String>) {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let whole = || Some(stem.to_string()).filter(|s| !s.trim().is_empty());

    let digits_end = stem
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(stem.len());
    if digits_end == 0 {
        return (None, whole());
    }

    let rest = stem[digits_end..].trim_start_matches(is_separator);
    let title = rest
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    match stem[..digits_end].parse::<u32>() {
        Ok(number) if !title.is_empty() => (Some(number), Some(title)),
        _ => (None, whole()),
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, '.' | '-' | '_') || c.is_whitespace()
}

/// Everything derivable from a file's path alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathInfo {
    pub track_number: Option<u32>,
    pub title: Option<String>,
    /// Containing directory name
    pub album: Option<String>,
    /// Parent of the containing directory
    pub artist: Option<String>,
}

impl PathInfo {
    pub fn from_path(path: &Path) -> Self {
        let (track_number, title) = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(parse_filename)
            .unwrap_or_default();

        let dir_name = |p: Option<&Path>| {
            p.and_then(|d| d.file_name())
                .and_then(|s| s.to_str())
                .filter(|s| !s.trim().is_empty())
                .map(String::from)
        };
        let album_dir = path.parent();
        let artist_dir = album_dir.and_then(Path::parent);

        Self {
            track_number,
            title,
            album: dir_name(album_dir),
            artist: dir_name(artist_dir),
        }
    }
}
