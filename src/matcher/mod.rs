//! Matching local albums against the external catalog.
//!
//! The two catalogs are named by different people, so matching runs as a
//! cascade where each stage only runs if the previous one found nothing:
//!
//! 1. **Exact**: folded title and folded artist both equal. May return
//!    several albums; the caller reports those as ambiguous.
//! 2. **Artist + track count**: same folded artist and same number of
//!    tracks, then the candidate whose title shares the most words.
//! 3. **Title + track count**: same folded title and same number of
//!    tracks, then the candidate whose artist shares the most words.
//!
//! Stages 2 and 3 return at most one album. A best overlap of zero words
//! is no match.
//!
//! Normalization strips diacritics, which SQL cannot do portably, so the
//! whole catalog is indexed in memory once per audit.

use std::collections::{BTreeSet, HashMap};

use crate::model::{AlbumRecord, ExternalCatalogAlbum, MatchResult};
use crate::normalize::{fold, overlap, words};

/// Which cascade stage produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Exact,
    ArtistTrackCount,
    TitleTrackCount,
}

/// Candidates found for one local album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub stage: Stage,
    /// Positions in catalog order; never empty
    positions: Vec<usize>,
}

struct Entry {
    title_words: BTreeSet<String>,
    artist_words: BTreeSet<String>,
}

/// In-memory index over the external catalog.
pub struct CatalogIndex {
    albums: Vec<ExternalCatalogAlbum>,
    entries: Vec<Entry>,
    by_title_artist: HashMap<(String, String), Vec<usize>>,
    by_artist: HashMap<String, Vec<usize>>,
    by_title: HashMap<String, Vec<usize>>,
}

impl CatalogIndex {
    /// Index `albums`. Their order is the catalog order used for tie-breaks.
    pub fn new(albums: Vec<ExternalCatalogAlbum>) -> Self {
        let mut entries = Vec::with_capacity(albums.len());
        let mut by_title_artist: HashMap<(String, String), Vec<usize>> = HashMap::new();
        let mut by_artist: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_title: HashMap<String, Vec<usize>> = HashMap::new();

        for (pos, album) in albums.iter().enumerate() {
            let title = fold(&album.title);
            let artist = fold(&album.artist);
            by_title_artist
                .entry((title.clone(), artist.clone()))
                .or_default()
                .push(pos);
            by_artist.entry(artist).or_default().push(pos);
            by_title.entry(title).or_default().push(pos);
            entries.push(Entry {
                title_words: words(&album.title),
                artist_words: words(&album.artist),
            });
        }

        Self {
            albums,
            entries,
            by_title_artist,
            by_artist,
            by_title,
        }
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }

    /// All indexed albums, in catalog order.
    pub fn albums(&self) -> &[ExternalCatalogAlbum] {
        &self.albums
    }

    /// External ids matching `album`: zero, one, or (stage 1 only) several.
    pub fn find(&self, album: &AlbumRecord) -> Vec<i64> {
        self.lookup(album)
            .map(|found| self.resolve(&found).map(|a| a.id).collect())
            .unwrap_or_default()
    }

    /// Run the cascade and build the [`MatchResult`] for `album`.
    pub fn match_album(&self, album: AlbumRecord) -> MatchResult {
        let candidates = self
            .lookup(&album)
            .map(|found| self.resolve(&found).cloned().collect())
            .unwrap_or_default();
        MatchResult::new(album, candidates)
    }

    /// The albums behind a [`Found`].
    pub fn resolve<'a>(&'a self, found: &'a Found) -> impl Iterator<Item = &'a ExternalCatalogAlbum> {
        found.positions.iter().filter_map(|&pos| self.albums.get(pos))
    }

    /// Run the cascade, reporting which stage matched.
    pub fn lookup(&self, album: &AlbumRecord) -> Option<Found> {
        let title = fold(&album.title);
        let artist = album.artist.key();
        let track_count = album.track_count() as i64;

        if let Some(positions) = self.by_title_artist.get(&(title.clone(), artist.clone())) {
            tracing::debug!(target: "matcher", album = %album.title, matches = positions.len(), "Exact match");
            return Some(Found {
                stage: Stage::Exact,
                positions: positions.clone(),
            });
        }

        let title_words = words(&album.title);
        if let Some(pos) = self.best_overlap(self.by_artist.get(&artist), track_count, |e| {
            overlap(&e.title_words, &title_words)
        }) {
            tracing::debug!(target: "matcher", album = %album.title, "Matched on artist and track count");
            return Some(Found {
                stage: Stage::ArtistTrackCount,
                positions: vec![pos],
            });
        }

        let artist_words = words(&album.artist.name);
        if let Some(pos) = self.best_overlap(self.by_title.get(&title), track_count, |e| {
            overlap(&e.artist_words, &artist_words)
        }) {
            tracing::debug!(target: "matcher", album = %album.title, "Matched on title and track count");
            return Some(Found {
                stage: Stage::TitleTrackCount,
                positions: vec![pos],
            });
        }

        tracing::debug!(target: "matcher", album = %album.title, artist = %album.artist.name, "No match");
        None
    }

    /// Candidate with the largest non-zero score among `positions` whose
    /// track count equals `track_count`. Ties keep the earliest.
    fn best_overlap(
        &self,
        positions: Option<&Vec<usize>>,
        track_count: i64,
        score: impl Fn(&Entry) -> usize,
    ) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for &pos in positions.into_iter().flatten() {
            if self.albums[pos].track_count != track_count {
                continue;
            }
            let s = score(&self.entries[pos]);
            if best.is_none_or(|(_, top)| s > top) {
                best = Some((pos, s));
            }
        }
        best.filter(|(_, s)| *s > 0).map(|(pos, _)| pos)
    }
}
