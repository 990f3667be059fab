//! Core data models for clique detection.
//!
//! This module contains the identity-set type, the track/version/clique
//! aggregates, and the run statistics threaded through the pipeline.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::btree_set;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

// ============================================================================
// Type Aliases
// ============================================================================

/// Discogs artist identifier. Shared so identity sets can reuse graph storage.
pub type ArtistId = Arc<str>;

/// Opaque track record, written back out exactly as it was read.
pub type TrackRecord = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// String Interning
// ============================================================================

/// String interner for deduplicating artist ids while loading the graph.
/// The same id shows up as a key, as an alias of other artists and as a
/// group member, so every occurrence shares one allocation.
pub struct StringInterner {
    strings: FxHashMap<Arc<str>, Arc<str>>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            strings: FxHashMap::default(),
        }
    }

    /// Intern a string, returning the shared handle seen first for it.
    pub fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            return Arc::clone(existing);
        }
        let arc: Arc<str> = Arc::from(s);
        self.strings.insert(Arc::clone(&arc), Arc::clone(&arc));
        arc
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Identity Sets
// ============================================================================

/// Resolved set of artist ids standing for one credited entity (or the union
/// over several credits). Only ever compared by intersection.
///
/// Ordered storage keeps hashing and iteration deterministic, which matters
/// because performer identity sets are used as grouping keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct IdentitySet(BTreeSet<ArtistId>);

impl IdentitySet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn insert(&mut self, id: ArtistId) -> bool {
        self.0.insert(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, ArtistId> {
        self.0.iter()
    }

    /// True when the two sets share at least one artist id.
    pub fn intersects(&self, other: &IdentitySet) -> bool {
        self.first_shared(other).is_some()
    }

    /// Smallest artist id present in both sets.
    pub fn first_shared<'a>(&'a self, other: &IdentitySet) -> Option<&'a ArtistId> {
        if self.len() <= other.len() {
            self.0.iter().find(|id| other.0.contains(*id))
        } else {
            other
                .0
                .iter()
                .find(|id| self.0.contains(*id))
                .and_then(|id| self.0.get(id))
        }
    }

    /// Absorb every id of `other`.
    pub fn union_with(&mut self, other: IdentitySet) {
        if self.0.is_empty() {
            self.0 = other.0;
        } else {
            self.0.extend(other.0);
        }
    }
}

impl FromIterator<ArtistId> for IdentitySet {
    fn from_iter<I: IntoIterator<Item = ArtistId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<ArtistId> for IdentitySet {
    fn extend<I: IntoIterator<Item = ArtistId>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<'a> IntoIterator for &'a IdentitySet {
    type Item = &'a ArtistId;
    type IntoIter = btree_set::Iter<'a, ArtistId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// Input Records
// ============================================================================

/// Discogs dumps carry ids as strings, some re-exports as integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawArtistId {
    Text(String),
    Number(u64),
}

impl From<RawArtistId> for String {
    fn from(raw: RawArtistId) -> Self {
        match raw {
            RawArtistId::Text(s) => s,
            RawArtistId::Number(n) => n.to_string(),
        }
    }
}

pub(crate) fn deserialize_artist_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawArtistId::deserialize(deserializer).map(String::from)
}

/// Absent, `null` and `[]` all mean "no ids".
pub(crate) fn deserialize_artist_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<RawArtistId>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(String::from)
        .collect())
}

/// Credit fields of a track line. Everything else in the line is opaque.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TrackCredits {
    #[serde(default)]
    pub track_title: String,
    #[serde(default)]
    pub track_title_cleaned: Option<String>,
    #[serde(default, deserialize_with = "deserialize_artist_ids")]
    pub track_writer_ids: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_artist_ids")]
    pub track_artist_ids: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_artist_ids")]
    pub release_artist_ids: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_artist_ids")]
    pub track_feat_ids: Vec<String>,
}

impl TrackCredits {
    /// Track-level performers, or the release performers when the track has none.
    pub fn performer_ids(&self) -> &[String] {
        if self.track_artist_ids.is_empty() {
            &self.release_artist_ids
        } else {
            &self.track_artist_ids
        }
    }
}

// ============================================================================
// Track Models
// ============================================================================

/// A track that passed the exclusion rules, with its derived fields attached.
/// `record` is never inspected by the clustering logic.
#[derive(Clone, Debug)]
pub struct TrackEntry {
    /// Original `track_title`, used for the disentanglement key.
    pub title: String,
    /// Grouping key (cleaned title).
    pub title_key: String,
    pub performers: IdentitySet,
    pub writers: IdentitySet,
    pub record: TrackRecord,
}

/// All tracks sharing one cleaned title, in stream order.
#[derive(Clone, Debug)]
pub struct TitleGroup {
    pub title_key: String,
    pub tracks: Vec<TrackEntry>,
}

// ============================================================================
// Build-time Aggregates
// ============================================================================

/// Tracks judged to be the same recording: one (title, performer-set) bucket
/// after writer merging and conflict resolution.
#[derive(Clone, Debug)]
pub struct Version {
    pub performers: IdentitySet,
    pub writers: IdentitySet,
    pub tracks: Vec<TrackEntry>,
}

/// Versions judged to be the same composition. Writer sets are gone by the
/// time a clique exists; only the version/track structure is kept.
#[derive(Clone, Debug)]
pub struct Clique {
    /// Title group the clique was built from (not serialized).
    pub title_key: String,
    pub versions: Vec<Vec<TrackEntry>>,
}

impl Clique {
    pub fn track_count(&self) -> usize {
        self.versions.iter().map(Vec::len).sum()
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Counters for one run. Per-title workers fill their own copy and the
/// pipeline folds them together with [`ClusterStats::merge`].
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct ClusterStats {
    // Artist graph
    pub artists_loaded: usize,
    pub artist_self_references_removed: usize,
    pub artist_members_dropped: usize,
    pub artist_dangling_references_removed: usize,
    pub artist_placeholder_references_removed: usize,
    pub artists_with_derived_name_variations: usize,

    // Reading
    pub tracks_read: usize,
    pub tracks_skipped_empty_title: usize,
    pub tracks_skipped_no_writers: usize,
    pub tracks_clustered: usize,
    pub unique_titles: usize,

    // Version building
    pub titles_single_performer: usize,
    pub titles_multi_performer: usize,
    pub writer_agreements: usize,
    pub writer_disagreements: usize,
    pub voted_agreements: usize,
    pub tied_buckets_dropped: usize,
    pub titles_emptied_by_vote: usize,
    pub versions_built: usize,

    // Clique building
    pub single_version_cliques_dropped: usize,
    pub versions_split_by_title: usize,

    // Output
    pub cliques: usize,
    pub versions: usize,
    pub tracks_written: usize,
    /// versions-per-clique -> number of cliques
    pub clique_size_histogram: BTreeMap<usize, usize>,

    // Timing
    pub elapsed_seconds: f64,
}

impl ClusterStats {
    /// Fold another worker's counters into this one.
    pub fn merge(&mut self, other: &ClusterStats) {
        self.artists_loaded += other.artists_loaded;
        self.artist_self_references_removed += other.artist_self_references_removed;
        self.artist_members_dropped += other.artist_members_dropped;
        self.artist_dangling_references_removed += other.artist_dangling_references_removed;
        self.artist_placeholder_references_removed += other.artist_placeholder_references_removed;
        self.artists_with_derived_name_variations += other.artists_with_derived_name_variations;
        self.tracks_read += other.tracks_read;
        self.tracks_skipped_empty_title += other.tracks_skipped_empty_title;
        self.tracks_skipped_no_writers += other.tracks_skipped_no_writers;
        self.tracks_clustered += other.tracks_clustered;
        self.unique_titles += other.unique_titles;
        self.titles_single_performer += other.titles_single_performer;
        self.titles_multi_performer += other.titles_multi_performer;
        self.writer_agreements += other.writer_agreements;
        self.writer_disagreements += other.writer_disagreements;
        self.voted_agreements += other.voted_agreements;
        self.tied_buckets_dropped += other.tied_buckets_dropped;
        self.titles_emptied_by_vote += other.titles_emptied_by_vote;
        self.versions_built += other.versions_built;
        self.single_version_cliques_dropped += other.single_version_cliques_dropped;
        self.versions_split_by_title += other.versions_split_by_title;
        self.cliques += other.cliques;
        self.versions += other.versions;
        self.tracks_written += other.tracks_written;
        for (size, count) in &other.clique_size_histogram {
            *self.clique_size_histogram.entry(*size).or_default() += count;
        }
    }

    /// Record one emitted clique.
    pub fn record_clique(&mut self, clique: &Clique) {
        self.cliques += 1;
        self.versions += clique.versions.len();
        self.tracks_written += clique.track_count();
        *self
            .clique_size_histogram
            .entry(clique.versions.len())
            .or_default() += 1;
    }

    /// Percentage of clustered tracks that ended up in an emitted clique.
    pub fn coverage(&self) -> f64 {
        if self.tracks_clustered == 0 {
            0.0
        } else {
            100.0 * self.tracks_written as f64 / self.tracks_clustered as f64
        }
    }

    /// Log stats as pretty JSON at debug level.
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            tracing::debug!(phase, "run statistics\n{}", json);
        }
    }

    /// Write stats to a JSON file.
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
