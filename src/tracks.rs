//! Track stream reading and normalization.
//!
//! Each line of the track stream is kept verbatim as an opaque record. Only
//! the credit fields are parsed; from them the track gets its grouping key and
//! its resolved performer and writer identity sets. Tracks with an empty key
//! or no credited writers never enter clustering.

use rustc_hash::FxHashMap;
use serde::de::Error as _;
use serde::Deserialize;
use serde_json::Value;
use std::io::BufRead;

use crate::artists::IdentityResolver;
use crate::config::TitleKeySource;
use crate::error::{ClusterError, RecordKind, Result};
use crate::models::{ClusterStats, TitleGroup, TrackCredits, TrackEntry, TrackRecord};
use crate::normalize::title_key;

/// Outcome of normalizing one track.
#[derive(Debug)]
pub enum Prepared {
    Kept(TrackEntry),
    EmptyTitle,
    NoWriters,
}

/// Grouping key for a track under the chosen source.
pub fn grouping_key(credits: &TrackCredits, source: TitleKeySource) -> String {
    match source {
        TitleKeySource::Derived => title_key(&credits.track_title),
        TitleKeySource::Record => match credits.track_title_cleaned.as_deref() {
            Some(cleaned) if !cleaned.is_empty() => cleaned.to_string(),
            _ => title_key(&credits.track_title),
        },
    }
}

/// Attach the derived fields to a track, or say why it is excluded.
pub fn prepare_track(
    credits: TrackCredits,
    record: TrackRecord,
    resolver: &IdentityResolver<'_>,
    source: TitleKeySource,
) -> Prepared {
    let key = grouping_key(&credits, source);
    if key.is_empty() {
        return Prepared::EmptyTitle;
    }
    if credits.track_writer_ids.is_empty() {
        return Prepared::NoWriters;
    }
    Prepared::Kept(TrackEntry {
        performers: resolver.resolve_performers(&credits),
        writers: resolver.resolve_writers(&credits),
        title: credits.track_title,
        title_key: key,
        record,
    })
}

/// Split one JSON line into its credit fields and its opaque record.
pub fn parse_track_line(line: &str) -> std::result::Result<(TrackCredits, TrackRecord), serde_json::Error> {
    let value: Value = serde_json::from_str(line)?;
    let credits = TrackCredits::deserialize(&value)?;
    match value {
        Value::Object(record) => Ok((credits, record)),
        _ => Err(serde_json::Error::custom("track line is not a JSON object")),
    }
}

/// Bucket kept tracks by grouping key, titles in order of first appearance.
#[derive(Default)]
pub struct TitleGrouper {
    index: FxHashMap<String, usize>,
    groups: Vec<TitleGroup>,
}

impl TitleGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, track: TrackEntry) {
        match self.index.get(&track.title_key) {
            Some(&idx) => self.groups[idx].tracks.push(track),
            None => {
                self.index.insert(track.title_key.clone(), self.groups.len());
                self.groups.push(TitleGroup {
                    title_key: track.title_key.clone(),
                    tracks: vec![track],
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn into_groups(self) -> Vec<TitleGroup> {
        self.groups
    }
}

/// Read a line-delimited track stream into title groups.
pub fn read_tracks<R: BufRead>(
    reader: R,
    resolver: &IdentityResolver<'_>,
    source: TitleKeySource,
    stats: &mut ClusterStats,
) -> Result<Vec<TitleGroup>> {
    let mut grouper = TitleGrouper::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (credits, record) =
            parse_track_line(&line).map_err(|source| ClusterError::MalformedRecord {
                kind: RecordKind::Track,
                line: idx + 1,
                source,
            })?;
        stats.tracks_read += 1;

        match prepare_track(credits, record, resolver, source) {
            Prepared::Kept(track) => {
                stats.tracks_clustered += 1;
                grouper.push(track);
            }
            Prepared::EmptyTitle => stats.tracks_skipped_empty_title += 1,
            Prepared::NoWriters => stats.tracks_skipped_no_writers += 1,
        }
    }

    stats.unique_titles += grouper.len();
    Ok(grouper.into_groups())
}

// ============================================================================
// TESTS
// ============================================================================
