//! Error taxonomy for the clustering core.
//!
//! Filtering rules (empty title key, no writers) and majority-vote ties are
//! not errors; they are counted in [`crate::models::ClusterStats`].

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClusterError>;

/// Which merge produced an overlapping pair of writer sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStage {
    Versions,
    Cliques,
}

impl fmt::Display for MergeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStage::Versions => f.write_str("versions"),
            MergeStage::Cliques => f.write_str("cliques"),
        }
    }
}

/// Which input stream a malformed line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Artist,
    Track,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Artist => f.write_str("artist"),
            RecordKind::Track => f.write_str("track"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClusterError {
    /// Two surviving groups of one title still share a writer after the merge
    /// fixed point. This is a logic bug and aborts the run.
    #[error("writer identity sets of two {stage} in title group '{title}' share artist {artist}")]
    OverlappingWriters {
        stage: MergeStage,
        title: String,
        artist: String,
    },

    #[error("malformed {kind} record on line {line}: {source}")]
    MalformedRecord {
        kind: RecordKind,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
