//! Clique stream writer.
//!
//! Cliques get ids `C-0000000`, `C-0000001`, ... in the order written, and
//! versions get `V-...` ids counted across all cliques. Ids are only stable
//! within one run. Track records are written back exactly as they were read.

use serde::Serialize;
use std::io::Write;

use crate::error::Result;
use crate::models::{Clique, TrackRecord};

pub const CLIQUE_ID_PREFIX: &str = "C";
pub const VERSION_ID_PREFIX: &str = "V";

/// Zero-padded sequential id, e.g. `C-0000123`.
pub fn format_id(prefix: &str, n: usize) -> String {
    format!("{}-{:07}", prefix, n)
}

#[derive(Serialize)]
struct VersionRecord<'a> {
    version_id: String,
    tracks: Vec<&'a TrackRecord>,
}

#[derive(Serialize)]
struct CliqueRecord<'a> {
    clique_id: String,
    versions: Vec<VersionRecord<'a>>,
}

/// Writes one clique record per line and hands out ids.
pub struct CliqueWriter<W: Write> {
    out: W,
    next_clique: usize,
    next_version: usize,
}

impl<W: Write> CliqueWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            next_clique: 0,
            next_version: 0,
        }
    }

    /// Serialize one clique and return its id.
    pub fn write_clique(&mut self, clique: &Clique) -> Result<String> {
        let clique_id = format_id(CLIQUE_ID_PREFIX, self.next_clique);
        self.next_clique += 1;

        let versions = clique
            .versions
            .iter()
            .map(|tracks| {
                let version_id = format_id(VERSION_ID_PREFIX, self.next_version);
                self.next_version += 1;
                VersionRecord {
                    version_id,
                    tracks: tracks.iter().map(|t| &t.record).collect(),
                }
            })
            .collect();

        let record = CliqueRecord {
            clique_id: clique_id.clone(),
            versions,
        };
        serde_json::to_writer(&mut self.out, &record).map_err(std::io::Error::from)?;
        self.out.write_all(b"\n")?;
        Ok(clique_id)
    }

    pub fn cliques_written(&self) -> usize {
        self.next_clique
    }

    pub fn versions_written(&self) -> usize {
        self.next_version
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
