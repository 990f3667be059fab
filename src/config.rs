//! Run configuration.
//!
//! [`ClusterOptions`] holds the knobs of the pure clustering core;
//! [`RunConfig`] adds the file paths and run-level switches used by
//! [`crate::pipeline::run`]. Neither reads the environment; the binary does.

use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Where the grouping key of a track comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TitleKeySource {
    /// Hard-clean `track_title` with its trailing parenthetical removed.
    #[default]
    Derived,
    /// Use the record's `track_title_cleaned`, deriving it when missing or empty.
    Record,
}

/// Options for the in-memory clustering core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterOptions {
    pub title_key: TitleKeySource,
    pub derive_name_variations: bool,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            title_key: TitleKeySource::Derived,
            derive_name_variations: true,
        }
    }
}

/// Everything a file-level run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub tracks_path: PathBuf,
    pub artists_path: PathBuf,
    /// Output clique stream. `None` picks [`default_output_path`].
    pub output_path: Option<PathBuf>,
    /// Optional JSON file for run statistics.
    pub stats_path: Option<PathBuf>,
    /// Allow replacing an existing output file.
    pub overwrite: bool,
    /// Hide progress bars for tail-friendly logs.
    pub log_only: bool,
    pub options: ClusterOptions,
}

impl RunConfig {
    pub fn new(tracks_path: impl Into<PathBuf>, artists_path: impl Into<PathBuf>) -> Self {
        Self {
            tracks_path: tracks_path.into(),
            artists_path: artists_path.into(),
            output_path: None,
            stats_path: None,
            overwrite: false,
            log_only: false,
            options: ClusterOptions::default(),
        }
    }

    /// Output path actually used by the run.
    pub fn resolved_output_path(&self) -> PathBuf {
        self.output_path
            .clone()
            .unwrap_or_else(|| default_output_path(&self.tracks_path))
    }
}

/// Dump date in names like `discogs_20240701_releases.xml.tracks`.
static DUMP_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"discogs_(.+?)_releases\.xml").unwrap());

/// `Discogs-VI-<date>.jsonl` next to the tracks file. The date comes from the
/// Discogs dump name, or the file stem when the name does not follow it.
pub fn default_output_path(tracks_path: &Path) -> PathBuf {
    let file_name = tracks_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("tracks");
    let date = match DUMP_DATE.captures(file_name) {
        Some(caps) => caps[1].to_string(),
        None => file_name.split('.').next().unwrap_or(file_name).to_string(),
    };
    let dir = tracks_path.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("Discogs-VI-{}.jsonl", date))
}
