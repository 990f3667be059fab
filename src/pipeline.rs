//! End-to-end clique detection.
//!
//! Phases:
//! 1. Load the artist graph
//! 2. Read tracks into title groups (identity sets resolved per track)
//! 3. Build versions and cliques per title group, in parallel
//! 4. Write the clique stream
//!
//! Title groups share nothing but the read-only artist graph, so phase 3 runs
//! on the rayon pool. Results are collected in title order, which makes the
//! output identical to a single-threaded run.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressBarIter};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::artists::{ArtistGraph, IdentityResolver};
use crate::cliques::build_cliques;
use crate::config::{ClusterOptions, RunConfig};
use crate::error;
use crate::models::{Clique, ClusterStats, TitleGroup};
use crate::progress::{create_byte_progress_bar, create_progress_bar, log_progress, set_log_only};
use crate::safety::{validate_output_path, validate_stats_path};
use crate::serialize::CliqueWriter;
use crate::tracks::read_tracks;
use crate::versions::build_versions;

const LOG_INTERVAL: u64 = 10_000;

// ============================================================================
// In-memory core
// ============================================================================

/// Versions, then cliques, for one title group.
pub fn cluster_title(group: TitleGroup) -> error::Result<(Vec<Clique>, ClusterStats)> {
    let mut stats = ClusterStats::default();
    let title_key = group.title_key.clone();
    let versions = build_versions(group, &mut stats)?;
    if versions.is_empty() {
        return Ok((Vec::new(), stats));
    }
    let cliques = build_cliques(&title_key, versions, &mut stats)?;
    for clique in &cliques {
        stats.record_clique(clique);
    }
    Ok((cliques, stats))
}

/// Cluster every title group on the rayon pool. Cliques come back in title
/// order; the first invariant violation aborts the whole run.
pub fn find_cliques(groups: Vec<TitleGroup>) -> error::Result<(Vec<Clique>, ClusterStats)> {
    let total = groups.len() as u64;
    let pb = create_progress_bar(total, "Phase 3: Building cliques");

    let results: Vec<(Vec<Clique>, ClusterStats)> = groups
        .into_par_iter()
        .map(|group| {
            let result = cluster_title(group);
            pb.inc(1);
            log_progress("cliques", pb.position(), total, LOG_INTERVAL);
            result
        })
        .collect::<error::Result<_>>()?;

    let mut stats = ClusterStats::default();
    let mut cliques = Vec::new();
    for (title_cliques, title_stats) in results {
        stats.merge(&title_stats);
        cliques.extend(title_cliques);
    }

    pb.finish_with_message(format!("Phase 3: Built {} cliques", cliques.len()));
    Ok((cliques, stats))
}

/// Run the whole core over in-memory streams.
pub fn cluster_streams<T: BufRead, A: BufRead>(
    tracks: T,
    artists: A,
    options: &ClusterOptions,
) -> error::Result<(Vec<Clique>, ClusterStats)> {
    let mut stats = ClusterStats::default();
    let graph = ArtistGraph::from_reader(artists, options.derive_name_variations, &mut stats)?;
    let resolver = IdentityResolver::new(&graph);
    let groups = read_tracks(tracks, &resolver, options.title_key, &mut stats)?;
    let (cliques, cluster_stats) = find_cliques(groups)?;
    stats.merge(&cluster_stats);
    Ok((cliques, stats))
}

// ============================================================================
// File-level run
// ============================================================================

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output_path: PathBuf,
    pub stats: ClusterStats,
}

fn open_with_progress(path: &Path, msg: &str) -> Result<(BufReader<ProgressBarIter<File>>, ProgressBar)> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();
    let pb = create_byte_progress_bar(len, msg);
    Ok((BufReader::new(pb.wrap_read(file)), pb))
}

pub fn load_artists(path: &Path, options: &ClusterOptions, stats: &mut ClusterStats) -> Result<ArtistGraph> {
    let (reader, pb) = open_with_progress(path, "Phase 1: Loading artists")?;
    let graph = ArtistGraph::from_reader(reader, options.derive_name_variations, stats)
        .with_context(|| format!("Failed to load artists from {}", path.display()))?;
    pb.finish_with_message(format!("Phase 1: Loaded {} artists", graph.len()));
    info!(
        artists = graph.len(),
        self_references = stats.artist_self_references_removed,
        dangling_references = stats.artist_dangling_references_removed,
        placeholder_references = stats.artist_placeholder_references_removed,
        derived_name_variations = stats.artists_with_derived_name_variations,
        "artist graph loaded"
    );
    Ok(graph)
}

pub fn load_tracks(
    path: &Path,
    resolver: &IdentityResolver<'_>,
    options: &ClusterOptions,
    stats: &mut ClusterStats,
) -> Result<Vec<TitleGroup>> {
    let (reader, pb) = open_with_progress(path, "Phase 2: Reading tracks")?;
    let groups = read_tracks(reader, resolver, options.title_key, stats)
        .with_context(|| format!("Failed to read tracks from {}", path.display()))?;
    pb.finish_with_message(format!("Phase 2: Found {} unique titles", groups.len()));
    info!(
        read = stats.tracks_read,
        clustered = stats.tracks_clustered,
        empty_title = stats.tracks_skipped_empty_title,
        no_writers = stats.tracks_skipped_no_writers,
        titles = groups.len(),
        "tracks grouped by title"
    );
    Ok(groups)
}

pub fn write_cliques(path: &Path, cliques: &[Clique]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = CliqueWriter::new(BufWriter::new(file));
    let pb = create_progress_bar(cliques.len() as u64, "Phase 4: Writing cliques");
    for clique in cliques {
        writer
            .write_clique(clique)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        pb.inc(1);
    }
    let (written, versions) = (writer.cliques_written(), writer.versions_written());
    writer
        .finish()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    pb.finish_with_message(format!("Phase 4: Wrote {} cliques, {} versions", written, versions));
    Ok(())
}

/// Read both input files, cluster, and write the clique stream (and the
/// statistics file when one is configured).
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    let start = Instant::now();
    set_log_only(config.log_only);
    let output_path = config.resolved_output_path();
    validate_output_path(
        &output_path,
        &[&config.tracks_path, &config.artists_path],
        config.overwrite,
    )?;
    if let Some(stats_path) = &config.stats_path {
        validate_stats_path(
            stats_path,
            &[&config.tracks_path, &config.artists_path, &output_path],
            config.overwrite,
        )?;
    }
    for path in [Some(&output_path), config.stats_path.as_ref()].into_iter().flatten() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    let mut stats = ClusterStats::default();
    let graph = load_artists(&config.artists_path, &config.options, &mut stats)?;
    stats.log_phase("artists");

    let resolver = IdentityResolver::new(&graph);
    let groups = load_tracks(&config.tracks_path, &resolver, &config.options, &mut stats)?;
    stats.log_phase("tracks");

    let (cliques, cluster_stats) = find_cliques(groups).context("Clique detection aborted")?;
    stats.merge(&cluster_stats);
    info!(
        cliques = stats.cliques,
        versions = stats.versions,
        tied_buckets_dropped = stats.tied_buckets_dropped,
        "cliques built"
    );

    write_cliques(&output_path, &cliques)?;

    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    stats.log_phase("done");
    if let Some(stats_path) = &config.stats_path {
        stats
            .write_to_file(stats_path)
            .with_context(|| format!("Failed to write stats to {}", stats_path.display()))?;
    }

    Ok(RunSummary { output_path, stats })
}

// ============================================================================
// TESTS
// ============================================================================
