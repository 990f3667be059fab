use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use discogs_cliques::config::{ClusterOptions, RunConfig, TitleKeySource};
use discogs_cliques::pipeline;
use discogs_cliques::progress::format_duration;

#[derive(Parser)]
#[command(name = "clique-finder")]
#[command(about = "Group Discogs tracks into versions and cliques by title, performers and writers")]
struct Args {
    /// Cleaned track stream (one JSON record per line)
    tracks: PathBuf,

    /// Cleaned artist stream (one JSON record per line)
    artists: PathBuf,

    /// Output clique stream. Defaults to Discogs-VI-<date>.jsonl next to the tracks file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write run statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Rayon worker threads (0 = rayon default)
    #[arg(long, default_value = "0", env = "CLIQUE_FINDER_WORKERS")]
    workers: usize,

    /// Source of the title grouping key
    #[arg(long, value_enum, default_value_t = TitleKeySource::Derived)]
    title_key: TitleKeySource,

    /// Do not derive name-variation ids from name strings
    #[arg(long)]
    no_derive_name_variations: bool,

    /// Replace an existing output file
    #[arg(long)]
    overwrite: bool,

    /// Hide progress bars (tail-friendly logs)
    #[arg(long, env = "CLIQUE_FINDER_LOG_ONLY")]
    log_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let config = RunConfig {
        tracks_path: args.tracks,
        artists_path: args.artists,
        output_path: args.output,
        stats_path: args.stats,
        overwrite: args.overwrite,
        log_only: args.log_only,
        options: ClusterOptions {
            title_key: args.title_key,
            derive_name_variations: !args.no_derive_name_variations,
        },
    };

    println!("Reading tracks: {:?}", config.tracks_path);
    println!("Reading artists: {:?}", config.artists_path);

    let summary = pipeline::run(&config)?;
    let stats = &summary.stats;

    println!("\n{:=<60}", "");
    println!("Clique detection complete!");
    println!("  Tracks read: {}", stats.tracks_read);
    println!(
        "  Excluded: {} empty titles, {} without writers",
        stats.tracks_skipped_empty_title, stats.tracks_skipped_no_writers
    );
    println!("  Unique titles: {}", stats.unique_titles);
    println!("  Titles with >1 performer: {}", stats.titles_multi_performer);
    println!(
        "  Writer agreements: {}, disagreements: {} ({} voted, {} tied and dropped)",
        stats.writer_agreements,
        stats.writer_disagreements,
        stats.voted_agreements,
        stats.tied_buckets_dropped
    );
    println!("  Versions split by title: {}", stats.versions_split_by_title);
    println!("  Cliques: {}", stats.cliques);
    println!("  Versions: {}", stats.versions);
    println!("  Tracks: {} ({:.1}% of clustered)", stats.tracks_written, stats.coverage());
    println!("  Output: {:?}", summary.output_path);
    println!(
        "  Elapsed: {}",
        format_duration(std::time::Duration::from_secs_f64(stats.elapsed_seconds))
    );
    println!("{:=<60}", "");

    Ok(())
}
