//! Safety checks run before any output is written.
//!
//! A clique run reads two large dumps and writes the clique stream plus an
//! optional stats file; these checks make sure neither can land on top of an
//! input or an earlier result.

use anyhow::{bail, Result};
use std::path::Path;

/// Extension every clique stream must carry.
pub const OUTPUT_EXTENSION: &str = "jsonl";

/// Extension of the run statistics file.
pub const STATS_EXTENSION: &str = "json";

/// Validates that an output path is safe to write.
///
/// Checks:
/// - Output must have the `.jsonl` extension
/// - Output cannot be the same as any of the provided source paths
/// - Output must not exist yet, unless `overwrite` is set
pub fn validate_output_path(output: &Path, source_paths: &[&Path], overwrite: bool) -> Result<()> {
    let extension = output.extension().and_then(|e| e.to_str()).unwrap_or("");
    if extension != OUTPUT_EXTENSION {
        bail!(
            "Safety check failed: output file '{}' must have a .{} extension",
            output.display(),
            OUTPUT_EXTENSION
        );
    }

    for source in source_paths {
        if same_file(output, source) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    if output.exists() && !overwrite {
        bail!(
            "Safety check failed: output '{}' already exists (pass --overwrite to replace it)",
            output.display()
        );
    }

    Ok(())
}

/// Validates the optional statistics file against the inputs and the clique
/// output. Same rules as [`validate_output_path`], with a `.json` extension.
pub fn validate_stats_path(stats: &Path, other_paths: &[&Path], overwrite: bool) -> Result<()> {
    let extension = stats.extension().and_then(|e| e.to_str()).unwrap_or("");
    if extension != STATS_EXTENSION {
        bail!(
            "Safety check failed: stats file '{}' must have a .{} extension",
            stats.display(),
            STATS_EXTENSION
        );
    }

    for other in other_paths {
        if same_file(stats, other) {
            bail!(
                "Safety check failed: stats file '{}' cannot be the same as '{}'",
                stats.display(),
                other.display()
            );
        }
    }

    if stats.exists() && !overwrite {
        bail!(
            "Safety check failed: stats file '{}' already exists (pass --overwrite to replace it)",
            stats.display()
        );
    }

    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
