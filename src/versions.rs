//! Version building.
//!
//! Within one title group, tracks are bucketed by performer identity set.
//! Each bucket is split by writer identity (placement, then fixed-point
//! merge), and a bucket left with several disjoint writer credits is settled
//! by majority vote on track count. Every surviving bucket is one version.

use rustc_hash::FxHashMap;

use crate::error::{MergeStage, Result};
use crate::merge::{coalesce, ensure_disjoint, place, WriterGroup};
use crate::models::{ClusterStats, IdentitySet, TitleGroup, TrackEntry, Version};

/// One (title, performer-set) bucket while it is being filled.
struct PerformerBucket {
    performers: IdentitySet,
    credits: Vec<WriterGroup<TrackEntry>>,
}

/// Outcome of settling one performer bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// One writer credit, no vote needed.
    Agreed,
    /// Several credits, a unique largest one kept.
    Voted,
    /// Several credits tied for the largest; bucket dropped.
    Tied,
}

/// Index of the credit backed by the most tracks, or `None` on a tie.
fn majority(credits: &[WriterGroup<TrackEntry>]) -> Option<usize> {
    let max = credits.iter().map(|c| c.items.len()).max()?;
    let mut winners = credits
        .iter()
        .enumerate()
        .filter(|(_, c)| c.items.len() == max)
        .map(|(idx, _)| idx);
    let first = winners.next()?;
    match winners.next() {
        Some(_) => None,
        None => Some(first),
    }
}

/// Merge a bucket's credits and reduce them to a single one.
fn settle(
    title: &str,
    bucket: PerformerBucket,
) -> Result<(Resolution, Option<Version>)> {
    let mut credits = coalesce(bucket.credits);
    ensure_disjoint(MergeStage::Versions, title, &credits)?;

    let (resolution, kept) = if credits.len() == 1 {
        (Resolution::Agreed, credits.pop())
    } else {
        match majority(&credits) {
            Some(idx) => (Resolution::Voted, Some(credits.swap_remove(idx))),
            None => (Resolution::Tied, None),
        }
    };

    let version = kept.map(|credit| Version {
        performers: bucket.performers,
        writers: credit.writers,
        tracks: credit.items,
    });
    Ok((resolution, version))
}

/// Build the versions of one title group.
///
/// Returns an empty list when the title has fewer than two performer
/// identities, or when voting left nothing. Versions come out in order of
/// each performer set's first track.
pub fn build_versions(group: TitleGroup, stats: &mut ClusterStats) -> Result<Vec<Version>> {
    let TitleGroup { title_key, tracks } = group;

    let mut index: FxHashMap<IdentitySet, usize> = FxHashMap::default();
    let mut buckets: Vec<PerformerBucket> = Vec::new();
    for mut track in tracks {
        let writers = std::mem::take(&mut track.writers);
        let slot = match index.get(&track.performers) {
            Some(&slot) => slot,
            None => {
                index.insert(track.performers.clone(), buckets.len());
                buckets.push(PerformerBucket {
                    performers: track.performers.clone(),
                    credits: Vec::new(),
                });
                buckets.len() - 1
            }
        };
        place(&mut buckets[slot].credits, writers, track);
    }

    if buckets.len() < 2 {
        stats.titles_single_performer += 1;
        return Ok(Vec::new());
    }
    stats.titles_multi_performer += 1;

    let mut versions = Vec::with_capacity(buckets.len());
    for bucket in buckets {
        let (resolution, version) = settle(&title_key, bucket)?;
        match resolution {
            Resolution::Agreed => stats.writer_agreements += 1,
            Resolution::Voted => {
                stats.writer_disagreements += 1;
                stats.voted_agreements += 1;
            }
            Resolution::Tied => {
                stats.writer_disagreements += 1;
                stats.tied_buckets_dropped += 1;
            }
        }
        versions.extend(version);
    }

    if versions.is_empty() {
        stats.titles_emptied_by_vote += 1;
    }
    stats.versions_built += versions.len();
    Ok(versions)
}

// ============================================================================
// TESTS
// ============================================================================
