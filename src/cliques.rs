//! Clique building.
//!
//! The versions of one title are grouped by writer overlap, across performer
//! identities, with the same place-then-coalesce procedure the version
//! builder uses. Cliques need at least two versions. Each surviving version
//! is then regrouped by its full cleaned title (parentheticals kept), which
//! splits versions that writer overlap folded together by mistake.

use rustc_hash::FxHashMap;

use crate::error::{MergeStage, Result};
use crate::merge::{coalesce, ensure_disjoint, place, WriterGroup};
use crate::models::{Clique, ClusterStats, TrackEntry, Version};
use crate::normalize::disentangle_key;

/// Split a version's tracks by disentanglement key, keys in order of first
/// appearance. A version with a single key comes back unchanged.
pub fn disentangle(tracks: Vec<TrackEntry>) -> Vec<Vec<TrackEntry>> {
    let mut index: FxHashMap<String, usize> = FxHashMap::default();
    let mut parts: Vec<Vec<TrackEntry>> = Vec::new();
    for track in tracks {
        let key = disentangle_key(&track.title);
        match index.get(&key) {
            Some(&idx) => parts[idx].push(track),
            None => {
                index.insert(key, parts.len());
                parts.push(vec![track]);
            }
        }
    }
    parts
}

/// Build the cliques of one title from its versions.
pub fn build_cliques(
    title_key: &str,
    versions: Vec<Version>,
    stats: &mut ClusterStats,
) -> Result<Vec<Clique>> {
    let mut groups: Vec<WriterGroup<Version>> = Vec::new();
    for mut version in versions {
        let writers = std::mem::take(&mut version.writers);
        place(&mut groups, writers, version);
    }

    let groups = coalesce(groups);
    ensure_disjoint(MergeStage::Cliques, title_key, &groups)?;

    let mut cliques = Vec::new();
    for group in groups {
        if group.items.len() < 2 {
            stats.single_version_cliques_dropped += 1;
            continue;
        }

        let mut versions = Vec::with_capacity(group.items.len());
        for version in group.items {
            let parts = disentangle(version.tracks);
            if parts.len() > 1 {
                stats.versions_split_by_title += 1;
            }
            versions.extend(parts);
        }
        cliques.push(Clique {
            title_key: title_key.to_string(),
            versions,
        });
    }
    Ok(cliques)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtistId, IdentitySet, TrackRecord};

    fn set(ids: &[&str]) -> IdentitySet {
        ids.iter().map(|id| ArtistId::from(*id)).collect()
    }

    fn track(title: &str, performer: &str) -> TrackEntry {
        let mut record = TrackRecord::new();
        record.insert("track_title".to_string(), title.into());
        TrackEntry {
            title: title.to_string(),
            title_key: "song".to_string(),
            performers: set(&[performer]),
            writers: IdentitySet::new(),
            record,
        }
    }

    fn version(performer: &str, writers: &[&str], titles: &[&str]) -> Version {
        Version {
            performers: set(&[performer]),
            writers: set(writers),
            tracks: titles.iter().map(|t| track(t, performer)).collect(),
        }
    }

    fn titles(clique: &Clique) -> Vec<Vec<&str>> {
        clique
            .versions
            .iter()
            .map(|v| v.iter().map(|t| t.title.as_str()).collect())
            .collect()
    }

    #[test]
    fn test_shared_writer_forms_clique() {
        let mut stats = ClusterStats::default();
        let cliques = build_cliques(
            "song",
            vec![version("A", &["W1"], &["Song"]), version("B", &["W1"], &["Song"])],
            &mut stats,
        )
        .unwrap();
        assert_eq!(cliques.len(), 1);
        assert_eq!(cliques[0].versions.len(), 2);
        assert_eq!(cliques[0].title_key, "song");
    }

    #[test]
    fn test_single_version_cliques_dropped() {
        let mut stats = ClusterStats::default();
        let cliques = build_cliques(
            "song",
            vec![
                version("A", &["W1"], &["Song"]),
                version("B", &["W2"], &["Song"]),
                version("C", &["W1"], &["Song"]),
            ],
            &mut stats,
        )
        .unwrap();
        assert_eq!(cliques.len(), 1);
        assert_eq!(cliques[0].versions.len(), 2);
        assert_eq!(stats.single_version_cliques_dropped, 1);
    }

    #[test]
    fn test_cliques_merge_transitively() {
        let mut stats = ClusterStats::default();
        let cliques = build_cliques(
            "song",
            vec![
                version("A", &["W1"], &["Song"]),
                version("B", &["W2"], &["Song"]),
                version("C", &["W1", "W2"], &["Song"]),
            ],
            &mut stats,
        )
        .unwrap();
        assert_eq!(cliques.len(), 1);
        assert_eq!(cliques[0].versions.len(), 3);
        assert_eq!(stats.single_version_cliques_dropped, 0);
    }

    #[test]
    fn test_version_split_by_full_title() {
        let mut stats = ClusterStats::default();
        let cliques = build_cliques(
            "song",
            vec![
                version("A", &["W1"], &["Song (Part 1)", "Song (Part 2)", "Song (part 1)"]),
                version("C", &["W1"], &["Song"]),
            ],
            &mut stats,
        )
        .unwrap();
        assert_eq!(cliques.len(), 1);
        assert_eq!(
            titles(&cliques[0]),
            vec![
                vec!["Song (Part 1)", "Song (part 1)"],
                vec!["Song (Part 2)"],
                vec!["Song"],
            ]
        );
        assert_eq!(stats.versions_split_by_title, 1);
    }

    #[test]
    fn test_disentangle_keeps_single_key_version() {
        let parts = disentangle(vec![track("The Song", "A"), track("Song!", "A")]);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len(), 2);
    }

    #[test]
    fn test_no_versions_no_cliques() {
        let mut stats = ClusterStats::default();
        let cliques = build_cliques("song", Vec::new(), &mut stats).unwrap();
        assert!(cliques.is_empty());
    }
}
