//! Artist relationship graph and identity resolution.
//!
//! The graph is loaded once from the cleaned artists stream and is read-only
//! afterwards. [`IdentityResolver`] expands a raw artist id into every id that
//! should count as the same credited entity:
//!
//! 1. the id itself
//! 2. its aliases, and for each alias that is a group, the group's members and
//!    their aliases
//! 3. if the id is a group, its members and their aliases
//! 4. its name variations and their aliases
//!
//! Ids missing from the graph resolve to themselves.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::io::BufRead;

use crate::error::{ClusterError, RecordKind, Result};
use crate::models::{
    deserialize_artist_id, deserialize_artist_ids, ArtistId, ClusterStats, IdentitySet,
    StringInterner, TrackCredits,
};

/// Placeholder id Discogs uses for "no artist". Never part of an identity.
pub const NO_ARTIST: &str = "118760";

// ============================================================================
// Input Record
// ============================================================================

/// One line of the cleaned artists stream.
#[derive(Debug, Deserialize)]
struct ArtistRecord {
    #[serde(deserialize_with = "deserialize_artist_id")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_artist_ids")]
    aliases: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_artist_ids")]
    members: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_artist_ids")]
    groups: Vec<String>,
    #[serde(default, rename = "namevariations_id", deserialize_with = "deserialize_artist_ids")]
    namevariation_ids: Vec<String>,
    /// Raw name strings. Ids are derived from them when `namevariations_id`
    /// is missing, and they feed the second hop of every derivation.
    #[serde(default)]
    namevariations: Option<Vec<String>>,
}

// ============================================================================
// Graph
// ============================================================================

/// A loaded artist. Empty lists stand for absent fields.
#[derive(Clone, Debug, Default)]
pub struct ArtistNode {
    pub name: Option<String>,
    pub aliases: Vec<ArtistId>,
    /// Present only for groups. Members never have members of their own.
    pub members: Vec<ArtistId>,
    pub namevariation_ids: Vec<ArtistId>,
}

/// Immutable artist graph keyed by artist id.
#[derive(Debug, Default)]
pub struct ArtistGraph {
    nodes: FxHashMap<ArtistId, ArtistNode>,
}

impl ArtistGraph {
    /// Load a line-delimited artist stream.
    ///
    /// Records are sanitized on the way in: an artist is removed from its own
    /// `members`/`groups`, and an artist listing both members and groups keeps
    /// only its groups. Once every record is loaded, aliases and members that
    /// point at ids without a record, or at [`NO_ARTIST`], are dropped.
    /// When `derive_name_variations` is set, records without
    /// `namevariations_id` get ids looked up from their `namevariations` names.
    pub fn from_reader<R: BufRead>(
        reader: R,
        derive_name_variations: bool,
        stats: &mut ClusterStats,
    ) -> Result<Self> {
        let mut interner = StringInterner::new();
        let mut nodes: FxHashMap<ArtistId, ArtistNode> = FxHashMap::default();
        // Load order, for a deterministic name -> id reverse lookup.
        let mut order: Vec<ArtistId> = Vec::new();
        // (id, names, needs derived ids), in load order
        let mut variation_names: Vec<(ArtistId, Vec<String>, bool)> = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut record: ArtistRecord =
                serde_json::from_str(&line).map_err(|source| ClusterError::MalformedRecord {
                    kind: RecordKind::Artist,
                    line: idx + 1,
                    source,
                })?;

            stats.artist_self_references_removed += sanitize(&mut record);
            if !record.members.is_empty() && !record.groups.is_empty() {
                record.members.clear();
                stats.artist_members_dropped += 1;
            }

            let id = interner.intern(&record.id);
            let intern_all = |ids: Vec<String>, interner: &mut StringInterner| -> Vec<ArtistId> {
                ids.iter().map(|s| interner.intern(s)).collect()
            };
            let node = ArtistNode {
                name: record.name,
                aliases: intern_all(record.aliases, &mut interner),
                members: intern_all(record.members, &mut interner),
                namevariation_ids: intern_all(record.namevariation_ids, &mut interner),
            };

            if derive_name_variations {
                if let Some(names) = record.namevariations.filter(|n| !n.is_empty()) {
                    let needs_ids = node.namevariation_ids.is_empty();
                    variation_names.push((ArtistId::clone(&id), names, needs_ids));
                }
            }

            if nodes.insert(ArtistId::clone(&id), node).is_none() {
                order.push(id);
            }
        }

        let mut graph = ArtistGraph { nodes };
        let (dangling, placeholders) = graph.prune_references();
        stats.artist_dangling_references_removed += dangling;
        stats.artist_placeholder_references_removed += placeholders;
        if variation_names.iter().any(|(_, _, needs_ids)| *needs_ids) {
            stats.artists_with_derived_name_variations +=
                graph.derive_name_variations(&order, &variation_names);
        }
        stats.artists_loaded += graph.len();
        Ok(graph)
    }

    /// Drop aliases and members that have no record of their own or are the
    /// [`NO_ARTIST`] placeholder. Returns `(dangling, placeholder)` counts.
    fn prune_references(&mut self) -> (usize, usize) {
        let known: FxHashSet<ArtistId> = self.nodes.keys().cloned().collect();
        let mut dangling = 0;
        let mut placeholders = 0;
        let mut keep = |id: &ArtistId| {
            if !known.contains(id) {
                dangling += 1;
                false
            } else if &**id == NO_ARTIST {
                placeholders += 1;
                false
            } else {
                true
            }
        };
        for node in self.nodes.values_mut() {
            node.aliases.retain(&mut keep);
            node.members.retain(&mut keep);
        }
        (dangling, placeholders)
    }

    /// Resolve `namevariations` names to ids, including the variations of
    /// each variation. Only entries flagged as needing ids are updated.
    /// Returns how many artists gained ids.
    fn derive_name_variations(
        &mut self,
        order: &[ArtistId],
        variation_names: &[(ArtistId, Vec<String>, bool)],
    ) -> usize {
        // Later records win on duplicate names.
        let mut name_to_id: FxHashMap<&str, ArtistId> = FxHashMap::default();
        for id in order {
            if let Some(name) = self.nodes.get(id).and_then(|n| n.name.as_deref()) {
                name_to_id.insert(name, ArtistId::clone(id));
            }
        }
        let names_by_id: FxHashMap<&ArtistId, &Vec<String>> =
            variation_names.iter().map(|(id, names, _)| (id, names)).collect();

        let mut derived: Vec<(ArtistId, Vec<ArtistId>)> = Vec::new();
        for (id, names, _) in variation_names.iter().filter(|(_, _, needs_ids)| *needs_ids) {
            let direct: Vec<ArtistId> = names
                .iter()
                .filter_map(|n| name_to_id.get(n.as_str()).cloned())
                .collect();
            let mut ids: IdentitySet = direct.iter().cloned().collect();
            for variation in &direct {
                if let Some(second) = names_by_id.get(variation) {
                    ids.extend(second.iter().filter_map(|n| name_to_id.get(n.as_str()).cloned()));
                }
            }
            if !ids.is_empty() {
                derived.push((ArtistId::clone(id), ids.iter().cloned().collect()));
            }
        }

        let count = derived.len();
        for (id, ids) in derived {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.namevariation_ids = ids;
            }
        }
        count
    }

    pub fn get(&self, id: &str) -> Option<&ArtistNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Shared handle for `id`, reusing graph storage when the id is known.
    fn handle(&self, id: &str) -> ArtistId {
        match self.nodes.get_key_value(id) {
            Some((key, _)) => ArtistId::clone(key),
            None => ArtistId::from(id),
        }
    }

    fn aliases_of(&self, id: &str) -> &[ArtistId] {
        self.nodes.get(id).map(|n| n.aliases.as_slice()).unwrap_or(&[])
    }

    fn members_of(&self, id: &str) -> &[ArtistId] {
        self.nodes.get(id).map(|n| n.members.as_slice()).unwrap_or(&[])
    }
}

/// Drop self references from members/groups. Returns how many were removed.
/// Dangling and placeholder references are handled after the whole stream is
/// loaded, see [`ArtistGraph::prune_references`].
fn sanitize(record: &mut ArtistRecord) -> usize {
    let before = record.members.len() + record.groups.len();
    let own = record.id.as_str();
    record.members.retain(|m| m != own);
    record.groups.retain(|g| g != own);
    before - record.members.len() - record.groups.len()
}

// ============================================================================
// Identity Resolution
// ============================================================================

/// Expands raw artist credits into identity sets. Holds only a shared borrow
/// of the graph, so it is `Sync` and can be used from every worker at once.
#[derive(Clone, Copy)]
pub struct IdentityResolver<'g> {
    graph: &'g ArtistGraph,
}

impl<'g> IdentityResolver<'g> {
    pub fn new(graph: &'g ArtistGraph) -> Self {
        Self { graph }
    }

    /// Closure of a single raw artist id.
    pub fn resolve_artist(&self, raw: &str) -> IdentitySet {
        let mut out = IdentitySet::new();
        self.collect_related(raw, &mut out);
        out
    }

    /// Performer identity: track artists (release artists when the track has
    /// none) plus featured artists.
    pub fn resolve_performers(&self, credits: &TrackCredits) -> IdentitySet {
        let mut out = IdentitySet::new();
        for raw in credits.performer_ids().iter().chain(&credits.track_feat_ids) {
            self.collect_related(raw, &mut out);
        }
        out
    }

    /// Writer identity: credited writers only.
    pub fn resolve_writers(&self, credits: &TrackCredits) -> IdentitySet {
        let mut out = IdentitySet::new();
        for raw in &credits.track_writer_ids {
            self.collect_related(raw, &mut out);
        }
        out
    }

    fn collect_related(&self, raw: &str, out: &mut IdentitySet) {
        let graph = self.graph;
        out.insert(graph.handle(raw));

        let Some(artist) = graph.get(raw) else {
            return;
        };

        for alias in &artist.aliases {
            out.insert(ArtistId::clone(alias));
            // An alias may be a group
            self.collect_members(alias, out);
        }

        self.collect_members(raw, out);

        for variation in &artist.namevariation_ids {
            out.insert(ArtistId::clone(variation));
            out.extend(graph.aliases_of(variation).iter().cloned());
        }
    }

    /// Members of a group and each member's aliases. One hop only.
    fn collect_members(&self, group: &str, out: &mut IdentitySet) {
        for member in self.graph.members_of(group) {
            out.insert(ArtistId::clone(member));
            out.extend(self.graph.aliases_of(member).iter().cloned());
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
