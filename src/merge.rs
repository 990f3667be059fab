//! Writer-overlap merging shared by the version and clique builders.
//!
//! Both builders first place items incrementally (join the first group whose
//! writer set intersects, else open a new group) and then merge groups until
//! no two writer sets intersect. The fixed point is computed with a
//! union-find over group indices: every artist id remembers the first group
//! that contained it, and any later group containing the same id is unioned
//! with it. One pass over all ids settles every transitive chain, so there is
//! no rescan loop and no in-place deletion.

use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;

use crate::error::{ClusterError, MergeStage, Result};
use crate::models::{ArtistId, IdentitySet};

// ============================================================================
// Union-Find
// ============================================================================

/// Disjoint-set forest over `0..n` with path compression and union by rank.
#[derive(Debug, Clone)]
pub struct DisjointSets {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSets {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Merge the sets holding `a` and `b`. Returns false if already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] = self.rank[ra].saturating_add(1);
            }
        }
        true
    }
}

// ============================================================================
// Writer Groups
// ============================================================================

/// Items backed by one writer-identity set.
#[derive(Clone, Debug)]
pub struct WriterGroup<T> {
    pub writers: IdentitySet,
    pub items: Vec<T>,
}

impl<T> WriterGroup<T> {
    pub fn new(writers: IdentitySet, item: T) -> Self {
        Self {
            writers,
            items: vec![item],
        }
    }

    /// Take over another group's writers and items (appended after ours).
    pub fn absorb(&mut self, other: WriterGroup<T>) {
        self.writers.union_with(other.writers);
        self.items.extend(other.items);
    }
}

/// Incremental placement: join the first group whose writers intersect,
/// widening its writer set, or open a new group.
///
/// Widening can make two existing groups overlap; [`coalesce`] fixes that.
pub fn place<T>(groups: &mut Vec<WriterGroup<T>>, writers: IdentitySet, item: T) {
    match groups.iter_mut().find(|g| g.writers.intersects(&writers)) {
        Some(group) => {
            group.writers.union_with(writers);
            group.items.push(item);
        }
        None => groups.push(WriterGroup::new(writers, item)),
    }
}

/// Merge groups with intersecting writer sets, transitively, until every
/// pair is disjoint.
///
/// Merged groups keep the position of their earliest member and list items
/// in member order. The result never has more groups than the input.
pub fn coalesce<T>(groups: Vec<WriterGroup<T>>) -> Vec<WriterGroup<T>> {
    if groups.len() < 2 {
        return groups;
    }

    let mut sets = DisjointSets::new(groups.len());
    {
        let mut first_owner: FxHashMap<&ArtistId, usize> = FxHashMap::default();
        for (idx, group) in groups.iter().enumerate() {
            for id in &group.writers {
                match first_owner.entry(id) {
                    Entry::Occupied(owner) => {
                        sets.union(*owner.get(), idx);
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(idx);
                    }
                }
            }
        }
    }

    let roots: Vec<usize> = (0..groups.len()).map(|i| sets.find(i)).collect();
    let mut slot_of_root: FxHashMap<usize, usize> = FxHashMap::default();
    let mut merged: Vec<WriterGroup<T>> = Vec::with_capacity(groups.len());
    for (group, root) in groups.into_iter().zip(roots) {
        match slot_of_root.entry(root) {
            Entry::Occupied(slot) => merged[*slot.get()].absorb(group),
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(group);
            }
        }
    }
    merged
}

/// Verify the post-condition of [`coalesce`]: no artist id appears in two
/// groups. A violation names the title group and aborts the run.
pub fn ensure_disjoint<T>(
    stage: MergeStage,
    title: &str,
    groups: &[WriterGroup<T>],
) -> Result<()> {
    let mut owner: FxHashMap<&ArtistId, usize> = FxHashMap::default();
    for (idx, group) in groups.iter().enumerate() {
        for id in &group.writers {
            if let Some(&prev) = owner.get(id) {
                if prev != idx {
                    return Err(ClusterError::OverlappingWriters {
                        stage,
                        title: title.to_string(),
                        artist: id.to_string(),
                    });
                }
            }
            owner.insert(id, idx);
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
