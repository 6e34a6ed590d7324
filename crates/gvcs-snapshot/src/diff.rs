//! Structural diff between two manifests.
//!
//! Both tries are walked in lockstep. Whenever two subtrees carry the same
//! hash the walk stops there, so unchanged regions are never read. A leaf on
//! one side facing a branch on the other is handled by partitioning the
//! leaf's entries with the same key-hash byte the branch uses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gvcs_store::ObjectStore;
use gvcs_types::{EntityId, ObjectId};

use crate::error::SnapshotResult;
use crate::manifest::{key_hash, load_node, ManifestEntry, ManifestNode};

/// How an entity differs between two snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Removed => write!(f, "removed"),
            Self::Modified => write!(f, "modified"),
        }
    }
}

/// A single entity change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChange {
    pub id: EntityId,
    pub kind: ChangeKind,
    /// Record hash on the old side (`None` when added).
    pub old: Option<ObjectId>,
    /// Record hash on the new side (`None` when removed).
    pub new: Option<ObjectId>,
}

/// The result of comparing two snapshots, sorted by entity id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    pub changes: Vec<EntityChange>,
}

impl SnapshotDiff {
    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Find the change for a given entity.
    pub fn get(&self, id: &EntityId) -> Option<&EntityChange> {
        self.changes
            .binary_search_by(|c| c.id.cmp(id))
            .ok()
            .map(|i| &self.changes[i])
    }

    /// Changes keyed by entity id.
    pub fn by_id(&self) -> BTreeMap<&EntityId, &EntityChange> {
        self.changes.iter().map(|c| (&c.id, c)).collect()
    }

    /// Entity ids touched by this diff.
    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.changes.iter().map(|c| &c.id)
    }
}

/// One side of the lockstep walk.
enum Side {
    /// A stored subtree, not yet read.
    Stored(ObjectId),
    /// Entries already in memory (a partitioned leaf, or nothing).
    Entries(Vec<ManifestEntry>),
}

enum Loaded {
    Entries(Vec<ManifestEntry>),
    Children(BTreeMap<u8, ObjectId>),
}

fn load(store: &dyn ObjectStore, side: Side) -> SnapshotResult<Loaded> {
    Ok(match side {
        Side::Entries(entries) => Loaded::Entries(entries),
        Side::Stored(id) => match load_node(store, &id)? {
            ManifestNode::Leaf { entries } => Loaded::Entries(entries),
            ManifestNode::Branch { children, .. } => {
                Loaded::Children(children.into_iter().map(|c| (c.byte, c.id)).collect())
            }
        },
    })
}

/// Compare two manifest roots.
pub fn diff(store: &dyn ObjectStore, old: &ObjectId, new: &ObjectId) -> SnapshotResult<SnapshotDiff> {
    let mut changes = Vec::new();
    diff_sides(store, Side::Stored(*old), Side::Stored(*new), 0, &mut changes)?;
    changes.sort_by(|a, b| a.id.cmp(&b.id));
    tracing::trace!(old = %old.short_hex(), new = %new.short_hex(), changes = changes.len(), "diffed manifests");
    Ok(SnapshotDiff { changes })
}

fn diff_sides(
    store: &dyn ObjectStore,
    old: Side,
    new: Side,
    depth: usize,
    out: &mut Vec<EntityChange>,
) -> SnapshotResult<()> {
    if let (Side::Stored(a), Side::Stored(b)) = (&old, &new) {
        if a == b {
            return Ok(());
        }
    }

    match (load(store, old)?, load(store, new)?) {
        (Loaded::Entries(a), Loaded::Entries(b)) => {
            diff_entries(a, b, out);
            Ok(())
        }
        (Loaded::Children(a), Loaded::Children(b)) => {
            let bytes: std::collections::BTreeSet<u8> = a.keys().chain(b.keys()).copied().collect();
            for byte in bytes {
                let old = a.get(&byte).map_or(Side::Entries(Vec::new()), |id| Side::Stored(*id));
                let new = b.get(&byte).map_or(Side::Entries(Vec::new()), |id| Side::Stored(*id));
                diff_sides(store, old, new, depth + 1, out)?;
            }
            Ok(())
        }
        (Loaded::Entries(a), Loaded::Children(b)) => {
            let mut parts = partition(a, depth);
            for (byte, id) in b {
                let old = Side::Entries(parts.remove(&byte).unwrap_or_default());
                diff_sides(store, old, Side::Stored(id), depth + 1, out)?;
            }
            for (_, rest) in parts {
                diff_entries(rest, Vec::new(), out);
            }
            Ok(())
        }
        (Loaded::Children(a), Loaded::Entries(b)) => {
            let mut parts = partition(b, depth);
            for (byte, id) in a {
                let new = Side::Entries(parts.remove(&byte).unwrap_or_default());
                diff_sides(store, Side::Stored(id), new, depth + 1, out)?;
            }
            for (_, rest) in parts {
                diff_entries(Vec::new(), rest, out);
            }
            Ok(())
        }
    }
}

fn partition(entries: Vec<ManifestEntry>, depth: usize) -> BTreeMap<u8, Vec<ManifestEntry>> {
    let mut parts: BTreeMap<u8, Vec<ManifestEntry>> = BTreeMap::new();
    for entry in entries {
        parts.entry(key_hash(&entry.id)[depth]).or_default().push(entry);
    }
    parts
}

/// Merge-walk two sorted entry lists.
fn diff_entries(old: Vec<ManifestEntry>, new: Vec<ManifestEntry>, out: &mut Vec<EntityChange>) {
    let mut old = old.into_iter().peekable();
    let mut new = new.into_iter().peekable();
    loop {
        let ordering = match (old.peek(), new.peek()) {
            (None, None) => break,
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (Some(a), Some(b)) => a.id.cmp(&b.id),
        };
        match ordering {
            std::cmp::Ordering::Less => {
                if let Some(a) = old.next() {
                    out.push(EntityChange {
                        id: a.id,
                        kind: ChangeKind::Removed,
                        old: Some(a.hash),
                        new: None,
                    });
                }
            }
            std::cmp::Ordering::Greater => {
                if let Some(b) = new.next() {
                    out.push(EntityChange {
                        id: b.id,
                        kind: ChangeKind::Added,
                        old: None,
                        new: Some(b.hash),
                    });
                }
            }
            std::cmp::Ordering::Equal => {
                if let (Some(a), Some(b)) = (old.next(), new.next()) {
                    if a.hash != b.hash {
                        out.push(EntityChange {
                            id: a.id,
                            kind: ChangeKind::Modified,
                            old: Some(a.hash),
                            new: Some(b.hash),
                        });
                    }
                }
            }
        }
    }
}
