//! Snapshot manifests as a canonical Merkle trie.
//!
//! A manifest maps every [`EntityId`] in a graph state to the content hash
//! of its record. Entities are placed by the `KEY`-domain hash of their id:
//! a trie node at depth `d` whose subtree holds at most [`LEAF_CAPACITY`]
//! entries is a leaf listing them sorted by id; a larger subtree is a branch
//! whose children are keyed by byte `d` of the key hash.
//!
//! The shape depends only on the entry set, never on the order edits were
//! applied, so equal graph states always have equal root hashes. Changing
//! one entity rewrites exactly the trie nodes on its path to the root.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gvcs_crypto::ContentHasher;
use gvcs_store::{ContentKind, ContentObject, ObjectStore, StoreError};
use gvcs_types::{EntityId, ObjectId};

use crate::error::{SnapshotError, SnapshotResult};

/// Maximum number of entries a leaf may hold before it splits.
pub const LEAF_CAPACITY: usize = 64;

/// Key hashes are 32 bytes, so no branch can sit deeper than this.
pub const MAX_DEPTH: usize = 32;

/// One `(entity, record hash)` pair in a leaf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: EntityId,
    pub hash: ObjectId,
}

/// A child pointer in a branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestChild {
    /// Key-hash byte selecting this child.
    pub byte: u8,
    /// Root of the child subtree.
    pub id: ObjectId,
    /// Number of entries in the child subtree.
    pub count: u64,
}

/// A stored trie node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestNode {
    Leaf {
        entries: Vec<ManifestEntry>,
    },
    Branch {
        count: u64,
        children: Vec<ManifestChild>,
    },
}

impl ManifestNode {
    /// Number of entries in the subtree rooted here.
    pub fn count(&self) -> u64 {
        match self {
            Self::Leaf { entries } => entries.len() as u64,
            Self::Branch { count, .. } => *count,
        }
    }

    /// Convert into a `ContentObject` for storage.
    pub fn to_content_object(&self) -> SnapshotResult<ContentObject> {
        let data = serde_json::to_vec(self)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(ContentObject::new(ContentKind::TreeManifest, data))
    }

    /// Decode and structurally validate a trie node read under `id`.
    pub fn from_content_object(id: &ObjectId, obj: &ContentObject) -> SnapshotResult<Self> {
        let corrupt = |reason: String| SnapshotError::Corrupt { id: *id, reason };
        if obj.kind != ContentKind::TreeManifest {
            return Err(corrupt(format!("expected manifest, got {}", obj.kind)));
        }
        let node: Self = serde_json::from_slice(&obj.data)
            .map_err(|e| corrupt(format!("undecodable manifest: {e}")))?;
        match &node {
            Self::Leaf { entries } => {
                if entries.windows(2).any(|w| w[0].id >= w[1].id) {
                    return Err(corrupt("leaf entries out of order".into()));
                }
            }
            Self::Branch { count, children } => {
                if children.windows(2).any(|w| w[0].byte >= w[1].byte) {
                    return Err(corrupt("branch children out of order".into()));
                }
                let sum: u64 = children.iter().map(|c| c.count).sum();
                if sum != *count {
                    return Err(corrupt(format!("branch count {count} != children {sum}")));
                }
            }
        }
        Ok(node)
    }
}

/// Placement key of an entity in the trie.
pub(crate) fn key_hash(id: &EntityId) -> [u8; 32] {
    *ContentHasher::KEY.hash(&id.key_bytes()).as_bytes()
}

/// Read and decode a trie node.
pub(crate) fn load_node(store: &dyn ObjectStore, id: &ObjectId) -> SnapshotResult<ManifestNode> {
    let obj = store.get(id)?;
    ManifestNode::from_content_object(id, &obj)
}

/// Manifest operations against an object store.
///
/// Manifests are identified by their root [`ObjectId`]; this handle only
/// carries the store they live in.
#[derive(Clone, Copy)]
pub struct Manifest<'s> {
    store: &'s dyn ObjectStore,
}

impl<'s> Manifest<'s> {
    pub fn new(store: &'s dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Write the empty manifest and return its root.
    pub fn empty(&self) -> SnapshotResult<ObjectId> {
        self.write_node(&ManifestNode::Leaf {
            entries: Vec::new(),
        })
    }

    /// Build a manifest from a complete entry set.
    pub fn build(&self, entries: &BTreeMap<EntityId, ObjectId>) -> SnapshotResult<ObjectId> {
        let entries = entries.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let (root, count) = self.build_subtree(entries, 0)?;
        tracing::debug!(root = %root.short_hex(), count, "built manifest");
        Ok(root)
    }

    /// Apply a change set to an existing manifest and return the new root.
    ///
    /// `Some(hash)` inserts or replaces an entry, `None` removes it (a no-op
    /// if absent). Only trie nodes on the paths of changed keys are
    /// rewritten; the result is identical to [`Manifest::build`] over the
    /// resulting entry set.
    pub fn apply(
        &self,
        root: &ObjectId,
        changes: &BTreeMap<EntityId, Option<ObjectId>>,
    ) -> SnapshotResult<ObjectId> {
        if changes.is_empty() {
            return Ok(*root);
        }
        let changes = changes.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let (new_root, count) = self.apply_subtree(Some(root), changes, 0)?;
        tracing::debug!(
            from = %root.short_hex(),
            to = %new_root.short_hex(),
            count,
            "applied manifest changes"
        );
        Ok(new_root)
    }

    /// Look up one entity's record hash.
    pub fn get(&self, root: &ObjectId, id: &EntityId) -> SnapshotResult<Option<ObjectId>> {
        let key = key_hash(id);
        let mut current = *root;
        let mut depth = 0;
        loop {
            match load_node(self.store, &current)? {
                ManifestNode::Leaf { entries } => {
                    return Ok(entries
                        .binary_search_by(|e| e.id.cmp(id))
                        .ok()
                        .map(|i| entries[i].hash));
                }
                ManifestNode::Branch { children, .. } => {
                    if depth >= MAX_DEPTH {
                        return Err(SnapshotError::Corrupt {
                            id: current,
                            reason: "branch below maximum depth".into(),
                        });
                    }
                    match children.binary_search_by_key(&key[depth], |c| c.byte) {
                        Ok(i) => current = children[i].id,
                        Err(_) => return Ok(None),
                    }
                    depth += 1;
                }
            }
        }
    }

    /// Every entry of the manifest, sorted by id.
    pub fn entries(&self, root: &ObjectId) -> SnapshotResult<BTreeMap<EntityId, ObjectId>> {
        let mut out = BTreeMap::new();
        self.collect_entries(root, &mut out)?;
        Ok(out)
    }

    /// Number of entries, read from the root alone.
    pub fn len(&self, root: &ObjectId) -> SnapshotResult<u64> {
        Ok(load_node(self.store, root)?.count())
    }

    /// Whether the manifest has no entries.
    pub fn is_empty(&self, root: &ObjectId) -> SnapshotResult<bool> {
        Ok(self.len(root)? == 0)
    }

    fn write_node(&self, node: &ManifestNode) -> SnapshotResult<ObjectId> {
        Ok(self.store.write(&node.to_content_object()?)?)
    }

    fn collect_entries(
        &self,
        id: &ObjectId,
        out: &mut BTreeMap<EntityId, ObjectId>,
    ) -> SnapshotResult<()> {
        match load_node(self.store, id)? {
            ManifestNode::Leaf { entries } => {
                out.extend(entries.into_iter().map(|e| (e.id, e.hash)));
            }
            ManifestNode::Branch { children, .. } => {
                for child in &children {
                    self.collect_entries(&child.id, out)?;
                }
            }
        }
        Ok(())
    }

    /// Write the canonical subtree for `entries` (sorted by id) at `depth`.
    fn build_subtree(
        &self,
        entries: Vec<(EntityId, ObjectId)>,
        depth: usize,
    ) -> SnapshotResult<(ObjectId, u64)> {
        let count = entries.len() as u64;
        if entries.len() <= LEAF_CAPACITY || depth >= MAX_DEPTH {
            let entries = entries
                .into_iter()
                .map(|(id, hash)| ManifestEntry { id, hash })
                .collect();
            return Ok((self.write_node(&ManifestNode::Leaf { entries })?, count));
        }

        let mut groups: BTreeMap<u8, Vec<(EntityId, ObjectId)>> = BTreeMap::new();
        for (id, hash) in entries {
            groups.entry(key_hash(&id)[depth]).or_default().push((id, hash));
        }
        let mut children = Vec::with_capacity(groups.len());
        for (byte, group) in groups {
            let (id, count) = self.build_subtree(group, depth + 1)?;
            children.push(ManifestChild { byte, id, count });
        }
        let root = self.write_node(&ManifestNode::Branch { count, children })?;
        Ok((root, count))
    }

    fn apply_subtree(
        &self,
        node: Option<&ObjectId>,
        changes: Vec<(EntityId, Option<ObjectId>)>,
        depth: usize,
    ) -> SnapshotResult<(ObjectId, u64)> {
        let current = match node {
            Some(id) => load_node(self.store, id)?,
            None => ManifestNode::Leaf {
                entries: Vec::new(),
            },
        };

        match current {
            ManifestNode::Leaf { entries } => {
                let mut map: BTreeMap<EntityId, ObjectId> =
                    entries.into_iter().map(|e| (e.id, e.hash)).collect();
                for (id, change) in changes {
                    match change {
                        Some(hash) => {
                            map.insert(id, hash);
                        }
                        None => {
                            map.remove(&id);
                        }
                    }
                }
                self.build_subtree(map.into_iter().collect(), depth)
            }
            ManifestNode::Branch { children, .. } => {
                let mut groups: BTreeMap<u8, Vec<(EntityId, Option<ObjectId>)>> = BTreeMap::new();
                for (id, change) in changes {
                    groups.entry(key_hash(&id)[depth]).or_default().push((id, change));
                }

                let mut next: BTreeMap<u8, (ObjectId, u64)> = children
                    .into_iter()
                    .map(|c| (c.byte, (c.id, c.count)))
                    .collect();
                for (byte, group) in groups {
                    let existing = next.get(&byte).map(|(id, _)| *id);
                    let (id, count) = self.apply_subtree(existing.as_ref(), group, depth + 1)?;
                    if count == 0 {
                        next.remove(&byte);
                    } else {
                        next.insert(byte, (id, count));
                    }
                }

                let count: u64 = next.values().map(|(_, c)| c).sum();
                if count as usize <= LEAF_CAPACITY {
                    // Collapse back into a single leaf.
                    let mut all = BTreeMap::new();
                    for (id, _) in next.values() {
                        self.collect_entries(id, &mut all)?;
                    }
                    return self.build_subtree(all.into_iter().collect(), depth);
                }

                let children = next
                    .into_iter()
                    .map(|(byte, (id, count))| ManifestChild { byte, id, count })
                    .collect();
                let root = self.write_node(&ManifestNode::Branch { count, children })?;
                Ok((root, count))
            }
        }
    }
}

impl std::fmt::Debug for Manifest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manifest").finish_non_exhaustive()
    }
}
