//! A merge waiting for caller-supplied resolutions.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use gvcs_dag::{Commit, CommitGraph};
use gvcs_snapshot::{encode_node, encode_relationship, load_entity, Entity, Manifest};
use gvcs_store::ObjectStore;
use gvcs_types::{Author, CommitId, EntityId, NodeId, ObjectId};

use crate::error::{MergeError, MergeResult};
use crate::types::{ConflictKind, ConflictRecord, Resolution};

/// The reconciled state of a merge that still has conflicts.
///
/// Everything already decided is kept as a change set against the ancestor
/// snapshot. Resolving a conflict moves it into that set and re-runs the
/// referential integrity check, which may surface new dangling-endpoint
/// conflicts.
#[derive(Clone, Debug)]
pub struct ConflictedMerge {
    pub(crate) ours: CommitId,
    pub(crate) theirs: CommitId,
    pub(crate) ancestor: CommitId,
    pub(crate) roots: Roots,
    pub(crate) threshold: usize,
    pub(crate) decided: BTreeMap<EntityId, Option<ObjectId>>,
    pub(crate) conflicts: BTreeMap<EntityId, ConflictRecord>,
}

/// Snapshot roots of the three commits involved.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Roots {
    pub ancestor: ObjectId,
    pub ours: ObjectId,
    pub theirs: ObjectId,
}

impl ConflictedMerge {
    pub fn ours(&self) -> CommitId {
        self.ours
    }

    pub fn theirs(&self) -> CommitId {
        self.theirs
    }

    pub fn ancestor(&self) -> CommitId {
        self.ancestor
    }

    /// Outstanding conflicts, sorted by entity id.
    pub fn conflicts(&self) -> Vec<ConflictRecord> {
        self.conflicts.values().cloned().collect()
    }

    pub fn conflict(&self, id: &EntityId) -> Option<&ConflictRecord> {
        self.conflicts.get(id)
    }

    pub fn is_resolved(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Apply a resolution to one conflict and return what remains.
    pub fn resolve(
        &mut self,
        store: &dyn ObjectStore,
        id: &EntityId,
        resolution: Resolution,
    ) -> MergeResult<Vec<ConflictRecord>> {
        let record = self
            .conflicts
            .get(id)
            .ok_or_else(|| MergeError::NoSuchConflict(id.clone()))?;

        let value = match resolution {
            Resolution::TakeAncestor => record.ancestor,
            Resolution::TakeOurs => record.ours,
            Resolution::TakeTheirs => record.theirs,
            Resolution::Remove => None,
            Resolution::Node(node) => {
                let encoded = encode_node(&node, self.threshold)?;
                if encoded.id != *id {
                    return Err(MergeError::ResolutionMismatch {
                        expected: id.clone(),
                        found: encoded.id,
                    });
                }
                Some(encoded.write(store)?)
            }
            Resolution::Relationship(relationship) => {
                let encoded = encode_relationship(&relationship, self.threshold)?;
                if encoded.id != *id {
                    return Err(MergeError::ResolutionMismatch {
                        expected: id.clone(),
                        found: encoded.id,
                    });
                }
                Some(encoded.write(store)?)
            }
        };

        self.conflicts.remove(id);
        self.decided.insert(id.clone(), value);
        debug!(entity = %id, remaining = self.conflicts.len(), "resolved conflict");
        self.check_integrity(store)?;
        Ok(self.conflicts())
    }

    /// Build the merge commit once every conflict is resolved.
    pub fn finish(
        self,
        store: &dyn ObjectStore,
        graph: &CommitGraph,
        author: Author,
        message: impl Into<String>,
        timestamp_ms: i64,
    ) -> MergeResult<Commit> {
        if !self.conflicts.is_empty() {
            return Err(MergeError::UnresolvedConflicts(self.conflicts.len()));
        }
        let root = Manifest::new(store).apply(&self.roots.ancestor, &self.decided)?;
        let commit = graph.create_commit(
            root,
            vec![self.ours, self.theirs],
            author,
            message,
            timestamp_ms,
        )?;
        info!(
            commit = %commit.id().short_hex(),
            ours = %self.ours.short_hex(),
            theirs = %self.theirs.short_hex(),
            changes = self.decided.len(),
            "created merge commit"
        );
        Ok(commit)
    }

    // ---------------------------------------------------------------
    // Integrity
    // ---------------------------------------------------------------

    /// Record hashes of `id` in the ancestor, ours and theirs snapshots.
    fn sides(
        &self,
        store: &dyn ObjectStore,
        id: &EntityId,
    ) -> MergeResult<(Option<ObjectId>, Option<ObjectId>, Option<ObjectId>)> {
        let manifest = Manifest::new(store);
        Ok((
            manifest.get(&self.roots.ancestor, id)?,
            manifest.get(&self.roots.ours, id)?,
            manifest.get(&self.roots.theirs, id)?,
        ))
    }

    /// Whether `node` is in the merged view. Undecided nodes count as
    /// present until their conflict is resolved.
    fn node_present(&self, store: &dyn ObjectStore, node: &NodeId) -> MergeResult<bool> {
        let key = EntityId::Node(node.clone());
        if let Some(value) = self.decided.get(&key) {
            return Ok(value.is_some());
        }
        if self.conflicts.contains_key(&key) {
            return Ok(true);
        }
        Ok(Manifest::new(store)
            .get(&self.roots.ancestor, &key)?
            .is_some())
    }

    /// Turn every relationship of the merged view that points at an absent
    /// node into a `DanglingEndpoint` conflict.
    pub(crate) fn check_integrity(&mut self, store: &dyn ObjectStore) -> MergeResult<()> {
        let removed_nodes: BTreeSet<&NodeId> = self
            .decided
            .iter()
            .filter(|(_, value)| value.is_none())
            .filter_map(|(id, _)| id.as_node())
            .collect();

        // Decided relationships are always checked. Untouched ancestor
        // relationships can only dangle if some node was removed.
        let mut candidates: Vec<(EntityId, ObjectId)> = self
            .decided
            .iter()
            .filter(|(id, _)| id.as_relationship().is_some())
            .filter_map(|(id, value)| value.map(|hash| (id.clone(), hash)))
            .collect();
        if !removed_nodes.is_empty() {
            for (id, hash) in Manifest::new(store).entries(&self.roots.ancestor)? {
                if id.as_relationship().is_some()
                    && !self.decided.contains_key(&id)
                    && !self.conflicts.contains_key(&id)
                {
                    candidates.push((id, hash));
                }
            }
        }

        let mut dangling = Vec::new();
        for (id, hash) in candidates {
            if let Entity::Relationship(rel) = load_entity(store, &id, &hash)? {
                if !self.node_present(store, &rel.source)? || !self.node_present(store, &rel.target)? {
                    dangling.push(id);
                }
            }
        }

        for id in dangling {
            let (ancestor, ours, theirs) = self.sides(store, &id)?;
            debug!(entity = %id, "relationship endpoint missing from merged view");
            self.decided.remove(&id);
            self.conflicts.insert(
                id.clone(),
                ConflictRecord {
                    id,
                    kind: ConflictKind::DanglingEndpoint,
                    ancestor,
                    ours,
                    theirs,
                },
            );
        }
        Ok(())
    }
}
