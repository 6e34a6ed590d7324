//! The staging area: pending graph mutations scoped to one branch checkout.
//!
//! A [`StagingArea`] is a copy-on-write overlay over the snapshot of the
//! commit it was checked out from. Reads consult the overlay first and fall
//! back to the base manifest; nothing reaches the object store until
//! [`StagingArea::commit`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info};

use gvcs_dag::{Commit, CommitGraph};
use gvcs_snapshot::{encode_entity, load_entity, Entity, Manifest, Node, Relationship};
use gvcs_store::ObjectStore;
use gvcs_types::{Author, CommitId, EntityId, NodeId, ObjectId, RelationshipId};

use crate::entry::StagedEntry;
use crate::error::{StagingError, StagingResult};
use crate::state::{StagingState, StateEntry};
use crate::status::StagingStatus;

/// Options for [`StagingArea::commit`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Commit even when nothing is staged.
    pub force: bool,
    /// Parents after the base commit (a merge passes the other tip here).
    pub extra_parents: Vec<CommitId>,
    /// Commit timestamp; defaults to the current time.
    pub timestamp_ms: Option<i64>,
}

impl CommitOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }
}

/// Pending mutations on top of a base commit.
pub struct StagingArea {
    store: Arc<dyn ObjectStore>,
    branch: String,
    base_commit: CommitId,
    base_root: ObjectId,
    threshold: usize,
    /// Only entries that differ from the base snapshot are kept.
    overlay: BTreeMap<EntityId, StagedEntry>,
    /// Base relationships by endpoint, built on first removal of a node.
    incidence: Option<BTreeMap<NodeId, BTreeSet<RelationshipId>>>,
}

impl std::fmt::Debug for StagingArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingArea")
            .field("branch", &self.branch)
            .field("base_commit", &self.base_commit)
            .field("base_root", &self.base_root)
            .field("staged", &self.overlay.len())
            .finish()
    }
}

impl StagingArea {
    /// Start an empty overlay on `base_commit`, whose snapshot is `base_root`.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        branch: impl Into<String>,
        base_commit: CommitId,
        base_root: ObjectId,
        threshold: usize,
    ) -> Self {
        Self {
            store,
            branch: branch.into(),
            base_commit,
            base_root,
            threshold,
            overlay: BTreeMap::new(),
            incidence: None,
        }
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn base_commit(&self) -> CommitId {
        self.base_commit
    }

    pub fn base_root(&self) -> ObjectId {
        self.base_root
    }

    /// Encoded size above which attribute values are spilled to blobs.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Returns `true` if nothing differs from the base snapshot.
    pub fn is_clean(&self) -> bool {
        self.overlay.is_empty()
    }

    /// The raw overlay, in entity order.
    pub fn staged(&self) -> impl Iterator<Item = (&EntityId, &StagedEntry)> {
        self.overlay.iter()
    }

    // ---------------------------------------------------------------
    // Working view reads
    // ---------------------------------------------------------------

    fn manifest(&self) -> Manifest<'_> {
        Manifest::new(self.store.as_ref())
    }

    fn base_hash(&self, id: &EntityId) -> StagingResult<Option<ObjectId>> {
        Ok(self.manifest().get(&self.base_root, id)?)
    }

    /// Whether `id` is present in the working view.
    pub fn contains(&self, id: &EntityId) -> StagingResult<bool> {
        match self.overlay.get(id) {
            Some(entry) => Ok(!entry.is_removal()),
            None => Ok(self.base_hash(id)?.is_some()),
        }
    }

    /// The working-view content of `id`.
    pub fn get(&self, id: &EntityId) -> StagingResult<Option<Entity>> {
        if let Some(entry) = self.overlay.get(id) {
            return Ok(entry.entity().cloned());
        }
        match self.base_hash(id)? {
            Some(hash) => Ok(Some(load_entity(self.store.as_ref(), id, &hash)?)),
            None => Ok(None),
        }
    }

    pub fn get_node(&self, id: &NodeId) -> StagingResult<Option<Node>> {
        Ok(match self.get(&EntityId::Node(id.clone()))? {
            Some(Entity::Node(node)) => Some(node),
            _ => None,
        })
    }

    pub fn get_relationship(&self, id: &RelationshipId) -> StagingResult<Option<Relationship>> {
        Ok(match self.get(&EntityId::Relationship(id.clone()))? {
            Some(Entity::Relationship(rel)) => Some(rel),
            _ => None,
        })
    }

    /// Added, modified and removed entities versus the base snapshot.
    pub fn changes(&self) -> StagingResult<StagingStatus> {
        let mut status = StagingStatus::new();
        for (id, entry) in &self.overlay {
            match (entry.manifest_value(), self.base_hash(id)?) {
                (Some(_), None) => status.added.push(id.clone()),
                (Some(new), Some(old)) if new != old => status.modified.push(id.clone()),
                (None, Some(_)) => status.removed.push(id.clone()),
                _ => {}
            }
        }
        Ok(status)
    }

    // ---------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------

    fn stage(&mut self, entity: Entity) -> StagingResult<()> {
        let encoded = encode_entity(&entity, self.threshold)?;
        let id = encoded.id.clone();
        if self.base_hash(&id)? == Some(encoded.hash()) {
            // Back to the base content: nothing left to commit for this id.
            self.overlay.remove(&id);
        } else {
            self.overlay
                .insert(id.clone(), StagedEntry::Upsert { entity, encoded });
        }
        debug!(branch = %self.branch, entity = %id, "staged upsert");
        Ok(())
    }

    /// Stage a node, replacing any earlier content under its id.
    pub fn add_or_update_node(&mut self, node: Node) -> StagingResult<()> {
        self.stage(Entity::Node(node))
    }

    /// Stage a relationship. Both endpoints must be in the working view.
    pub fn add_or_update_relationship(&mut self, relationship: Relationship) -> StagingResult<()> {
        for endpoint in [&relationship.source, &relationship.target] {
            if !self.contains(&EntityId::Node(endpoint.clone()))? {
                return Err(StagingError::DanglingReference {
                    relationship: relationship.id.clone(),
                    node: endpoint.clone(),
                });
            }
        }
        self.stage(Entity::Relationship(relationship))
    }

    /// Remove an entity from the working view.
    ///
    /// A node that is still an endpoint of a live relationship cannot be
    /// removed; use [`StagingArea::remove_node_detached`] to drop it together
    /// with its relationships.
    pub fn remove(&mut self, id: &EntityId) -> StagingResult<()> {
        if !self.contains(id)? {
            return Err(StagingError::NotFound(id.clone()));
        }
        if let EntityId::Node(node) = id {
            if let Some(relationship) = self.live_relationships(node)?.into_iter().next() {
                return Err(StagingError::DanglingReference {
                    relationship,
                    node: node.clone(),
                });
            }
        }
        let in_base = self.base_hash(id)?.is_some();
        self.mark_removed(id.clone(), in_base);
        debug!(branch = %self.branch, entity = %id, "staged removal");
        Ok(())
    }

    /// Remove a node and every live relationship touching it. Returns the
    /// removed relationships.
    pub fn remove_node_detached(&mut self, node: &NodeId) -> StagingResult<Vec<RelationshipId>> {
        let node_key = EntityId::Node(node.clone());
        if !self.contains(&node_key)? {
            return Err(StagingError::NotFound(node_key));
        }
        let relationships = self.live_relationships(node)?;

        // Resolve everything before touching the overlay.
        let mut removals = Vec::with_capacity(relationships.len() + 1);
        for rel in &relationships {
            let key = EntityId::Relationship(rel.clone());
            let in_base = self.base_hash(&key)?.is_some();
            removals.push((key, in_base));
        }
        let in_base = self.base_hash(&node_key)?.is_some();
        removals.push((node_key, in_base));

        for (key, in_base) in removals {
            self.mark_removed(key, in_base);
        }
        debug!(
            branch = %self.branch,
            node = %node,
            relationships = relationships.len(),
            "staged detached removal"
        );
        Ok(relationships)
    }

    fn mark_removed(&mut self, id: EntityId, in_base: bool) {
        if in_base {
            self.overlay.insert(id, StagedEntry::Removed);
        } else {
            self.overlay.remove(&id);
        }
    }

    fn ensure_incidence(&mut self) -> StagingResult<()> {
        if self.incidence.is_some() {
            return Ok(());
        }
        let mut incidence: BTreeMap<NodeId, BTreeSet<RelationshipId>> = BTreeMap::new();
        for (id, hash) in self.manifest().entries(&self.base_root)? {
            if id.as_relationship().is_none() {
                continue;
            }
            if let Entity::Relationship(rel) = load_entity(self.store.as_ref(), &id, &hash)? {
                incidence
                    .entry(rel.source.clone())
                    .or_default()
                    .insert(rel.id.clone());
                incidence.entry(rel.target).or_default().insert(rel.id);
            }
        }
        self.incidence = Some(incidence);
        Ok(())
    }

    /// Relationships in the working view with `node` as an endpoint.
    fn live_relationships(&mut self, node: &NodeId) -> StagingResult<Vec<RelationshipId>> {
        self.ensure_incidence()?;
        let mut live = BTreeSet::new();
        if let Some(ids) = self.incidence.as_ref().and_then(|m| m.get(node)) {
            for rel in ids {
                if !self
                    .overlay
                    .contains_key(&EntityId::Relationship(rel.clone()))
                {
                    live.insert(rel.clone());
                }
            }
        }
        for entry in self.overlay.values() {
            if let Some(Entity::Relationship(rel)) = entry.entity() {
                if rel.touches(node) {
                    live.insert(rel.id.clone());
                }
            }
        }
        Ok(live.into_iter().collect())
    }

    /// The overlay as it stands, for [`StagingArea::restore`].
    pub(crate) fn checkpoint(&self) -> BTreeMap<EntityId, StagedEntry> {
        self.overlay.clone()
    }

    pub(crate) fn restore(&mut self, overlay: BTreeMap<EntityId, StagedEntry>) {
        self.overlay = overlay;
    }

    /// Drop every pending change. The store and commit graph are untouched.
    pub fn discard(&mut self) {
        debug!(branch = %self.branch, dropped = self.overlay.len(), "discarded staging area");
        self.overlay.clear();
    }

    // ---------------------------------------------------------------
    // Commit
    // ---------------------------------------------------------------

    /// Write the staged records and a commit for them, without changing
    /// this staging area.
    ///
    /// Callers that must publish the commit before rebasing the overlay
    /// (advancing a branch ref, say) call this and then
    /// [`StagingArea::reset_to`].
    pub fn write_commit(
        &self,
        graph: &CommitGraph,
        author: Author,
        message: impl Into<String>,
        options: &CommitOptions,
    ) -> StagingResult<Commit> {
        if self.is_clean() && !options.force {
            return Err(StagingError::EmptyCommit);
        }

        let mut changes = BTreeMap::new();
        for (id, entry) in &self.overlay {
            let value = match entry {
                StagedEntry::Upsert { encoded, .. } => Some(encoded.write(self.store.as_ref())?),
                StagedEntry::Removed => None,
            };
            changes.insert(id.clone(), value);
        }
        let root = self.manifest().apply(&self.base_root, &changes)?;

        let mut parents = vec![self.base_commit];
        parents.extend(options.extra_parents.iter().copied());
        let timestamp_ms = options
            .timestamp_ms
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
        let commit = graph.create_commit(root, parents, author, message, timestamp_ms)?;
        info!(
            branch = %self.branch,
            commit = %commit.id().short_hex(),
            changes = changes.len(),
            "committed staged changes"
        );
        Ok(commit)
    }

    /// Rebase onto `commit` with an empty overlay.
    pub fn reset_to(&mut self, commit: &Commit) {
        self.base_commit = commit.id();
        self.base_root = *commit.snapshot();
        self.overlay.clear();
        self.incidence = None;
    }

    /// Commit the staged changes on top of the base commit and reset onto
    /// the new commit.
    ///
    /// Fails with `EmptyCommit` when nothing is staged unless
    /// `options.force` is set.
    pub fn commit(
        &mut self,
        graph: &CommitGraph,
        author: Author,
        message: impl Into<String>,
        options: CommitOptions,
    ) -> StagingResult<Commit> {
        let commit = self.write_commit(graph, author, message, &options)?;
        self.reset_to(&commit);
        Ok(commit)
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Capture the overlay for persistence.
    pub fn to_state(&self) -> StagingState {
        StagingState {
            branch: self.branch.clone(),
            base_commit: self.base_commit,
            base_root: self.base_root,
            threshold: self.threshold,
            overlay: self
                .overlay
                .iter()
                .map(|(id, entry)| match entry {
                    StagedEntry::Upsert { entity, .. } => StateEntry::Upsert(entity.clone()),
                    StagedEntry::Removed => StateEntry::Removed(id.clone()),
                })
                .collect(),
        }
    }

    /// Rebuild a staging area from persisted state. Records are re-encoded,
    /// which yields the same hashes as before.
    pub fn from_state(store: Arc<dyn ObjectStore>, state: StagingState) -> StagingResult<Self> {
        let mut area = Self::new(
            store,
            state.branch,
            state.base_commit,
            state.base_root,
            state.threshold,
        );
        for entry in state.overlay {
            match entry {
                StateEntry::Upsert(entity) => area.stage(entity)?,
                StateEntry::Removed(id) => {
                    let in_base = area.base_hash(&id)?.is_some();
                    area.mark_removed(id, in_base);
                }
            }
        }
        Ok(area)
    }
}
