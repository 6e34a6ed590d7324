//! Materialization: the only outward read path of a snapshot.

use gvcs_store::ObjectStore;
use gvcs_types::ObjectId;

use crate::encode::load_entity;
use crate::error::SnapshotResult;
use crate::graph::{Entity, Graph, GraphBackend};
use crate::manifest::Manifest;

/// Stream every entity of the snapshot rooted at `root` into `backend`.
///
/// The backend is reset first. Nodes are delivered before relationships.
pub fn materialize_into(
    store: &dyn ObjectStore,
    root: &ObjectId,
    backend: &mut dyn GraphBackend,
) -> SnapshotResult<()> {
    let entries = Manifest::new(store).entries(root)?;
    backend.reset()?;
    // EntityId ordering places every node before every relationship.
    for (id, hash) in &entries {
        match load_entity(store, id, hash)? {
            Entity::Node(node) => backend.put_node(node)?,
            Entity::Relationship(rel) => backend.put_relationship(rel)?,
        }
    }
    tracing::debug!(root = %root.short_hex(), entities = entries.len(), "materialized snapshot");
    Ok(())
}

/// Materialize a snapshot into an in-memory [`Graph`].
pub fn materialize(store: &dyn ObjectStore, root: &ObjectId) -> SnapshotResult<Graph> {
    let mut graph = Graph::new();
    materialize_into(store, root, &mut graph)?;
    Ok(graph)
}
