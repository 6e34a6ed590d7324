//! Error types for the snapshot crate.

use gvcs_types::{NodeId, ObjectId, RelationshipId};

/// Errors that can occur while building, diffing or materializing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Store operation failed (includes `NotFound` and `Corrupt` objects).
    #[error("store error: {0}")]
    Store(#[from] gvcs_store::StoreError),

    /// A manifest or record is well-formed but inconsistent with where it
    /// was found.
    #[error("corrupt snapshot object {id}: {reason}")]
    Corrupt { id: ObjectId, reason: String },

    /// A relationship names an endpoint that is not in the graph.
    #[error("relationship {relationship} references missing node {node}")]
    DanglingEndpoint {
        relationship: RelationshipId,
        node: NodeId,
    },

    /// A materialization backend rejected an entity.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Convenience alias for snapshot results.
pub type SnapshotResult<T> = Result<T, SnapshotError>;
