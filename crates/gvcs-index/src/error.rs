//! Error types for the staging crate.

use gvcs_types::{EntityId, NodeId, RelationshipId};

/// Errors that can occur during staging operations.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// A relationship would point at a node that is not in the working view.
    #[error("dangling reference: relationship {relationship} needs node {node}")]
    DanglingReference {
        relationship: RelationshipId,
        node: NodeId,
    },

    /// The entity is not present in the working view.
    #[error("entity not found in working view: {0}")]
    NotFound(EntityId),

    /// Nothing is staged and the commit was not forced.
    #[error("nothing to commit")]
    EmptyCommit,

    /// Another writer is editing this staging area.
    #[error("staging area is being edited by another writer")]
    StagingBusy,

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] gvcs_store::StoreError),

    /// Manifest or record handling failed.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] gvcs_snapshot::SnapshotError),

    /// Commit creation failed.
    #[error("commit graph error: {0}")]
    Dag(#[from] gvcs_dag::DagError),

    /// Persisted staging state could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for staging results.
pub type StagingResult<T> = Result<T, StagingError>;
