//! Error types for the merge crate.

use gvcs_types::{CommitId, EntityId};

/// Errors that can occur during a merge.
///
/// A merge that ends with conflicts is not an error; it is reported as
/// [`crate::MergeOutcome::Conflicted`].
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The two commits share no history.
    #[error("unrelated histories: {ours} and {theirs} have no common ancestor")]
    Unrelated { ours: CommitId, theirs: CommitId },

    /// A merge commit was requested while conflicts remain.
    #[error("{0} unresolved conflict(s)")]
    UnresolvedConflicts(usize),

    /// A resolution named an entity that is not in conflict.
    #[error("no conflict recorded for {0}")]
    NoSuchConflict(EntityId),

    /// A resolution supplied content for a different entity.
    #[error("resolution for {expected} carries content for {found}")]
    ResolutionMismatch { expected: EntityId, found: EntityId },

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] gvcs_store::StoreError),

    /// Manifest, diff or record handling failed.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] gvcs_snapshot::SnapshotError),

    /// Commit graph lookup or commit creation failed.
    #[error("commit graph error: {0}")]
    Dag(#[from] gvcs_dag::DagError),
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
