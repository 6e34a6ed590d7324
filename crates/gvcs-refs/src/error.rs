//! Error types for reference operations.

use gvcs_types::CommitId;
use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The reference was not found.
    #[error("ref not found: {name}")]
    NotFound { name: String },

    /// A reference with this name already exists.
    #[error("ref already exists: {name}")]
    AlreadyExists { name: String },

    /// The branch name is invalid.
    #[error("invalid branch name: {name}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// The target does not descend from the ref's current commit.
    #[error("non-fast-forward update of {name}: {target} does not descend from {current}")]
    NonFastForward {
        name: String,
        current: CommitId,
        target: CommitId,
    },

    /// A compare-and-swap found a different value than expected.
    #[error("ref {name} changed concurrently: expected {expected:?}, found {actual:?}")]
    Stale {
        name: String,
        expected: Option<CommitId>,
        actual: Option<CommitId>,
    },

    /// Another writer holds the ref's lock file.
    #[error("ref {name} is locked by another writer")]
    Locked { name: String },

    /// HEAD has not been set.
    #[error("HEAD is not set")]
    NoHead,

    /// Cannot delete the currently checked-out branch.
    #[error("cannot delete current branch: {name}")]
    DeleteCurrentBranch { name: String },

    /// Commit graph lookup failed.
    #[error("commit graph error: {0}")]
    Dag(#[from] gvcs_dag::DagError),

    /// Malformed ref or HEAD contents.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error during file-based ref operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
