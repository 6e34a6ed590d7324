//! Error types for the commit graph.

use gvcs_types::CommitId;

/// Errors that can occur during commit graph operations.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// A referenced commit does not exist.
    #[error("commit not found: {0}")]
    NotFound(CommitId),

    /// A new commit names a parent that does not exist.
    #[error("parent commit {0} does not exist")]
    MissingParent(CommitId),

    /// More than two parents were supplied.
    #[error("a commit has at most 2 parents, got {0}")]
    TooManyParents(usize),

    /// The same parent was listed twice.
    #[error("duplicate parent {0}")]
    DuplicateParent(CommitId),

    /// A stored commit does not hash to the id it is filed under.
    #[error("corrupt commit {id}: {reason}")]
    Corrupt { id: CommitId, reason: String },

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Storage I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for DAG results.
pub type DagResult<T> = Result<T, DagError>;
