use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("repository not initialized at {0}")]
    NotInitialized(String),

    #[error("repository already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("unknown revision: {0}")]
    UnknownRevision(String),

    #[error("ambiguous revision {rev}: matches {matches} commits")]
    AmbiguousRevision { rev: String, matches: usize },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] gvcs_store::StoreError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] gvcs_snapshot::SnapshotError),

    #[error("commit graph error: {0}")]
    Dag(#[from] gvcs_dag::DagError),

    #[error("ref error: {0}")]
    Ref(#[from] gvcs_refs::RefError),

    #[error("staging error: {0}")]
    Staging(#[from] gvcs_index::StagingError),

    #[error("merge error: {0}")]
    Merge(#[from] gvcs_merge::MergeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdkError {
    /// Whether this is a refused non-fast-forward branch update.
    pub fn is_non_fast_forward(&self) -> bool {
        matches!(self, Self::Ref(gvcs_refs::RefError::NonFastForward { .. }))
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
