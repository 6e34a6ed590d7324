use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid logical id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("invalid entity reference {0:?}: expected node:<id> or rel:<id>")]
    InvalidEntityRef(String),
}
