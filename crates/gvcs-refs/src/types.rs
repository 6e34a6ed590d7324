//! Core reference types.

use serde::{Deserialize, Serialize};

use gvcs_types::CommitId;

/// How a branch move treats history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveMode {
    /// The target must descend from the branch's current commit.
    FastForward,
    /// Move unconditionally. Used for rollback; no commit is deleted.
    Force,
}

/// Summary information about a branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// Short branch name (e.g. "main", "feature/schema").
    pub name: String,
    /// Commit at the branch tip.
    pub commit: CommitId,
    /// Whether HEAD names this branch.
    pub is_current: bool,
}
