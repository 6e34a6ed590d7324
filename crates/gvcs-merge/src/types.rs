//! Merge outcome, phase and conflict types.

use serde::{Deserialize, Serialize};

use gvcs_dag::Commit;
use gvcs_snapshot::{Node, Relationship};
use gvcs_types::{CommitId, EntityId, ObjectId};

use crate::conflicted::ConflictedMerge;

/// Progress of one merge operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MergePhase {
    Initiated,
    AncestorResolved,
    Diffing,
    Reconciling,
    Clean,
    Conflicted,
}

impl std::fmt::Display for MergePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initiated => "initiated",
            Self::AncestorResolved => "ancestor-resolved",
            Self::Diffing => "diffing",
            Self::Reconciling => "reconciling",
            Self::Clean => "clean",
            Self::Conflicted => "conflicted",
        };
        f.write_str(name)
    }
}

/// Why an entity could not be merged automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    /// Both sides changed the entity to different content.
    ModifyModify,
    /// Both sides created the entity with different content.
    AddAdd,
    /// Ours removed the entity, theirs modified it.
    DeleteModify,
    /// Ours modified the entity, theirs removed it.
    ModifyDelete,
    /// A relationship in the merged view points at a node that is gone.
    DanglingEndpoint,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ModifyModify => "modify/modify",
            Self::AddAdd => "add/add",
            Self::DeleteModify => "delete/modify",
            Self::ModifyDelete => "modify/delete",
            Self::DanglingEndpoint => "dangling endpoint",
        };
        f.write_str(name)
    }
}

/// One entity that needs a caller-supplied resolution, with its record hash
/// in each of the three snapshots (`None` where absent).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub id: EntityId,
    pub kind: ConflictKind,
    pub ancestor: Option<ObjectId>,
    pub ours: Option<ObjectId>,
    pub theirs: Option<ObjectId>,
}

/// A caller's decision for one conflicted entity.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    TakeAncestor,
    TakeOurs,
    TakeTheirs,
    /// Drop the entity from the merged snapshot.
    Remove,
    /// Replace the entity with new node content.
    Node(Node),
    /// Replace the entity with new relationship content.
    Relationship(Relationship),
}

/// Result of [`crate::MergeEngine::merge`].
#[derive(Debug)]
pub enum MergeOutcome {
    /// Theirs is already contained in ours; nothing to do.
    UpToDate(CommitId),
    /// Ours is an ancestor of theirs; the branch can simply move to this
    /// commit.
    FastForward(CommitId),
    /// The merge commit, with parents `[ours, theirs]`.
    Clean(Commit),
    /// Conflicts remain; no commit was created.
    Conflicted(ConflictedMerge),
}

impl MergeOutcome {
    /// The phase the merge ended in.
    pub fn phase(&self) -> MergePhase {
        match self {
            Self::Conflicted(_) => MergePhase::Conflicted,
            _ => MergePhase::Clean,
        }
    }

    pub fn is_conflicted(&self) -> bool {
        matches!(self, Self::Conflicted(_))
    }
}
