//! High-level SDK for graphvcs.
//!
//! [`Repository`] is the main entry point for applications embedding
//! graphvcs: it opens or creates the object store, commit graph and refs,
//! and exposes staging, committing, branching and merging over them.

pub mod config;
pub mod error;
pub mod repository;
pub mod telemetry;

pub use config::{Profile, RepoConfig, UserConfig, ENV_PREFIX};
pub use error::{SdkError, SdkResult};
pub use repository::{Repository, MIN_PREFIX_LEN};

// Re-export key types
pub use gvcs_dag::Commit;
pub use gvcs_index::{CommitOptions, StagingArea, StagingStatus};
pub use gvcs_merge::{
    AttributeMergePolicy, ConflictKind, ConflictRecord, ConflictedMerge, MergeOutcome,
    MergePolicy, Resolution, Side, ThreeWayPolicy,
};
pub use gvcs_refs::{BranchInfo, MoveMode};
pub use gvcs_snapshot::{ChangeKind, Entity, Graph, GraphBackend, Node, Relationship, SnapshotDiff};
pub use gvcs_store::Value;
pub use gvcs_types::{Author, CommitId, EntityId, NodeId, ObjectId, RelationshipId};
