//! Merge engine for graphvcs.
//!
//! Reconciles two diverging commits against their lowest common ancestor at
//! node and relationship granularity. Anything that cannot be decided
//! automatically becomes a [`ConflictRecord`]; the caller resolves those on
//! a [`ConflictedMerge`] and finishes it into a merge commit.
//!
//! # Key Types
//!
//! - [`MergeEngine`] -- runs a merge and reports a [`MergeOutcome`]
//! - [`MergePolicy`] -- how divergent content of one entity is reconciled
//!   ([`ThreeWayPolicy`], [`AttributeMergePolicy`])
//! - [`ConflictedMerge`] / [`Resolution`] -- manual resolution
//! - [`MergePhase`] -- the state machine a merge runs through

pub mod conflicted;
pub mod engine;
pub mod error;
pub mod policy;
pub mod types;

pub use conflicted::ConflictedMerge;
pub use engine::MergeEngine;
pub use error::{MergeError, MergeResult};
pub use policy::{AttributeMergePolicy, MergePolicy, Side, ThreeWayPolicy};
pub use types::{ConflictKind, ConflictRecord, MergeOutcome, MergePhase, Resolution};
