//! Commit graph for graphvcs.
//!
//! An append-only DAG of immutable commits. Each commit references one
//! snapshot root and up to two parents by hash, so the history itself forms
//! a Merkle DAG: changing any past commit would change every id after it.
//!
//! # Key Types
//!
//! - [`Commit`] / [`CommitContent`] -- a sealed commit and its hashed fields
//! - [`CommitStore`] -- commit table ([`InMemoryCommitStore`], [`FsCommitStore`])
//! - [`CommitGraph`] -- creation plus ancestry queries (`is_ancestor`,
//!   `lowest_common_ancestor`, `log`)

pub mod commit;
pub mod error;
pub mod fs;
pub mod graph;
pub mod store;

pub use commit::{Commit, CommitContent};
pub use error::{DagError, DagResult};
pub use fs::FsCommitStore;
pub use graph::{CommitGraph, MAX_PARENTS};
pub use store::{CommitStore, InMemoryCommitStore};
