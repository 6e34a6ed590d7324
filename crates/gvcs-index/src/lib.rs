//! Staging area for graphvcs.
//!
//! Collects proposed node and relationship mutations for one branch
//! checkout, keeps them consistent (no dangling relationships) and seals
//! them into a snapshot and commit.
//!
//! # Key Types
//!
//! - [`StagingArea`] -- copy-on-write overlay over a base snapshot
//! - [`StagedEntry`] -- one pending upsert or removal
//! - [`StagingStatus`] -- added/modified/removed versus the base
//! - [`CommitOptions`] -- force and extra parents for a commit
//! - [`StagingState`] -- `bincode`-persistable overlay
//! - [`SharedStaging`] -- single-writer handle for use across threads

pub mod entry;
pub mod error;
pub mod shared;
pub mod staging;
pub mod state;
pub mod status;

pub use entry::StagedEntry;
pub use error::{StagingError, StagingResult};
pub use shared::SharedStaging;
pub use staging::{CommitOptions, StagingArea};
pub use state::{StagingState, StateEntry};
pub use status::StagingStatus;
