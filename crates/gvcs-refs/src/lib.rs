//! Branch and ref management for graphvcs.
//!
//! Branches are named, movable pointers to commits, stored under
//! `refs/heads/<name>`. `HEAD` names the checked-out branch. Every update
//! goes through a compare-and-swap on the ref so that two writers racing on
//! the same branch cannot both win.
//!
//! # Modules
//!
//! - [`error`]: error types for ref operations
//! - [`types`]: [`MoveMode`] and [`BranchInfo`]
//! - [`traits`]: the [`RefStore`] storage interface
//! - [`names`]: branch name validation
//! - [`memory`]: in-memory [`InMemoryRefStore`]
//! - [`fs`]: lock-file based [`FsRefStore`]
//! - [`branch`]: [`BranchManager`], the branch operations

pub mod branch;
pub mod error;
pub mod fs;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use branch::BranchManager;
pub use error::{RefError, Result};
pub use fs::FsRefStore;
pub use memory::InMemoryRefStore;
pub use names::{branch_name, branch_ref, validate_branch_name, HEADS_PREFIX};
pub use traits::RefStore;
pub use types::{BranchInfo, MoveMode};
