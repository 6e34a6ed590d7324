//! Foundation types for graphvcs.
//!
//! This crate provides the identifier types used throughout the versioned
//! graph core. Every other graphvcs crate depends on `gvcs-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Content-addressed identifier (BLAKE3 hash)
//! - [`CommitId`] -- Hash of a commit's serialized fields
//! - [`NodeId`] / [`RelationshipId`] -- Stable logical identifiers of graph entities
//! - [`EntityId`] -- Either of the above; the key of a snapshot manifest
//! - [`Author`] -- Caller-supplied commit attribution

pub mod author;
pub mod entity;
pub mod error;
pub mod object;

pub use author::Author;
pub use entity::{EntityId, EntityKind, NodeId, RelationshipId};
pub use error::TypeError;
pub use object::{CommitId, ObjectId};
