//! Snapshot model for graphvcs.
//!
//! A snapshot is one complete graph state: a Merkle manifest mapping every
//! node and relationship id to the hash of its record in the object store.
//!
//! # Key Types
//!
//! - [`Manifest`] -- build, update and query canonical manifest tries
//! - [`SnapshotDiff`] / [`EntityChange`] -- structural diff between two roots
//! - [`Graph`] / [`Node`] / [`Relationship`] -- resolved in-memory graph
//! - [`GraphBackend`] -- pluggable materialization target
//! - [`EncodedEntity`] -- an entity encoded as records, not yet stored

pub mod diff;
pub mod encode;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod materialize;

pub use diff::{diff, ChangeKind, EntityChange, SnapshotDiff};
pub use encode::{
    decode_entity, encode_entity, encode_node, encode_relationship, load_entity, EncodedEntity,
    DEFAULT_INLINE_THRESHOLD,
};
pub use error::{SnapshotError, SnapshotResult};
pub use graph::{Entity, Graph, GraphBackend, Node, Relationship};
pub use manifest::{Manifest, ManifestNode, LEAF_CAPACITY};
pub use materialize::{materialize, materialize_into};
