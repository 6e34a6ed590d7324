//! Content-addressed object storage for graphvcs.
//!
//! This crate implements a hash-keyed object store analogous to git's
//! `.git/objects/` directory. Every graph fragment -- node records,
//! relationship records, spilled attribute values, manifest trie nodes -- is
//! stored as an immutable object identified by its BLAKE3 hash
//! (domain-separated by content kind).
//!
//! # Object Kinds
//!
//! - [`NodeRecord`] -- a node's labels and attributes
//! - [`RelationshipRecord`] -- a typed edge between two node ids
//! - [`AttributeBlob`] -- an attribute value too large to inline
//! - tree manifests -- written by `gvcs-snapshot`
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsObjectStore`] -- loose object files, optionally zstd-compressed
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. There is no update and no delete.
//! 3. `put` is idempotent; identical content is stored once.
//! 4. `get` re-hashes what it read and reports `Corrupt` on mismatch.
//! 5. No in-memory lock is held across backend I/O.

pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod record;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{ContentKind, ContentObject};
pub use record::{Attribute, AttributeBlob, GraphRecord, NodeRecord, RelationshipRecord, Value};
pub use traits::ObjectStore;
