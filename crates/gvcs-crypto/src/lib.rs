//! Cryptographic primitives for graphvcs.
//!
//! Provides domain-separated BLAKE3 hashing. Every content kind (node record,
//! relationship record, attribute blob, manifest, commit) hashes under its own
//! domain tag so that identical bytes of different kinds never collide.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;

pub use hasher::{ContentHasher, HasherError};
