use serde::{Deserialize, Serialize};

use gvcs_crypto::ContentHasher;
use gvcs_types::{Author, CommitId, ObjectId};

use crate::error::{DagError, DagResult};

/// The hashed fields of a commit.
///
/// Field order is part of the canonical encoding and therefore of every
/// commit id; do not reorder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitContent {
    /// Root of the snapshot manifest.
    pub snapshot: ObjectId,
    /// Parent commits: none for a root, one normally, two for a merge.
    pub parents: Vec<CommitId>,
    pub author: Author,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub message: String,
}

/// An immutable, sealed commit.
///
/// The id is computed from the content when sealing and the content cannot
/// be changed afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    id: CommitId,
    content: CommitContent,
}

impl Commit {
    /// Compute the id of `content` and seal it.
    pub fn seal(content: CommitContent) -> DagResult<Self> {
        let id = ContentHasher::COMMIT
            .hash_json(&content)
            .map_err(|e| DagError::Serialization(e.to_string()))?;
        Ok(Self {
            id: CommitId::from_object_id(id),
            content,
        })
    }

    pub fn id(&self) -> CommitId {
        self.id
    }

    pub fn content(&self) -> &CommitContent {
        &self.content
    }

    pub fn snapshot(&self) -> &ObjectId {
        &self.content.snapshot
    }

    pub fn parents(&self) -> &[CommitId] {
        &self.content.parents
    }

    pub fn author(&self) -> &Author {
        &self.content.author
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.content.timestamp_ms
    }

    pub fn message(&self) -> &str {
        &self.content.message
    }

    /// Returns `true` if this commit has no parents.
    pub fn is_root(&self) -> bool {
        self.content.parents.is_empty()
    }

    /// Returns `true` if this commit joins two lines of history.
    pub fn is_merge(&self) -> bool {
        self.content.parents.len() > 1
    }

    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.content.message.lines().next().unwrap_or("")
    }

    /// Canonical JSON encoding, as written by the filesystem store.
    pub fn to_json(&self) -> DagResult<Vec<u8>> {
        serde_json::to_vec_pretty(&self.content).map_err(|e| DagError::Serialization(e.to_string()))
    }

    /// Decode commit content read under `expected` and verify its id.
    pub fn from_json(expected: &CommitId, bytes: &[u8]) -> DagResult<Self> {
        let content: CommitContent =
            serde_json::from_slice(bytes).map_err(|e| DagError::Corrupt {
                id: *expected,
                reason: format!("undecodable commit: {e}"),
            })?;
        let commit = Self::seal(content)?;
        if commit.id != *expected {
            return Err(DagError::Corrupt {
                id: *expected,
                reason: format!("content hashes to {}", commit.id.short_hex()),
            });
        }
        Ok(commit)
    }
}
