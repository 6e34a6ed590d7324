//! Persistable form of a staging area.

use serde::{Deserialize, Serialize};

use gvcs_snapshot::Entity;
use gvcs_types::{CommitId, EntityId, ObjectId};

use crate::error::{StagingError, StagingResult};

/// Everything needed to rebuild a [`crate::StagingArea`] in another process.
///
/// Only resolved entities are kept; records and blobs are re-encoded on load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StagingState {
    pub branch: String,
    pub base_commit: CommitId,
    pub base_root: ObjectId,
    pub threshold: usize,
    pub overlay: Vec<StateEntry>,
}

/// One persisted overlay entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StateEntry {
    Upsert(Entity),
    Removed(EntityId),
}

impl StagingState {
    /// Encode with `bincode`.
    pub fn to_bytes(&self) -> StagingResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StagingError::Serialization(e.to_string()))
    }

    /// Decode bytes produced by [`StagingState::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> StagingResult<Self> {
        bincode::deserialize(bytes).map_err(|e| StagingError::Serialization(e.to_string()))
    }
}
