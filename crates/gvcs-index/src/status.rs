//! Staging status types.
//!
//! These types describe the overlay relative to the base snapshot it was
//! checked out from.

use serde::{Deserialize, Serialize};

use gvcs_types::EntityId;

/// Entities the next commit would add, modify or remove.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingStatus {
    /// Entities absent from the base snapshot.
    pub added: Vec<EntityId>,
    /// Entities present in the base snapshot with different content.
    pub modified: Vec<EntityId>,
    /// Entities present in the base snapshot and removed.
    pub removed: Vec<EntityId>,
}

impl StagingStatus {
    /// Create an empty status.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if there are no changes of any kind.
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Total number of changed entities.
    pub fn total_entries(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }
}
