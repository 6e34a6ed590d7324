//! Overlay entries for pending mutations.

use gvcs_snapshot::{EncodedEntity, Entity};
use gvcs_types::ObjectId;

/// One pending change in the staging overlay.
#[derive(Clone, Debug, PartialEq)]
pub enum StagedEntry {
    /// The entity's new content, together with its encoded record and any
    /// spilled attribute blobs. Nothing is written to the store until commit.
    Upsert {
        entity: Entity,
        encoded: EncodedEntity,
    },
    /// The entity is removed from the working view.
    Removed,
}

impl StagedEntry {
    /// The staged entity, unless this entry is a removal.
    pub fn entity(&self) -> Option<&Entity> {
        match self {
            Self::Upsert { entity, .. } => Some(entity),
            Self::Removed => None,
        }
    }

    /// The record hash this entry will put into the manifest; `None` for a
    /// removal.
    pub fn manifest_value(&self) -> Option<ObjectId> {
        match self {
            Self::Upsert { encoded, .. } => Some(encoded.hash()),
            Self::Removed => None,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, Self::Removed)
    }
}
