//! Logical identifiers for graph entities.
//!
//! A node or relationship keeps the same logical id across every version of
//! the graph; only its content hash changes. Ids are plain strings so that
//! callers can reuse identifiers from the domain they model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum length of a logical id, in bytes.
pub const MAX_ID_LEN: usize = 256;

fn validate_logical_id(id: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidId {
        id: id.to_string(),
        reason: reason.to_string(),
    };
    if id.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if id.len() > MAX_ID_LEN {
        return Err(invalid("longer than 256 bytes"));
    }
    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("must not contain whitespace or control characters"));
    }
    Ok(())
}

macro_rules! logical_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a logical id.
            pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
                let id = id.into();
                validate_logical_id(&id)?;
                Ok(Self(id))
            }

            /// Generate a fresh, time-ordered id (UUID v7).
            pub fn generate() -> Self {
                Self(uuid::Uuid::now_v7().to_string())
            }

            /// The id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

logical_id!(
    /// Stable logical identifier of a node.
    NodeId
);

logical_id!(
    /// Stable logical identifier of a relationship.
    RelationshipId
);

/// The two kinds of versioned graph entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Node,
    Relationship,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::Relationship => write!(f, "rel"),
        }
    }
}

/// Key of a snapshot manifest: a node id or a relationship id.
///
/// Ordering places all nodes before all relationships, each group sorted by
/// id. The textual form is `node:<id>` or `rel:<id>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntityId {
    Node(NodeId),
    Relationship(RelationshipId),
}

impl EntityId {
    /// Which kind of entity this id names.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Node(_) => EntityKind::Node,
            Self::Relationship(_) => EntityKind::Relationship,
        }
    }

    /// The bare logical id, without the kind prefix.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Node(id) => id.as_str(),
            Self::Relationship(id) => id.as_str(),
        }
    }

    /// Returns the node id if this names a node.
    pub fn as_node(&self) -> Option<&NodeId> {
        match self {
            Self::Node(id) => Some(id),
            Self::Relationship(_) => None,
        }
    }

    /// Returns the relationship id if this names a relationship.
    pub fn as_relationship(&self) -> Option<&RelationshipId> {
        match self {
            Self::Node(_) => None,
            Self::Relationship(id) => Some(id),
        }
    }

    /// Stable byte encoding used for manifest placement.
    pub fn key_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl From<NodeId> for EntityId {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<RelationshipId> for EntityId {
    fn from(id: RelationshipId) -> Self {
        Self::Relationship(id)
    }
}

impl FromStr for EntityId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("node:") {
            Ok(Self::Node(NodeId::new(id)?))
        } else if let Some(id) = s.strip_prefix("rel:") {
            Ok(Self::Relationship(RelationshipId::new(id)?))
        } else {
            Err(TypeError::InvalidEntityRef(s.to_string()))
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({self})")
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.as_str())
    }
}
