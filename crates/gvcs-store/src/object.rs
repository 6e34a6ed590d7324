use serde::{Deserialize, Serialize};

use gvcs_crypto::ContentHasher;
use gvcs_types::ObjectId;

/// The kind of content stored in an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    /// A node's labels and attributes.
    NodeRecord,
    /// A relationship's endpoints, type and attributes.
    RelationshipRecord,
    /// A single attribute value stored out of line.
    AttributeBlob,
    /// A node of a snapshot manifest trie.
    TreeManifest,
}

impl ContentKind {
    /// One-byte tag used by on-disk encodings.
    pub fn tag(&self) -> u8 {
        match self {
            Self::NodeRecord => 1,
            Self::RelationshipRecord => 2,
            Self::AttributeBlob => 3,
            Self::TreeManifest => 4,
        }
    }

    /// Parse a one-byte tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::NodeRecord),
            2 => Some(Self::RelationshipRecord),
            3 => Some(Self::AttributeBlob),
            4 => Some(Self::TreeManifest),
            _ => None,
        }
    }

    fn hasher(&self) -> &'static ContentHasher {
        match self {
            Self::NodeRecord => &ContentHasher::NODE,
            Self::RelationshipRecord => &ContentHasher::RELATIONSHIP,
            Self::AttributeBlob => &ContentHasher::ATTRIBUTE,
            Self::TreeManifest => &ContentHasher::MANIFEST,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeRecord => write!(f, "node"),
            Self::RelationshipRecord => write!(f, "relationship"),
            Self::AttributeBlob => write!(f, "attribute"),
            Self::TreeManifest => write!(f, "manifest"),
        }
    }
}

/// A stored object: kind tag plus opaque payload.
///
/// `ContentObject` is the unit of storage. The store never interprets the
/// payload; it is a pure key-value store keyed by content hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentObject {
    /// The type of this object.
    pub kind: ContentKind,
    /// The serialized bytes of the object.
    pub data: Vec<u8>,
}

impl ContentObject {
    /// Create a new object from kind and payload.
    pub fn new(kind: ContentKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Compute the content-addressed ID for this object.
    ///
    /// The hash covers both the kind (through its domain tag) and the
    /// payload, so equal ids imply equal (kind, payload).
    pub fn compute_id(&self) -> ObjectId {
        self.kind.hasher().hash(&self.data)
    }

    /// Size of the payload in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
