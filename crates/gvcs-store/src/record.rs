//! Serialized graph fragments.
//!
//! Records are encoded as canonical JSON: every map and set is ordered, so
//! the same logical content always yields the same bytes and therefore the
//! same object id.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use gvcs_types::{NodeId, ObjectId, RelationshipId};

use crate::error::{StoreError, StoreResult};
use crate::object::{ContentKind, ContentObject};

/// An attribute value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
}

impl Value {
    /// Reject values whose canonical encoding would not roundtrip.
    ///
    /// JSON has no representation for NaN or infinities.
    pub fn validate(&self) -> StoreResult<()> {
        match self {
            Self::Float(f) if !f.is_finite() => Err(StoreError::Serialization(format!(
                "non-finite float {f} cannot be stored"
            ))),
            Self::List(items) => items.iter().try_for_each(Value::validate),
            _ => Ok(()),
        }
    }

    /// Plain JSON rendering for display and export.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Bytes(b) => serde_json::Value::Array(
                b.iter().map(|byte| serde_json::Value::from(*byte)).collect(),
            ),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }

    /// Size of the canonical encoding, used to decide inline vs spilled.
    pub fn encoded_len(&self) -> StoreResult<usize> {
        serde_json::to_vec(self)
            .map(|v| v.len())
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// An attribute slot inside a record: a small value stored inline, or the
/// hash of an [`AttributeBlob`] holding a large one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Attribute {
    Inline(Value),
    Blob(ObjectId),
}

impl Attribute {
    /// The blob hash, if this attribute is stored out of line.
    pub fn blob_id(&self) -> Option<&ObjectId> {
        match self {
            Self::Blob(id) => Some(id),
            Self::Inline(_) => None,
        }
    }
}

/// A node's versioned content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub labels: BTreeSet<String>,
    pub attributes: BTreeMap<String, Attribute>,
}

/// A relationship's versioned content.
///
/// Endpoints are held by logical id, never by reference, so cycles in the
/// graph never become ownership cycles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub id: RelationshipId,
    pub source: NodeId,
    pub target: NodeId,
    pub rel_type: String,
    pub attributes: BTreeMap<String, Attribute>,
}

/// An attribute value stored as its own object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeBlob {
    pub value: Value,
}

fn encode<T: Serialize>(kind: ContentKind, value: &T) -> StoreResult<ContentObject> {
    let data = serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(ContentObject::new(kind, data))
}

fn decode<T: for<'de> Deserialize<'de>>(
    expected: ContentKind,
    obj: &ContentObject,
) -> StoreResult<T> {
    if obj.kind != expected {
        return Err(StoreError::Corrupt {
            id: obj.compute_id(),
            reason: format!("expected {expected}, got {}", obj.kind),
        });
    }
    serde_json::from_slice(&obj.data).map_err(|e| StoreError::Corrupt {
        id: obj.compute_id(),
        reason: format!("undecodable {expected}: {e}"),
    })
}

impl NodeRecord {
    /// Convert into a `ContentObject` for storage.
    pub fn to_content_object(&self) -> StoreResult<ContentObject> {
        encode(ContentKind::NodeRecord, self)
    }

    /// Decode from a `ContentObject`.
    pub fn from_content_object(obj: &ContentObject) -> StoreResult<Self> {
        decode(ContentKind::NodeRecord, obj)
    }
}

impl RelationshipRecord {
    /// Convert into a `ContentObject` for storage.
    pub fn to_content_object(&self) -> StoreResult<ContentObject> {
        encode(ContentKind::RelationshipRecord, self)
    }

    /// Decode from a `ContentObject`.
    pub fn from_content_object(obj: &ContentObject) -> StoreResult<Self> {
        decode(ContentKind::RelationshipRecord, obj)
    }
}

impl AttributeBlob {
    /// Convert into a `ContentObject` for storage.
    pub fn to_content_object(&self) -> StoreResult<ContentObject> {
        self.value.validate()?;
        encode(ContentKind::AttributeBlob, self)
    }

    /// Decode from a `ContentObject`.
    pub fn from_content_object(obj: &ContentObject) -> StoreResult<Self> {
        decode(ContentKind::AttributeBlob, obj)
    }
}

/// Either kind of entity record, decoded by content kind.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphRecord {
    Node(NodeRecord),
    Relationship(RelationshipRecord),
}

impl GraphRecord {
    /// Decode a node or relationship record; other kinds are corrupt here.
    pub fn from_content_object(obj: &ContentObject) -> StoreResult<Self> {
        match obj.kind {
            ContentKind::NodeRecord => NodeRecord::from_content_object(obj).map(Self::Node),
            ContentKind::RelationshipRecord => {
                RelationshipRecord::from_content_object(obj).map(Self::Relationship)
            }
            other => Err(StoreError::Corrupt {
                id: obj.compute_id(),
                reason: format!("expected an entity record, got {other}"),
            }),
        }
    }

    /// Encode for storage.
    pub fn to_content_object(&self) -> StoreResult<ContentObject> {
        match self {
            Self::Node(r) => r.to_content_object(),
            Self::Relationship(r) => r.to_content_object(),
        }
    }

    /// Attributes of either record kind.
    pub fn attributes(&self) -> &BTreeMap<String, Attribute> {
        match self {
            Self::Node(r) => &r.attributes,
            Self::Relationship(r) => &r.attributes,
        }
    }
}
