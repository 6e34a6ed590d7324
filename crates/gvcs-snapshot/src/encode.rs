//! Conversion between resolved entities and stored records.

use std::collections::BTreeMap;

use gvcs_store::{
    Attribute, AttributeBlob, ContentObject, GraphRecord, NodeRecord, ObjectStore,
    RelationshipRecord, Value,
};
use gvcs_types::{EntityId, ObjectId};

use crate::error::{SnapshotError, SnapshotResult};
use crate::graph::{Entity, Node, Relationship};

/// Default encoded size above which an attribute value is spilled to its
/// own blob.
pub const DEFAULT_INLINE_THRESHOLD: usize = 256;

/// An entity's record plus the attribute blobs it references, ready to be
/// written. Nothing has touched the store yet.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedEntity {
    pub id: EntityId,
    pub record: ContentObject,
    pub blobs: Vec<ContentObject>,
}

impl EncodedEntity {
    /// Content hash the record will be stored under.
    pub fn hash(&self) -> ObjectId {
        self.record.compute_id()
    }

    /// Write blobs first, then the record, and return the record hash.
    pub fn write(&self, store: &dyn ObjectStore) -> SnapshotResult<ObjectId> {
        store.write_batch(&self.blobs)?;
        Ok(store.write(&self.record)?)
    }
}

fn encode_attributes(
    attributes: &BTreeMap<String, Value>,
    threshold: usize,
    blobs: &mut Vec<ContentObject>,
) -> SnapshotResult<BTreeMap<String, Attribute>> {
    let mut out = BTreeMap::new();
    for (key, value) in attributes {
        value.validate()?;
        let attribute = if value.encoded_len()? > threshold {
            let blob = AttributeBlob {
                value: value.clone(),
            }
            .to_content_object()?;
            let id = blob.compute_id();
            blobs.push(blob);
            Attribute::Blob(id)
        } else {
            Attribute::Inline(value.clone())
        };
        out.insert(key.clone(), attribute);
    }
    Ok(out)
}

/// Encode a node, spilling values larger than `threshold` bytes.
pub fn encode_node(node: &Node, threshold: usize) -> SnapshotResult<EncodedEntity> {
    let mut blobs = Vec::new();
    let record = NodeRecord {
        id: node.id.clone(),
        labels: node.labels.clone(),
        attributes: encode_attributes(&node.attributes, threshold, &mut blobs)?,
    };
    Ok(EncodedEntity {
        id: EntityId::Node(node.id.clone()),
        record: record.to_content_object()?,
        blobs,
    })
}

/// Encode a relationship, spilling values larger than `threshold` bytes.
pub fn encode_relationship(
    relationship: &Relationship,
    threshold: usize,
) -> SnapshotResult<EncodedEntity> {
    let mut blobs = Vec::new();
    let record = RelationshipRecord {
        id: relationship.id.clone(),
        source: relationship.source.clone(),
        target: relationship.target.clone(),
        rel_type: relationship.rel_type.clone(),
        attributes: encode_attributes(&relationship.attributes, threshold, &mut blobs)?,
    };
    Ok(EncodedEntity {
        id: EntityId::Relationship(relationship.id.clone()),
        record: record.to_content_object()?,
        blobs,
    })
}

/// Encode either kind of entity.
pub fn encode_entity(entity: &Entity, threshold: usize) -> SnapshotResult<EncodedEntity> {
    match entity {
        Entity::Node(n) => encode_node(n, threshold),
        Entity::Relationship(r) => encode_relationship(r, threshold),
    }
}

/// Resolve stored attributes, reading spilled values from the store.
///
/// `pending` supplies blobs that are encoded but not yet written.
fn resolve_attributes(
    store: &dyn ObjectStore,
    attributes: BTreeMap<String, Attribute>,
    pending: &[ContentObject],
) -> SnapshotResult<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    for (key, attribute) in attributes {
        let value = match attribute {
            Attribute::Inline(v) => v,
            Attribute::Blob(id) => {
                let obj = match pending.iter().find(|b| b.compute_id() == id) {
                    Some(obj) => obj.clone(),
                    None => store.get(&id)?,
                };
                AttributeBlob::from_content_object(&obj)?.value
            }
        };
        out.insert(key, value);
    }
    Ok(out)
}

/// Decode a record object into a resolved entity.
pub fn decode_entity(
    store: &dyn ObjectStore,
    record: &ContentObject,
    pending: &[ContentObject],
) -> SnapshotResult<Entity> {
    Ok(match GraphRecord::from_content_object(record)? {
        GraphRecord::Node(r) => Entity::Node(Node {
            id: r.id,
            labels: r.labels,
            attributes: resolve_attributes(store, r.attributes, pending)?,
        }),
        GraphRecord::Relationship(r) => Entity::Relationship(Relationship {
            id: r.id,
            source: r.source,
            target: r.target,
            rel_type: r.rel_type,
            attributes: resolve_attributes(store, r.attributes, pending)?,
        }),
    })
}

/// Read the record stored under `hash` and check it belongs to `expected`.
pub fn load_entity(
    store: &dyn ObjectStore,
    expected: &EntityId,
    hash: &ObjectId,
) -> SnapshotResult<Entity> {
    let record = store.get(hash)?;
    let entity = decode_entity(store, &record, &[])?;
    if entity.id() != *expected {
        return Err(SnapshotError::Corrupt {
            id: *hash,
            reason: format!("record for {} filed under {expected}", entity.id()),
        });
    }
    Ok(entity)
}
