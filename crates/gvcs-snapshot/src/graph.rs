//! In-memory graph model.
//!
//! Nodes and relationships live in flat tables keyed by logical id.
//! Relationships refer to their endpoints by id and adjacency is kept as id
//! sets, so cyclic graphs never form ownership cycles.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use gvcs_store::Value;
use gvcs_types::{EntityId, NodeId, RelationshipId};

use crate::error::{SnapshotError, SnapshotResult};

/// A node with fully resolved attribute values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: BTreeSet<String>,
    pub attributes: BTreeMap<String, Value>,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            labels: BTreeSet::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A typed, directed relationship between two nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub source: NodeId,
    pub target: NodeId,
    pub rel_type: String,
    pub attributes: BTreeMap<String, Value>,
}

impl Relationship {
    pub fn new(
        id: RelationshipId,
        source: NodeId,
        target: NodeId,
        rel_type: impl Into<String>,
    ) -> Self {
        Self {
            id,
            source,
            target,
            rel_type: rel_type.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether `node` is either endpoint.
    pub fn touches(&self, node: &NodeId) -> bool {
        self.source == *node || self.target == *node
    }
}

/// Either kind of graph entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    Node(Node),
    Relationship(Relationship),
}

impl Entity {
    /// The manifest key of this entity.
    pub fn id(&self) -> EntityId {
        match self {
            Self::Node(n) => EntityId::Node(n.id.clone()),
            Self::Relationship(r) => EntityId::Relationship(r.id.clone()),
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(n) => Some(n),
            Self::Relationship(_) => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Self::Node(_) => None,
            Self::Relationship(r) => Some(r),
        }
    }
}

impl From<Node> for Entity {
    fn from(n: Node) -> Self {
        Self::Node(n)
    }
}

impl From<Relationship> for Entity {
    fn from(r: Relationship) -> Self {
        Self::Relationship(r)
    }
}

/// A target that a snapshot can be materialized into.
///
/// Implementations wrap a queryable graph store. Nodes are always delivered
/// before any relationship that references them.
pub trait GraphBackend {
    /// Drop whatever the backend currently holds.
    fn reset(&mut self) -> SnapshotResult<()>;

    /// Insert one node.
    fn put_node(&mut self, node: Node) -> SnapshotResult<()>;

    /// Insert one relationship. Its endpoints have already been delivered.
    fn put_relationship(&mut self, relationship: Relationship) -> SnapshotResult<()>;
}

/// A fully materialized graph state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    relationships: BTreeMap<RelationshipId, Relationship>,
    outgoing: BTreeMap<NodeId, BTreeSet<RelationshipId>>,
    incoming: BTreeMap<NodeId, BTreeSet<RelationshipId>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn relationship(&self, id: &RelationshipId) -> Option<&Relationship> {
        self.relationships.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }

    /// Relationships whose source is `node`.
    pub fn outgoing(&self, node: &NodeId) -> impl Iterator<Item = &RelationshipId> {
        self.outgoing.get(node).into_iter().flatten()
    }

    /// Relationships whose target is `node`.
    pub fn incoming(&self, node: &NodeId) -> impl Iterator<Item = &RelationshipId> {
        self.incoming.get(node).into_iter().flatten()
    }

    /// Plain JSON rendering: `{"nodes": [...], "relationships": [...]}`.
    pub fn to_json(&self) -> serde_json::Value {
        let attrs = |a: &BTreeMap<String, Value>| -> serde_json::Map<String, serde_json::Value> {
            a.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
        };
        let nodes: Vec<_> = self
            .nodes
            .values()
            .map(|n| {
                serde_json::json!({
                    "id": n.id.as_str(),
                    "labels": n.labels,
                    "attributes": attrs(&n.attributes),
                })
            })
            .collect();
        let relationships: Vec<_> = self
            .relationships
            .values()
            .map(|r| {
                serde_json::json!({
                    "id": r.id.as_str(),
                    "source": r.source.as_str(),
                    "target": r.target.as_str(),
                    "type": r.rel_type,
                    "attributes": attrs(&r.attributes),
                })
            })
            .collect();
        serde_json::json!({ "nodes": nodes, "relationships": relationships })
    }
}

impl GraphBackend for Graph {
    fn reset(&mut self) -> SnapshotResult<()> {
        *self = Self::default();
        Ok(())
    }

    fn put_node(&mut self, node: Node) -> SnapshotResult<()> {
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    fn put_relationship(&mut self, relationship: Relationship) -> SnapshotResult<()> {
        for endpoint in [&relationship.source, &relationship.target] {
            if !self.nodes.contains_key(endpoint) {
                return Err(SnapshotError::DanglingEndpoint {
                    relationship: relationship.id.clone(),
                    node: endpoint.clone(),
                });
            }
        }
        if let Some(old) = self.relationships.get(&relationship.id) {
            if let Some(ids) = self.outgoing.get_mut(&old.source) {
                ids.remove(&old.id);
            }
            if let Some(ids) = self.incoming.get_mut(&old.target) {
                ids.remove(&old.id);
            }
        }
        self.outgoing
            .entry(relationship.source.clone())
            .or_default()
            .insert(relationship.id.clone());
        self.incoming
            .entry(relationship.target.clone())
            .or_default()
            .insert(relationship.id.clone());
        self.relationships
            .insert(relationship.id.clone(), relationship);
        Ok(())
    }
}
