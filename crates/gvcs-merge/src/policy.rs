//! Reconciliation policies for entities changed on both sides.
//!
//! The engine settles every case it can decide from hashes alone. A policy
//! is only consulted when both sides hold different content for the same
//! entity.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use gvcs_snapshot::{Entity, Node, Relationship};
use gvcs_store::Value;
use gvcs_types::NodeId;

/// Decides divergent content for one entity.
pub trait MergePolicy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Reconcile `ours` and `theirs` against `ancestor` (`None` when both
    /// sides created the entity). Returns `None` to report a conflict.
    fn reconcile(&self, ancestor: Option<&Entity>, ours: &Entity, theirs: &Entity)
        -> Option<Entity>;
}

/// Treats every divergent modification as a conflict.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreeWayPolicy;

impl MergePolicy for ThreeWayPolicy {
    fn name(&self) -> &str {
        "three-way"
    }

    fn reconcile(&self, _: Option<&Entity>, _: &Entity, _: &Entity) -> Option<Entity> {
        None
    }
}

/// Which side wins a field both sides changed differently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Ours,
    Theirs,
}

/// Merges records field by field.
///
/// Labels and attributes are merged individually with three-way rules, as
/// are a relationship's endpoints and type. The entity only conflicts when
/// one field was changed differently on both sides, unless `prefer` names a
/// side to take in that case.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttributeMergePolicy {
    pub prefer: Option<Side>,
}

impl AttributeMergePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preferring(side: Side) -> Self {
        Self { prefer: Some(side) }
    }

    /// Three-way merge of a single field.
    fn field<T: PartialEq + Clone>(
        &self,
        base: Option<&T>,
        ours: Option<&T>,
        theirs: Option<&T>,
    ) -> Option<Option<T>> {
        if ours == theirs || theirs == base {
            Some(ours.cloned())
        } else if ours == base {
            Some(theirs.cloned())
        } else {
            match self.prefer? {
                Side::Ours => Some(ours.cloned()),
                Side::Theirs => Some(theirs.cloned()),
            }
        }
    }

    fn labels(
        &self,
        base: Option<&BTreeSet<String>>,
        ours: &BTreeSet<String>,
        theirs: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        let empty = BTreeSet::new();
        let base = base.unwrap_or(&empty);
        // Presence is boolean, so one side always agrees with the base.
        base.union(ours)
            .chain(theirs.iter())
            .filter(|label| {
                let (b, o) = (base.contains(*label), ours.contains(*label));
                if o == b {
                    theirs.contains(*label)
                } else {
                    o
                }
            })
            .cloned()
            .collect()
    }

    fn attributes(
        &self,
        base: Option<&BTreeMap<String, Value>>,
        ours: &BTreeMap<String, Value>,
        theirs: &BTreeMap<String, Value>,
    ) -> Option<BTreeMap<String, Value>> {
        let keys: BTreeSet<&String> = base
            .into_iter()
            .flat_map(|b| b.keys())
            .chain(ours.keys())
            .chain(theirs.keys())
            .collect();
        let mut merged = BTreeMap::new();
        for key in keys {
            let value = self.field(base.and_then(|b| b.get(key)), ours.get(key), theirs.get(key))?;
            if let Some(value) = value {
                merged.insert(key.clone(), value);
            }
        }
        Some(merged)
    }

    fn node(&self, base: Option<&Node>, ours: &Node, theirs: &Node) -> Option<Node> {
        Some(Node {
            id: ours.id.clone(),
            labels: self.labels(base.map(|b| &b.labels), &ours.labels, &theirs.labels),
            attributes: self.attributes(
                base.map(|b| &b.attributes),
                &ours.attributes,
                &theirs.attributes,
            )?,
        })
    }

    fn relationship(
        &self,
        base: Option<&Relationship>,
        ours: &Relationship,
        theirs: &Relationship,
    ) -> Option<Relationship> {
        let endpoint = |pick: fn(&Relationship) -> &NodeId| -> Option<NodeId> {
            self.field(base.map(pick), Some(pick(ours)), Some(pick(theirs)))?
        };
        Some(Relationship {
            id: ours.id.clone(),
            source: endpoint(|r| &r.source)?,
            target: endpoint(|r| &r.target)?,
            rel_type: self
                .field(base.map(|b| &b.rel_type), Some(&ours.rel_type), Some(&theirs.rel_type))??,
            attributes: self.attributes(
                base.map(|b| &b.attributes),
                &ours.attributes,
                &theirs.attributes,
            )?,
        })
    }
}

impl MergePolicy for AttributeMergePolicy {
    fn name(&self) -> &str {
        "attribute"
    }

    fn reconcile(
        &self,
        ancestor: Option<&Entity>,
        ours: &Entity,
        theirs: &Entity,
    ) -> Option<Entity> {
        match (ours, theirs) {
            (Entity::Node(o), Entity::Node(t)) => {
                let base = ancestor.and_then(Entity::as_node);
                self.node(base, o, t).map(Entity::Node)
            }
            (Entity::Relationship(o), Entity::Relationship(t)) => {
                let base = ancestor.and_then(Entity::as_relationship);
                self.relationship(base, o, t).map(Entity::Relationship)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gvcs_types::{NodeId, RelationshipId};

    fn node() -> Node {
        Node::new(NodeId::new("n").unwrap())
    }

    fn reconcile(policy: &dyn MergePolicy, base: Node, ours: Node, theirs: Node) -> Option<Node> {
        policy
            .reconcile(Some(&base.into()), &ours.into(), &theirs.into())
            .map(|e| e.as_node().cloned().unwrap())
    }

    #[test]
    fn three_way_always_conflicts() {
        let base = node();
        let ours = node().with_attribute("a", 1i64);
        let theirs = node().with_attribute("b", 2i64);
        assert!(reconcile(&ThreeWayPolicy, base, ours, theirs).is_none());
    }

    #[test]
    fn disjoint_attribute_edits_merge() {
        let base = node().with_attribute("a", 0i64).with_attribute("b", 0i64);
        let ours = node().with_attribute("a", 1i64).with_attribute("b", 0i64);
        let theirs = node().with_attribute("a", 0i64).with_attribute("b", 2i64);
        let merged = reconcile(&AttributeMergePolicy::new(), base, ours, theirs).unwrap();
        assert_eq!(merged.attributes["a"], Value::Int(1));
        assert_eq!(merged.attributes["b"], Value::Int(2));
    }

    #[test]
    fn attribute_removal_is_honored() {
        let base = node().with_attribute("a", 0i64).with_attribute("b", 0i64);
        let ours = node().with_attribute("b", 0i64);
        let theirs = node()
            .with_attribute("a", 0i64)
            .with_attribute("b", 0i64)
            .with_attribute("c", 3i64);
        let merged = reconcile(&AttributeMergePolicy::new(), base, ours, theirs).unwrap();
        assert!(!merged.attributes.contains_key("a"));
        assert_eq!(merged.attributes.len(), 2);
    }

    #[test]
    fn same_attribute_diverging_conflicts_unless_preferred() {
        let base = node().with_attribute("a", 0i64);
        let ours = node().with_attribute("a", 1i64);
        let theirs = node().with_attribute("a", 2i64);
        assert!(reconcile(
            &AttributeMergePolicy::new(),
            base.clone(),
            ours.clone(),
            theirs.clone()
        )
        .is_none());

        let merged = reconcile(
            &AttributeMergePolicy::preferring(Side::Theirs),
            base,
            ours,
            theirs,
        )
        .unwrap();
        assert_eq!(merged.attributes["a"], Value::Int(2));
    }

    #[test]
    fn labels_merge_as_sets() {
        let base = node().with_label("A").with_label("B");
        let ours = node().with_label("A").with_label("C");
        let theirs = node().with_label("A").with_label("B").with_label("D");
        let merged = reconcile(&AttributeMergePolicy::new(), base, ours, theirs).unwrap();
        let labels: Vec<_> = merged.labels.iter().map(String::as_str).collect();
        assert_eq!(labels, vec!["A", "C", "D"]);
    }

    #[test]
    fn relationship_endpoints_merge_as_fields() {
        let n = |s: &str| NodeId::new(s).unwrap();
        let rel = |src: &str, tgt: &str, ty: &str| {
            Relationship::new(RelationshipId::new("r").unwrap(), n(src), n(tgt), ty)
        };
        let policy = AttributeMergePolicy::new();

        let merged = policy
            .reconcile(
                Some(&rel("a", "b", "T").into()),
                &rel("x", "b", "T").into(),
                &rel("a", "b", "U").into(),
            )
            .unwrap();
        let merged = merged.as_relationship().unwrap();
        assert_eq!(merged.source, n("x"));
        assert_eq!(merged.rel_type, "U");

        assert!(policy
            .reconcile(
                Some(&rel("a", "b", "T").into()),
                &rel("x", "b", "T").into(),
                &rel("y", "b", "T").into(),
            )
            .is_none());
    }

    #[test]
    fn add_add_merges_without_ancestor() {
        let ours: Entity = node().with_attribute("a", 1i64).into();
        let theirs: Entity = node().with_attribute("b", 2i64).into();
        let merged = AttributeMergePolicy::new()
            .reconcile(None, &ours, &theirs)
            .unwrap();
        assert_eq!(merged.as_node().unwrap().attributes.len(), 2);
    }
}
