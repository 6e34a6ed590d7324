//! End-to-end behavior of a repository: storage, history, staging, merge
//! and rollback.

use gvcs_index::StagingError;
use gvcs_sdk::{
    AttributeMergePolicy, Author, CommitOptions, ConflictKind, EntityId, MergeOutcome, MoveMode, Node, NodeId,
    Relationship, RelationshipId, RepoConfig, Repository, Resolution, SdkError, StagingArea,
    ThreeWayPolicy, Value,
};
use gvcs_store::{ContentKind, ObjectStore};
use proptest::prelude::*;

fn repo() -> Repository {
    Repository::in_memory(RepoConfig::default()).unwrap()
}

fn author() -> Author {
    Author::new("Ada", "ada@example.org")
}

fn nid(s: &str) -> NodeId {
    NodeId::new(s).unwrap()
}

fn person(id: &str, age: i64) -> Node {
    Node::new(nid(id))
        .with_label("Person")
        .with_attribute("age", age)
}

fn knows(id: &str, src: &str, tgt: &str) -> Relationship {
    Relationship::new(RelationshipId::new(id).unwrap(), nid(src), nid(tgt), "KNOWS")
}

fn edit(repo: &Repository, branch: &str, f: impl FnOnce(&mut StagingArea)) -> gvcs_sdk::Commit {
    let mut staging = repo.checkout(branch).unwrap();
    f(&mut staging);
    repo.commit(&mut staging, author(), "edit").unwrap()
}

fn age_at(repo: &Repository, commit: &gvcs_sdk::CommitId, id: &str) -> Option<Value> {
    repo.materialize(commit)
        .unwrap()
        .node(&nid(id))
        .map(|n| n.attributes["age"].clone())
}

/// `main` holds alice and bob; `feature` branches off it.
fn forked() -> (Repository, gvcs_sdk::Commit) {
    let repo = repo();
    let base = edit(&repo, "main", |s| {
        s.add_or_update_node(person("alice", 30)).unwrap();
        s.add_or_update_node(person("bob", 40)).unwrap();
    });
    repo.create_branch("feature", base.id()).unwrap();
    (repo, base)
}

// ---------------------------------------------------------------
// Storage and history
// ---------------------------------------------------------------

proptest! {
    #[test]
    fn identical_payloads_share_one_object(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
        let repo = repo();
        let store = repo.store();
        let a = store.put(ContentKind::AttributeBlob, payload.clone()).unwrap();
        let b = store.put(ContentKind::AttributeBlob, payload.clone()).unwrap();
        prop_assert_eq!(a, b);
        prop_assert_eq!(store.get(&a).unwrap().data, payload);
    }
}

#[test]
fn history_is_immutable() {
    let repo = repo();
    let first = edit(&repo, "main", |s| s.add_or_update_node(person("alice", 30)).unwrap());
    let snapshot = *first.snapshot();
    let record = repo.store().get(&snapshot).unwrap();

    edit(&repo, "main", |s| s.add_or_update_node(person("alice", 31)).unwrap());
    repo.rollback("main", first.id()).unwrap();
    edit(&repo, "main", |s| s.add_or_update_node(person("carol", 20)).unwrap());

    let reread = repo.graph().get(&first.id()).unwrap();
    assert_eq!(reread, first);
    assert_eq!(repo.store().get(&snapshot).unwrap(), record);
    assert_eq!(age_at(&repo, &first.id(), "alice"), Some(Value::Int(30)));
}

#[test]
fn diff_of_a_snapshot_with_itself_is_empty() {
    let (repo, base) = forked();
    assert!(repo.diff(&base.id(), &base.id()).unwrap().is_empty());

    let next = edit(&repo, "main", |s| s.add_or_update_node(person("bob", 41)).unwrap());
    let changes = repo.diff(&base.id(), &next.id()).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes.changes[0].id, EntityId::Node(nid("bob")));
}

// ---------------------------------------------------------------
// Staging
// ---------------------------------------------------------------

#[test]
fn dangling_relationship_is_rejected_without_side_effects() {
    let repo = repo();
    let mut staging = repo.checkout("main").unwrap();
    staging.add_or_update_node(person("alice", 30)).unwrap();
    let before = staging.changes().unwrap();

    let err = staging
        .add_or_update_relationship(knows("k", "alice", "ghost"))
        .unwrap_err();
    assert!(matches!(err, StagingError::DanglingReference { .. }));
    assert_eq!(staging.changes().unwrap(), before);
    assert!(staging
        .get_relationship(&RelationshipId::new("k").unwrap())
        .unwrap()
        .is_none());
}

#[test]
fn relationships_to_committed_nodes_are_accepted() {
    let (repo, _) = forked();
    let commit = edit(&repo, "main", |s| {
        s.add_or_update_relationship(knows("k", "alice", "bob")).unwrap()
    });
    let graph = repo.materialize(&commit.id()).unwrap();
    assert_eq!(graph.outgoing(&nid("alice")).count(), 1);
    assert_eq!(graph.incoming(&nid("bob")).count(), 1);
}

#[test]
fn stale_checkout_cannot_overwrite_newer_tip() {
    let (repo, _) = forked();
    let mut stale = repo.checkout("main").unwrap();
    stale.add_or_update_node(person("carol", 22)).unwrap();
    let tip = edit(&repo, "main", |s| s.add_or_update_node(person("dave", 50)).unwrap());

    let err = repo.commit(&mut stale, author(), "late").unwrap_err();
    assert!(err.is_non_fast_forward());
    assert_eq!(repo.current_commit("main").unwrap(), tip);
}

#[test]
fn edge_case_values_materialize_identically() {
    let repo = repo();
    let node = Node::new(nid("m"))
        .with_label("Measurement")
        .with_attribute("tiny", 1.0715660391465826e-75)
        .with_attribute("sum", 0.1 + 0.2)
        .with_attribute("subnormal", 5e-324)
        .with_attribute("max", f64::MAX)
        .with_attribute("min_int", i64::MIN)
        .with_attribute("none", Value::Null)
        .with_attribute("raw", Value::Bytes(vec![0, 255, 7]))
        .with_attribute(
            "series",
            Value::List(vec![Value::Float(-1.603964615428183e143), Value::from("x"), Value::Null]),
        )
        .with_attribute("notes", "long text ".repeat(100));
    let commit = edit(&repo, "main", |s| s.add_or_update_node(node.clone()).unwrap());

    let graph = repo.materialize(&commit.id()).unwrap();
    assert_eq!(graph.node(&nid("m")), Some(&node));
}

proptest! {
    #[test]
    fn restaging_unchanged_content_is_not_a_change(
        f in any::<f64>().prop_filter("finite, non-zero", |f| f.is_finite() && *f != 0.0)
    ) {
        let repo = repo();
        let first = edit(&repo, "main", |s| {
            s.add_or_update_node(Node::new(nid("p")).with_attribute("x", f)).unwrap()
        });

        let stored = repo.materialize(&first.id()).unwrap().node(&nid("p")).cloned().unwrap();
        let mut staging = repo.checkout("main").unwrap();
        staging.add_or_update_node(stored).unwrap();
        prop_assert!(staging.is_clean());
        prop_assert!(matches!(
            repo.commit(&mut staging, author(), "same"),
            Err(SdkError::Staging(StagingError::EmptyCommit))
        ));

        let forced = repo
            .commit_with(&mut staging, author(), "forced", CommitOptions::forced())
            .unwrap();
        prop_assert!(repo.diff(&first.id(), &forced.id()).unwrap().is_empty());
    }
}

// ---------------------------------------------------------------
// Merge
// ---------------------------------------------------------------

#[test]
fn merging_a_descendant_fast_forwards() {
    let (repo, _) = forked();
    let ahead = edit(&repo, "feature", |s| s.add_or_update_node(person("carol", 22)).unwrap());

    let outcome = repo
        .merge("main", "feature", author(), "merge", &ThreeWayPolicy)
        .unwrap();
    assert!(matches!(outcome, MergeOutcome::FastForward(id) if id == ahead.id()));
    assert_eq!(repo.current_commit("main").unwrap().id(), ahead.id());

    let again = repo
        .merge("main", "feature", author(), "merge", &ThreeWayPolicy)
        .unwrap();
    assert!(matches!(again, MergeOutcome::UpToDate(_)));
}

#[test]
fn divergent_attribute_edits_conflict() {
    let (repo, base) = forked();
    let ours = edit(&repo, "main", |s| s.add_or_update_node(person("alice", 31)).unwrap());
    let theirs = edit(&repo, "feature", |s| s.add_or_update_node(person("alice", 32)).unwrap());
    let commits_before = repo.graph().list().unwrap().len();

    let outcome = repo
        .merge("main", "feature", author(), "merge", &ThreeWayPolicy)
        .unwrap();
    let MergeOutcome::Conflicted(merge) = outcome else {
        panic!("expected a conflict");
    };
    let conflicts = merge.conflicts();
    assert_eq!(conflicts.len(), 1);
    let record = &conflicts[0];
    assert_eq!(record.id, EntityId::Node(nid("alice")));
    assert_eq!(record.kind, ConflictKind::ModifyModify);

    let key = EntityId::Node(nid("alice"));
    let hash = |root: &gvcs_sdk::ObjectId| {
        gvcs_snapshot::Manifest::new(repo.store().as_ref())
            .get(root, &key)
            .unwrap()
    };
    assert_eq!(record.ancestor, hash(base.snapshot()));
    assert_eq!(record.ours, hash(ours.snapshot()));
    assert_eq!(record.theirs, hash(theirs.snapshot()));

    assert_eq!(repo.graph().list().unwrap().len(), commits_before);
    assert_eq!(repo.current_commit("main").unwrap(), ours);
}

#[test]
fn disjoint_edits_merge_cleanly() {
    let (repo, _) = forked();
    let ours = edit(&repo, "main", |s| s.add_or_update_node(person("alice", 31)).unwrap());
    let theirs = edit(&repo, "feature", |s| s.add_or_update_node(person("bob", 41)).unwrap());

    let outcome = repo
        .merge("main", "feature", author(), "merge", &ThreeWayPolicy)
        .unwrap();
    let MergeOutcome::Clean(commit) = outcome else {
        panic!("expected a clean merge");
    };
    assert_eq!(commit.parents(), &[ours.id(), theirs.id()]);
    assert_eq!(repo.current_commit("main").unwrap(), commit);
    assert_eq!(age_at(&repo, &commit.id(), "alice"), Some(Value::Int(31)));
    assert_eq!(age_at(&repo, &commit.id(), "bob"), Some(Value::Int(41)));
}

#[test]
fn attribute_policy_merges_edits_to_different_attributes() {
    let (repo, _) = forked();
    edit(&repo, "main", |s| {
        s.add_or_update_node(person("alice", 31)).unwrap()
    });
    edit(&repo, "feature", |s| {
        s.add_or_update_node(person("alice", 30).with_attribute("city", "Paris"))
            .unwrap()
    });

    let outcome = repo
        .merge("main", "feature", author(), "merge", &AttributeMergePolicy::new())
        .unwrap();
    let MergeOutcome::Clean(commit) = outcome else {
        panic!("expected a clean merge");
    };
    let graph = repo.materialize(&commit.id()).unwrap();
    let alice = graph.node(&nid("alice")).unwrap();
    assert_eq!(alice.attributes["age"], Value::Int(31));
    assert_eq!(alice.attributes["city"], Value::from("Paris"));
}

#[test]
fn conflicted_merge_completes_after_resolution() {
    let (repo, _) = forked();
    edit(&repo, "main", |s| s.add_or_update_node(person("alice", 31)).unwrap());
    edit(&repo, "feature", |s| s.add_or_update_node(person("alice", 32)).unwrap());

    let MergeOutcome::Conflicted(mut merge) = repo
        .merge("main", "feature", author(), "merge", &ThreeWayPolicy)
        .unwrap()
    else {
        panic!("expected a conflict");
    };
    let key = EntityId::Node(nid("alice"));
    let remaining = repo
        .resolve_conflict(&mut merge, &key, Resolution::TakeTheirs)
        .unwrap();
    assert!(remaining.is_empty());

    let commit = repo
        .complete_merge("main", merge, author(), "resolved")
        .unwrap();
    assert!(commit.is_merge());
    assert_eq!(repo.current_commit("main").unwrap(), commit);
    assert_eq!(age_at(&repo, &commit.id(), "alice"), Some(Value::Int(32)));
}

#[test]
fn completing_a_merge_after_the_branch_moved_is_refused() {
    let (repo, _) = forked();
    edit(&repo, "main", |s| s.add_or_update_node(person("alice", 31)).unwrap());
    edit(&repo, "feature", |s| s.add_or_update_node(person("alice", 32)).unwrap());
    let MergeOutcome::Conflicted(mut merge) = repo
        .merge("main", "feature", author(), "merge", &ThreeWayPolicy)
        .unwrap()
    else {
        panic!("expected a conflict");
    };
    repo.resolve_conflict(&mut merge, &EntityId::Node(nid("alice")), Resolution::TakeOurs)
        .unwrap();
    edit(&repo, "main", |s| s.add_or_update_node(person("erin", 60)).unwrap());

    let err = repo
        .complete_merge("main", merge, author(), "late")
        .unwrap_err();
    assert!(err.is_non_fast_forward());
}

// ---------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------

#[test]
fn rollback_restores_the_ancestor_state() {
    let (repo, base) = forked();
    let later = edit(&repo, "main", |s| {
        s.add_or_update_node(person("alice", 99)).unwrap();
        s.remove_node_detached(&nid("bob")).unwrap();
    });

    repo.rollback("main", base.id()).unwrap();
    let tip = repo.current_commit("main").unwrap();
    assert_eq!(tip.id(), base.id());
    let graph = repo.materialize(&tip.id()).unwrap();
    assert_eq!(graph, repo.materialize(&base.id()).unwrap());
    assert_eq!(age_at(&repo, &tip.id(), "alice"), Some(Value::Int(30)));
    assert!(graph.node(&nid("bob")).is_some());

    // The abandoned commit is still readable.
    assert_eq!(age_at(&repo, &later.id(), "alice"), Some(Value::Int(99)));
}

#[test]
fn fast_forward_moves_refuse_to_rewind() {
    let (repo, base) = forked();
    edit(&repo, "main", |s| s.add_or_update_node(person("carol", 22)).unwrap());
    let err = repo
        .move_branch("main", base.id(), MoveMode::FastForward)
        .unwrap_err();
    assert!(err.is_non_fast_forward());
    assert!(matches!(
        repo.move_branch("main", base.id(), MoveMode::Force),
        Ok(_)
    ));
}

#[test]
fn rejected_dangling_removal_keeps_the_node() {
    let (repo, _) = forked();
    edit(&repo, "main", |s| {
        s.add_or_update_relationship(knows("k", "alice", "bob")).unwrap()
    });
    let mut staging = repo.checkout("main").unwrap();
    let err = staging.remove(&EntityId::Node(nid("bob"))).unwrap_err();
    assert!(matches!(err, StagingError::DanglingReference { .. }));
    assert!(staging.is_clean());
    assert!(matches!(
        repo.commit(&mut staging, author(), "nothing"),
        Err(SdkError::Staging(StagingError::EmptyCommit))
    ));
}
