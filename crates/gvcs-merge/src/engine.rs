//! Three-way merge of two commits.
//!
//! A merge runs through the phases `Initiated -> AncestorResolved ->
//! Diffing -> Reconciling -> {Clean | Conflicted}`. Fast-forward and
//! already-merged cases are detected right after the ancestor is known and
//! never reach the diff.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use gvcs_dag::{Commit, CommitGraph};
use gvcs_snapshot::{diff, encode_entity, load_entity, DEFAULT_INLINE_THRESHOLD};
use gvcs_store::ObjectStore;
use gvcs_types::{Author, CommitId, EntityId, ObjectId};

use crate::conflicted::{ConflictedMerge, Roots};
use crate::error::{MergeError, MergeResult};
use crate::policy::{MergePolicy, ThreeWayPolicy};
use crate::types::{ConflictKind, ConflictRecord, MergeOutcome, MergePhase};

static THREE_WAY: ThreeWayPolicy = ThreeWayPolicy;

/// Tracks and logs the phase of one merge.
struct Session {
    ours: CommitId,
    theirs: CommitId,
    phase: MergePhase,
}

impl Session {
    fn advance(&mut self, next: MergePhase) {
        debug!(
            ours = %self.ours.short_hex(),
            theirs = %self.theirs.short_hex(),
            from = %self.phase,
            to = %next,
            "merge phase"
        );
        self.phase = next;
    }
}

/// Merges commits of one repository.
#[derive(Clone, Copy)]
pub struct MergeEngine<'a> {
    store: &'a dyn ObjectStore,
    graph: &'a CommitGraph,
    policy: &'a dyn MergePolicy,
    threshold: usize,
}

impl<'a> MergeEngine<'a> {
    /// An engine using [`ThreeWayPolicy`].
    pub fn new(store: &'a dyn ObjectStore, graph: &'a CommitGraph) -> Self {
        Self {
            store,
            graph,
            policy: &THREE_WAY,
            threshold: DEFAULT_INLINE_THRESHOLD,
        }
    }

    pub fn with_policy(mut self, policy: &'a dyn MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Inline threshold for records the policy or a resolution produces.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Merge `theirs` into `ours`.
    ///
    /// A clean merge creates a commit with parents `[ours, theirs]`; the
    /// caller is responsible for moving the branch. Conflicts create
    /// nothing but CAS objects.
    pub fn merge(
        &self,
        ours: CommitId,
        theirs: CommitId,
        author: Author,
        message: impl Into<String>,
        timestamp_ms: i64,
    ) -> MergeResult<MergeOutcome> {
        let mut session = Session {
            ours,
            theirs,
            phase: MergePhase::Initiated,
        };

        // Pinned read: both tips are immutable from here on.
        let ours_commit = self.graph.get(&ours)?;
        let theirs_commit = self.graph.get(&theirs)?;

        let ancestor = self
            .graph
            .lowest_common_ancestor(&ours, &theirs)?
            .ok_or(MergeError::Unrelated { ours, theirs })?;
        session.advance(MergePhase::AncestorResolved);

        if ancestor == theirs {
            info!(ours = %ours.short_hex(), "already up to date");
            return Ok(MergeOutcome::UpToDate(ours));
        }
        if ancestor == ours {
            info!(to = %theirs.short_hex(), "fast-forward");
            return Ok(MergeOutcome::FastForward(theirs));
        }

        let ancestor_commit = self.graph.get(&ancestor)?;
        let mut state = self.reconcile(&mut session, &ancestor_commit, &ours_commit, &theirs_commit)?;
        state.check_integrity(self.store)?;

        if !state.is_resolved() {
            session.advance(MergePhase::Conflicted);
            info!(
                ours = %ours.short_hex(),
                theirs = %theirs.short_hex(),
                conflicts = state.conflicts.len(),
                policy = self.policy.name(),
                "merge has conflicts"
            );
            return Ok(MergeOutcome::Conflicted(state));
        }

        session.advance(MergePhase::Clean);
        let commit = state.finish(self.store, self.graph, author, message, timestamp_ms)?;
        Ok(MergeOutcome::Clean(commit))
    }

    fn reconcile(
        &self,
        session: &mut Session,
        ancestor: &Commit,
        ours: &Commit,
        theirs: &Commit,
    ) -> MergeResult<ConflictedMerge> {
        session.advance(MergePhase::Diffing);
        let ours_diff = diff(self.store, ancestor.snapshot(), ours.snapshot())?;
        let theirs_diff = diff(self.store, ancestor.snapshot(), theirs.snapshot())?;

        session.advance(MergePhase::Reconciling);
        let mut state = ConflictedMerge {
            ours: ours.id(),
            theirs: theirs.id(),
            ancestor: ancestor.id(),
            roots: Roots {
                ancestor: *ancestor.snapshot(),
                ours: *ours.snapshot(),
                theirs: *theirs.snapshot(),
            },
            threshold: self.threshold,
            decided: BTreeMap::new(),
            conflicts: BTreeMap::new(),
        };

        let ours_changes = ours_diff.by_id();
        let theirs_changes = theirs_diff.by_id();
        let touched: BTreeSet<&EntityId> = ours_changes
            .keys()
            .chain(theirs_changes.keys())
            .copied()
            .collect();

        for id in touched {
            match (ours_changes.get(id), theirs_changes.get(id)) {
                (Some(o), None) => {
                    state.decided.insert(id.clone(), o.new);
                }
                (None, Some(t)) => {
                    state.decided.insert(id.clone(), t.new);
                }
                (Some(o), Some(t)) => {
                    // Both diffs start from the same ancestor, so `old` agrees.
                    let base = o.old;
                    match self.both_changed(id, base, o.new, t.new)? {
                        Ok(value) => {
                            state.decided.insert(id.clone(), value);
                        }
                        Err(kind) => {
                            state.conflicts.insert(
                                id.clone(),
                                ConflictRecord {
                                    id: id.clone(),
                                    kind,
                                    ancestor: base,
                                    ours: o.new,
                                    theirs: t.new,
                                },
                            );
                        }
                    }
                }
                (None, None) => {}
            }
        }
        Ok(state)
    }

    /// Decide an entity changed on both sides: the merged value, or the
    /// kind of conflict.
    fn both_changed(
        &self,
        id: &EntityId,
        base: Option<ObjectId>,
        ours: Option<ObjectId>,
        theirs: Option<ObjectId>,
    ) -> MergeResult<Result<Option<ObjectId>, ConflictKind>> {
        if ours == theirs {
            return Ok(Ok(ours));
        }
        let (ours, theirs) = match (ours, theirs) {
            (None, Some(_)) => return Ok(Err(ConflictKind::DeleteModify)),
            (Some(_), None) => return Ok(Err(ConflictKind::ModifyDelete)),
            (Some(o), Some(t)) => (o, t),
            (None, None) => return Ok(Ok(None)),
        };

        let kind = if base.is_some() {
            ConflictKind::ModifyModify
        } else {
            ConflictKind::AddAdd
        };
        let ancestor = base
            .map(|hash| load_entity(self.store, id, &hash))
            .transpose()?;
        let ours = load_entity(self.store, id, &ours)?;
        let theirs = load_entity(self.store, id, &theirs)?;
        match self.policy.reconcile(ancestor.as_ref(), &ours, &theirs) {
            Some(merged) => {
                let encoded = encode_entity(&merged, self.threshold)?;
                if encoded.id != *id {
                    return Ok(Err(kind));
                }
                debug!(entity = %id, policy = self.policy.name(), "policy merged entity");
                Ok(Ok(Some(encoded.write(self.store)?)))
            }
            None => Ok(Err(kind)),
        }
    }
}
