//! The commit graph and its ancestry queries.
//!
//! [`CommitGraph`] wraps a [`CommitStore`] and answers ancestry questions.
//! Each commit has a *generation*: 1 for a root, otherwise one more than the
//! highest parent generation. Generations are derived, cached in memory and
//! never hashed; they let traversals stop as soon as they pass below the
//! generation of the commit they are looking for.
//!
//! # Invariants
//!
//! - `create_commit` is the only mutation, apart from
//!   `discard_unpublished` taking back a commit nothing builds on.
//! - Every parent of a stored commit exists (checked on create).
//! - The graph is acyclic: a commit id depends on its parents' ids.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use gvcs_types::{Author, CommitId, ObjectId};

use crate::commit::{Commit, CommitContent};
use crate::error::{DagError, DagResult};
use crate::store::CommitStore;

/// Maximum number of parents a commit may have.
pub const MAX_PARENTS: usize = 2;

/// Append-only commit DAG backed by a [`CommitStore`].
#[derive(Clone)]
pub struct CommitGraph {
    store: Arc<dyn CommitStore>,
    generations: Arc<RwLock<HashMap<CommitId, u64>>>,
}

impl CommitGraph {
    pub fn new(store: Arc<dyn CommitStore>) -> Self {
        Self {
            store,
            generations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The underlying commit table.
    pub fn store(&self) -> &Arc<dyn CommitStore> {
        &self.store
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Seal and store a new commit.
    ///
    /// All parents must already exist; at most [`MAX_PARENTS`] are allowed
    /// and none may repeat. Creating a commit whose content already exists
    /// returns the existing commit.
    pub fn create_commit(
        &self,
        snapshot: ObjectId,
        parents: Vec<CommitId>,
        author: Author,
        message: impl Into<String>,
        timestamp_ms: i64,
    ) -> DagResult<Commit> {
        if parents.len() > MAX_PARENTS {
            return Err(DagError::TooManyParents(parents.len()));
        }
        if parents.len() == 2 && parents[0] == parents[1] {
            return Err(DagError::DuplicateParent(parents[0]));
        }
        for parent in &parents {
            if !self.store.exists(parent)? {
                return Err(DagError::MissingParent(*parent));
            }
        }

        let commit = Commit::seal(CommitContent {
            snapshot,
            parents,
            author,
            timestamp_ms,
            message: message.into(),
        })?;
        self.store.write(&commit)?;
        let generation = self.generation(&commit.id())?;
        debug!(
            commit = %commit.id().short_hex(),
            parents = commit.parents().len(),
            generation,
            "created commit"
        );
        Ok(commit)
    }

    /// Delete a commit that was created but never made reachable, such as
    /// one whose branch update lost a race.
    ///
    /// Refuses (returning `false`) if any stored commit names it as a
    /// parent. Its snapshot objects stay in the object store.
    pub fn discard_unpublished(&self, id: &CommitId) -> DagResult<bool> {
        for other in self.store.list()? {
            if other == *id {
                continue;
            }
            if self.get(&other)?.parents().contains(id) {
                return Ok(false);
            }
        }
        let removed = self.store.remove(id)?;
        self.generations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed {
            debug!(commit = %id.short_hex(), "discarded unpublished commit");
        }
        Ok(removed)
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// Read a commit, failing with `NotFound` if absent.
    pub fn get(&self, id: &CommitId) -> DagResult<Commit> {
        self.store.read(id)?.ok_or(DagError::NotFound(*id))
    }

    pub fn exists(&self, id: &CommitId) -> DagResult<bool> {
        self.store.exists(id)
    }

    /// Every stored commit id, sorted.
    pub fn list(&self) -> DagResult<Vec<CommitId>> {
        self.store.list()
    }

    /// Commits whose hex id starts with `prefix`.
    pub fn find_by_prefix(&self, prefix: &str) -> DagResult<Vec<CommitId>> {
        let prefix = prefix.to_ascii_lowercase();
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|id| id.to_hex().starts_with(&prefix))
            .collect())
    }

    /// Generation number of a commit (root = 1).
    pub fn generation(&self, id: &CommitId) -> DagResult<u64> {
        if let Some(g) = self.cached_generation(id) {
            return Ok(g);
        }

        // Iterative post-order walk so deep histories do not recurse.
        let mut stack = vec![*id];
        while let Some(current) = stack.last().copied() {
            if self.cached_generation(&current).is_some() {
                stack.pop();
                continue;
            }
            let commit = self.get(&current)?;
            let mut pending = Vec::new();
            let mut max_parent = 0;
            for parent in commit.parents() {
                match self.cached_generation(parent) {
                    Some(g) => max_parent = max_parent.max(g),
                    None => pending.push(*parent),
                }
            }
            if pending.is_empty() {
                self.generations
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(current, max_parent + 1);
                stack.pop();
            } else {
                stack.extend(pending);
            }
        }
        self.cached_generation(id).ok_or(DagError::NotFound(*id))
    }

    fn cached_generation(&self, id: &CommitId) -> Option<u64> {
        self.generations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
    }

    // ---------------------------------------------------------------
    // Ancestry
    // ---------------------------------------------------------------

    /// Whether `ancestor` is reachable from `descendant` by parent edges.
    ///
    /// Reflexive: every commit is its own ancestor.
    pub fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> DagResult<bool> {
        if ancestor == descendant {
            // Still report unknown ids.
            self.get(ancestor)?;
            return Ok(true);
        }
        let floor = self.generation(ancestor)?;
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([*descendant]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            if current == *ancestor {
                return Ok(true);
            }
            if self.generation(&current)? <= floor {
                continue;
            }
            queue.extend(self.get(&current)?.parents().iter().copied());
        }
        Ok(false)
    }

    /// Every ancestor of `id`, including `id` itself.
    pub fn ancestors(&self, id: &CommitId) -> DagResult<HashSet<CommitId>> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([*id]);
        while let Some(current) = queue.pop_front() {
            if visited.insert(current) {
                queue.extend(self.get(&current)?.parents().iter().copied());
            }
        }
        Ok(visited)
    }

    /// The best common ancestor of two commits, or `None` if the histories
    /// are unrelated.
    ///
    /// Candidates are common ancestors that are not ancestors of another
    /// common ancestor. When several remain (criss-cross history), the one
    /// with the highest generation wins, then the smallest id.
    pub fn lowest_common_ancestor(
        &self,
        a: &CommitId,
        b: &CommitId,
    ) -> DagResult<Option<CommitId>> {
        let ancestors_a = self.ancestors(a)?;
        let ancestors_b = self.ancestors(b)?;
        let common: HashSet<CommitId> = ancestors_a.intersection(&ancestors_b).copied().collect();
        if common.is_empty() {
            return Ok(None);
        }

        // Anything strictly below a common ancestor is dominated by it.
        let mut dominated = HashSet::new();
        let mut queue = VecDeque::new();
        for id in &common {
            queue.extend(self.get(id)?.parents().iter().copied());
        }
        while let Some(current) = queue.pop_front() {
            if dominated.insert(current) {
                queue.extend(self.get(&current)?.parents().iter().copied());
            }
        }

        let mut best: Option<(u64, CommitId)> = None;
        for id in common.difference(&dominated) {
            let generation = self.generation(id)?;
            let better = match best {
                None => true,
                Some((g, best_id)) => generation > g || (generation == g && *id < best_id),
            };
            if better {
                best = Some((generation, *id));
            }
        }
        Ok(best.map(|(_, id)| id))
    }

    /// History reachable from `from`, newest generation first.
    ///
    /// Children always precede their parents. Ties are ordered by newer
    /// timestamp, then id. `limit` caps the number of commits returned.
    pub fn log(&self, from: &CommitId, limit: Option<usize>) -> DagResult<Vec<Commit>> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut heap = BinaryHeap::new();

        let start = self.get(from)?;
        seen.insert(start.id());
        heap.push((self.generation(from)?, start.timestamp_ms(), Reverse(start.id())));

        while let Some((_, _, Reverse(id))) = heap.pop() {
            if out.len() >= limit {
                break;
            }
            let commit = self.get(&id)?;
            for parent in commit.parents() {
                if seen.insert(*parent) {
                    let p = self.get(parent)?;
                    heap.push((self.generation(parent)?, p.timestamp_ms(), Reverse(*parent)));
                }
            }
            out.push(commit);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for CommitGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self
            .generations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("CommitGraph")
            .field("cached_generations", &cached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCommitStore;

    fn graph() -> CommitGraph {
        CommitGraph::new(Arc::new(InMemoryCommitStore::new()))
    }

    fn author() -> Author {
        Author::new("tester", "tester@example.org")
    }

    fn snap(tag: &str) -> ObjectId {
        ObjectId::from_bytes(tag.as_bytes())
    }

    fn commit(g: &CommitGraph, tag: &str, parents: &[CommitId]) -> CommitId {
        g.create_commit(snap(tag), parents.to_vec(), author(), tag, 1_000)
            .unwrap()
            .id()
    }

    /// Diamond history:
    ///
    /// ```text
    ///     a
    ///    / \
    ///   b   c
    ///    \ /
    ///     d
    /// ```
    fn diamond(g: &CommitGraph) -> [CommitId; 4] {
        let a = commit(g, "a", &[]);
        let b = commit(g, "b", &[a]);
        let c = commit(g, "c", &[a]);
        let d = commit(g, "d", &[b, c]);
        [a, b, c, d]
    }

    // ----------------------------------------------------------
    // Construction
    // ----------------------------------------------------------

    #[test]
    fn root_commit() {
        let g = graph();
        let a = g
            .create_commit(snap("a"), vec![], author(), "init", 5)
            .unwrap();
        assert!(a.is_root());
        assert_eq!(g.get(&a.id()).unwrap(), a);
        assert_eq!(g.generation(&a.id()).unwrap(), 1);
    }

    #[test]
    fn missing_parent_is_rejected() {
        let g = graph();
        let ghost = CommitId::from_object_id(ObjectId::from_bytes(b"ghost"));
        let err = g
            .create_commit(snap("x"), vec![ghost], author(), "m", 0)
            .unwrap_err();
        assert!(matches!(err, DagError::MissingParent(p) if p == ghost));
        assert!(g.list().unwrap().is_empty());
    }

    #[test]
    fn more_than_two_parents_is_rejected() {
        let g = graph();
        let [a, b, c, _] = diamond(&g);
        let err = g
            .create_commit(snap("octopus"), vec![a, b, c], author(), "m", 0)
            .unwrap_err();
        assert!(matches!(err, DagError::TooManyParents(3)));
    }

    #[test]
    fn duplicate_parent_is_rejected() {
        let g = graph();
        let a = commit(&g, "a", &[]);
        assert!(matches!(
            g.create_commit(snap("m"), vec![a, a], author(), "m", 0),
            Err(DagError::DuplicateParent(_))
        ));
    }

    #[test]
    fn get_unknown_is_not_found() {
        let g = graph();
        let id = CommitId::from_object_id(ObjectId::from_bytes(b"nope"));
        assert!(matches!(g.get(&id), Err(DagError::NotFound(_))));
    }

    #[test]
    fn existing_commit_is_unchanged_by_recreation() {
        let g = graph();
        let first = g.create_commit(snap("a"), vec![], author(), "same", 7).unwrap();
        let again = g.create_commit(snap("a"), vec![], author(), "same", 7).unwrap();
        assert_eq!(first, again);
        assert_eq!(g.list().unwrap().len(), 1);
    }

    #[test]
    fn discard_removes_only_leaf_commits() {
        let g = graph();
        let [a, b, _, d] = diamond(&g);
        assert!(!g.discard_unpublished(&b).unwrap());
        assert!(g.exists(&b).unwrap());

        assert!(g.discard_unpublished(&d).unwrap());
        assert!(!g.exists(&d).unwrap());
        assert!(g.find_by_prefix(&d.to_hex()[..8]).unwrap().is_empty());
        assert_eq!(g.list().unwrap().len(), 3);
        assert!(g.is_ancestor(&a, &b).unwrap());
    }

    // ----------------------------------------------------------
    // Generations & ancestry
    // ----------------------------------------------------------

    #[test]
    fn generations_in_diamond() {
        let g = graph();
        let [a, b, c, d] = diamond(&g);
        assert_eq!(g.generation(&a).unwrap(), 1);
        assert_eq!(g.generation(&b).unwrap(), 2);
        assert_eq!(g.generation(&c).unwrap(), 2);
        assert_eq!(g.generation(&d).unwrap(), 3);
    }

    #[test]
    fn generation_is_recomputed_by_a_fresh_graph() {
        let store: Arc<dyn CommitStore> = Arc::new(InMemoryCommitStore::new());
        let writer = CommitGraph::new(Arc::clone(&store));
        let [_, _, _, d] = diamond(&writer);
        let reader = CommitGraph::new(store);
        assert_eq!(reader.generation(&d).unwrap(), 3);
    }

    #[test]
    fn is_ancestor_is_reflexive() {
        let g = graph();
        let a = commit(&g, "a", &[]);
        assert!(g.is_ancestor(&a, &a).unwrap());
    }

    #[test]
    fn is_ancestor_in_diamond() {
        let g = graph();
        let [a, b, c, d] = diamond(&g);
        assert!(g.is_ancestor(&a, &d).unwrap());
        assert!(g.is_ancestor(&b, &d).unwrap());
        assert!(g.is_ancestor(&c, &d).unwrap());
        assert!(!g.is_ancestor(&d, &a).unwrap());
        assert!(!g.is_ancestor(&b, &c).unwrap());
    }

    #[test]
    fn lca_of_siblings_is_parent() {
        let g = graph();
        let [a, b, c, _] = diamond(&g);
        assert_eq!(g.lowest_common_ancestor(&b, &c).unwrap(), Some(a));
    }

    #[test]
    fn lca_with_own_ancestor_is_that_ancestor() {
        let g = graph();
        let [_, b, _, d] = diamond(&g);
        assert_eq!(g.lowest_common_ancestor(&b, &d).unwrap(), Some(b));
        assert_eq!(g.lowest_common_ancestor(&d, &b).unwrap(), Some(b));
        assert_eq!(g.lowest_common_ancestor(&d, &d).unwrap(), Some(d));
    }

    #[test]
    fn lca_of_unrelated_roots_is_none() {
        let g = graph();
        let a = commit(&g, "a", &[]);
        let z = commit(&g, "z", &[]);
        assert_eq!(g.lowest_common_ancestor(&a, &z).unwrap(), None);
    }

    #[test]
    fn lca_in_criss_cross_is_deterministic() {
        // b and c both merged into each other: x = (b, c), y = (c, b).
        let g = graph();
        let a = commit(&g, "a", &[]);
        let b = commit(&g, "b", &[a]);
        let c = commit(&g, "c", &[a]);
        let x = commit(&g, "x", &[b, c]);
        let y = commit(&g, "y", &[c, b]);
        let lca = g.lowest_common_ancestor(&x, &y).unwrap().unwrap();
        assert!(lca == b || lca == c);
        assert_eq!(lca, b.min(c));
        assert_eq!(g.lowest_common_ancestor(&y, &x).unwrap(), Some(lca));
    }

    #[test]
    fn lca_prefers_higher_generation() {
        // a - b - c on one side, a - b - d on the other: LCA is b, not a.
        let g = graph();
        let a = commit(&g, "a", &[]);
        let b = commit(&g, "b", &[a]);
        let c = commit(&g, "c", &[b]);
        let d = commit(&g, "d", &[b]);
        assert_eq!(g.lowest_common_ancestor(&c, &d).unwrap(), Some(b));
    }

    // ----------------------------------------------------------
    // Log
    // ----------------------------------------------------------

    #[test]
    fn log_orders_children_before_parents() {
        let g = graph();
        let [a, b, c, d] = diamond(&g);
        let ids: Vec<CommitId> = g.log(&d, None).unwrap().iter().map(Commit::id).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[0], d);
        assert_eq!(ids[3], a);
        assert!(ids[1..3].contains(&b) && ids[1..3].contains(&c));
    }

    #[test]
    fn log_respects_limit() {
        let g = graph();
        let a = commit(&g, "a", &[]);
        let b = commit(&g, "b", &[a]);
        let c = commit(&g, "c", &[b]);
        let ids: Vec<CommitId> = g.log(&c, Some(2)).unwrap().iter().map(Commit::id).collect();
        assert_eq!(ids, vec![c, b]);
    }

    #[test]
    fn find_by_prefix() {
        let g = graph();
        let a = commit(&g, "a", &[]);
        let hex = a.to_hex();
        assert_eq!(g.find_by_prefix(&hex[..8]).unwrap(), vec![a]);
        assert_eq!(g.find_by_prefix(&hex.to_uppercase()[..8]).unwrap(), vec![a]);
    }
}
