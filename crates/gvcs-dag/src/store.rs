use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use gvcs_types::CommitId;

use crate::commit::Commit;
use crate::error::DagResult;

/// Append-only table of commits keyed by id.
///
/// There is no update. Writing a commit that already exists is a no-op.
/// [`CommitStore::remove`] exists only to take back a commit that was
/// never published to a ref.
pub trait CommitStore: Send + Sync {
    /// Read a commit. Returns `Ok(None)` if absent, `Corrupt` if the stored
    /// content does not hash to `id`.
    fn read(&self, id: &CommitId) -> DagResult<Option<Commit>>;

    /// Durably store a commit.
    fn write(&self, commit: &Commit) -> DagResult<()>;

    /// Check whether a commit exists.
    fn exists(&self, id: &CommitId) -> DagResult<bool>;

    /// Every stored commit id, sorted.
    fn list(&self) -> DagResult<Vec<CommitId>>;

    /// Delete a commit. Returns `false` if it was absent.
    fn remove(&self, id: &CommitId) -> DagResult<bool>;
}

impl<S: CommitStore + ?Sized> CommitStore for Arc<S> {
    fn read(&self, id: &CommitId) -> DagResult<Option<Commit>> {
        (**self).read(id)
    }

    fn write(&self, commit: &Commit) -> DagResult<()> {
        (**self).write(commit)
    }

    fn exists(&self, id: &CommitId) -> DagResult<bool> {
        (**self).exists(id)
    }

    fn list(&self) -> DagResult<Vec<CommitId>> {
        (**self).list()
    }

    fn remove(&self, id: &CommitId) -> DagResult<bool> {
        (**self).remove(id)
    }
}

/// In-memory commit table for tests and embedding.
#[derive(Default)]
pub struct InMemoryCommitStore {
    commits: RwLock<HashMap<CommitId, Commit>>,
}

impl InMemoryCommitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commits stored.
    pub fn len(&self) -> usize {
        self.commits
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CommitStore for InMemoryCommitStore {
    fn read(&self, id: &CommitId) -> DagResult<Option<Commit>> {
        let map = self.commits.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(id).cloned())
    }

    fn write(&self, commit: &Commit) -> DagResult<()> {
        let mut map = self.commits.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(commit.id()).or_insert_with(|| commit.clone());
        Ok(())
    }

    fn exists(&self, id: &CommitId) -> DagResult<bool> {
        let map = self.commits.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.contains_key(id))
    }

    fn list(&self) -> DagResult<Vec<CommitId>> {
        let map = self.commits.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<CommitId> = map.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    fn remove(&self, id: &CommitId) -> DagResult<bool> {
        let mut map = self.commits.write().unwrap_or_else(PoisonError::into_inner);
        Ok(map.remove(id).is_some())
    }
}

impl std::fmt::Debug for InMemoryCommitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCommitStore")
            .field("commit_count", &self.len())
            .finish()
    }
}
