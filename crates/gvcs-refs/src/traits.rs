//! The [`RefStore`] trait defining the reference storage interface.

use gvcs_types::CommitId;

use crate::error::Result;
use crate::names::HEADS_PREFIX;

/// Storage backend for named references.
///
/// Refs are addressed by canonical name (`refs/heads/<branch>`) and point at
/// commit ids. Updates go through [`RefStore::compare_and_swap`] so that two
/// writers racing on one ref cannot both succeed. Implementations must be
/// thread-safe.
pub trait RefStore: Send + Sync {
    /// Read a ref. Returns `Ok(None)` if it does not exist.
    fn read_ref(&self, name: &str) -> Result<Option<CommitId>>;

    /// Atomically set `name` to `new` if it currently equals `expected`.
    ///
    /// `expected = None` means the ref must not exist yet. On mismatch the
    /// ref is left untouched and `RefError::Stale` is returned.
    fn compare_and_swap(&self, name: &str, expected: Option<CommitId>, new: CommitId)
        -> Result<()>;

    /// Delete a ref. Returns `Ok(true)` if it existed.
    fn delete_ref(&self, name: &str) -> Result<bool>;

    /// All refs whose canonical name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, CommitId)>>;

    /// The branch HEAD names, if HEAD has been set.
    fn head(&self) -> Result<Option<String>>;

    /// Point HEAD at a branch. The branch need not exist yet.
    fn set_head(&self, branch: &str) -> Result<()>;

    /// All branch refs.
    fn branches(&self) -> Result<Vec<(String, CommitId)>> {
        self.list_refs(HEADS_PREFIX)
    }
}
