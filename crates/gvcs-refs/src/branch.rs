//! Branch operations layered over a [`RefStore`] and the commit graph.

use std::sync::Arc;

use tracing::{debug, info};

use gvcs_dag::{Commit, CommitGraph};
use gvcs_types::CommitId;

use crate::error::{RefError, Result};
use crate::names::{branch_name, branch_ref, validate_branch_name};
use crate::traits::RefStore;
use crate::types::{BranchInfo, MoveMode};

/// Named, movable pointers into the commit graph.
#[derive(Clone)]
pub struct BranchManager {
    refs: Arc<dyn RefStore>,
    graph: CommitGraph,
}

impl BranchManager {
    pub fn new(refs: Arc<dyn RefStore>, graph: CommitGraph) -> Self {
        Self { refs, graph }
    }

    pub fn refs(&self) -> &Arc<dyn RefStore> {
        &self.refs
    }

    pub fn graph(&self) -> &CommitGraph {
        &self.graph
    }

    /// Create `name` pointing at `from`, which must be a stored commit.
    pub fn create_branch(&self, name: &str, from: CommitId) -> Result<()> {
        validate_branch_name(name)?;
        // Surfaces DagError::NotFound for an unknown commit.
        self.graph.get(&from)?;
        match self.refs.compare_and_swap(&branch_ref(name), None, from) {
            Ok(()) => {
                info!(branch = name, at = %from.short_hex(), "created branch");
                Ok(())
            }
            Err(RefError::Stale { .. }) => Err(RefError::AlreadyExists {
                name: name.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// The commit `name` points at, or `None` if the branch does not exist.
    pub fn read_branch(&self, name: &str) -> Result<Option<CommitId>> {
        self.refs.read_ref(&branch_ref(name))
    }

    /// The commit id at the tip of `name`.
    pub fn current_commit_id(&self, name: &str) -> Result<CommitId> {
        self.read_branch(name)?.ok_or_else(|| RefError::NotFound {
            name: name.to_string(),
        })
    }

    /// The commit at the tip of `name`.
    pub fn current_commit(&self, name: &str) -> Result<Commit> {
        let id = self.current_commit_id(name)?;
        Ok(self.graph.get(&id)?)
    }

    /// Move `name` to `to` and return the commit it pointed at before.
    ///
    /// In [`MoveMode::FastForward`] the move is refused unless `to`
    /// descends from the current tip. A concurrent update between the read
    /// and the swap surfaces as `Stale`.
    pub fn move_ref(&self, name: &str, to: CommitId, mode: MoveMode) -> Result<CommitId> {
        self.graph.get(&to)?;
        let current = self.current_commit_id(name)?;
        if mode == MoveMode::FastForward && !self.graph.is_ancestor(&current, &to)? {
            return Err(RefError::NonFastForward {
                name: name.to_string(),
                current,
                target: to,
            });
        }
        self.refs
            .compare_and_swap(&branch_ref(name), Some(current), to)?;
        debug!(
            branch = name,
            from = %current.short_hex(),
            to = %to.short_hex(),
            ?mode,
            "moved branch"
        );
        Ok(current)
    }

    /// Delete a branch. The checked-out branch cannot be deleted.
    ///
    /// Only the pointer goes away; its commits stay in the graph.
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        if self.refs.head()?.as_deref() == Some(name) {
            return Err(RefError::DeleteCurrentBranch {
                name: name.to_string(),
            });
        }
        if !self.refs.delete_ref(&branch_ref(name))? {
            return Err(RefError::NotFound {
                name: name.to_string(),
            });
        }
        info!(branch = name, "deleted branch");
        Ok(())
    }

    /// All branches, sorted by name.
    pub fn list_branches(&self) -> Result<Vec<BranchInfo>> {
        let head = self.refs.head()?;
        Ok(self
            .refs
            .branches()?
            .into_iter()
            .filter_map(|(canonical, commit)| {
                let name = branch_name(&canonical)?.to_string();
                let is_current = head.as_deref() == Some(name.as_str());
                Some(BranchInfo {
                    name,
                    commit,
                    is_current,
                })
            })
            .collect())
    }

    /// The branch HEAD names.
    pub fn head_branch(&self) -> Result<String> {
        self.refs.head()?.ok_or(RefError::NoHead)
    }

    /// Point HEAD at an existing branch.
    pub fn switch(&self, name: &str) -> Result<()> {
        self.current_commit_id(name)?;
        self.refs.set_head(name)
    }
}

impl std::fmt::Debug for BranchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchManager").finish_non_exhaustive()
    }
}
