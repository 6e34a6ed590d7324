use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use gvcs_dag::{Commit, CommitGraph, FsCommitStore, InMemoryCommitStore};
use gvcs_index::{CommitOptions, StagingArea, StagingState};
use gvcs_merge::{ConflictRecord, ConflictedMerge, MergeEngine, MergeOutcome, MergePolicy, Resolution};
use gvcs_refs::{
    branch_ref, validate_branch_name, BranchInfo, BranchManager, FsRefStore, InMemoryRefStore,
    MoveMode, RefError, RefStore,
};
use gvcs_snapshot::{diff, materialize, materialize_into, Graph, GraphBackend, Manifest, SnapshotDiff};
use gvcs_store::{FsObjectStore, InMemoryObjectStore, ObjectStore};
use gvcs_types::{Author, CommitId, EntityId};

use crate::config::RepoConfig;
use crate::error::{SdkError, SdkResult};

const HEAD_FILE: &str = "HEAD";
const CONFIG_FILE: &str = "config.toml";
const STAGE_FILE: &str = "STAGE";

/// Shortest hex prefix accepted as a commit revision.
pub const MIN_PREFIX_LEN: usize = 4;

/// A graph repository: object store, commit graph and branches behind one
/// handle.
///
/// Every operation that advances a branch (commit, merge, branch moves)
/// takes that branch's writer lock, checks the tip it started from and
/// publishes with a ref compare-and-swap, so a commit and its ref update
/// happen as one step.
pub struct Repository {
    dir: Option<PathBuf>,
    config: RepoConfig,
    store: Arc<dyn ObjectStore>,
    graph: CommitGraph,
    branches: BranchManager,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Repository {
    /// A repository that lives only in memory, with the default branch on
    /// an empty root commit.
    pub fn in_memory(config: RepoConfig) -> SdkResult<Self> {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        let graph = CommitGraph::new(Arc::new(InMemoryCommitStore::new()));
        let refs: Arc<dyn RefStore> = Arc::new(InMemoryRefStore::new());
        let repo = Self::assemble(None, config, store, graph, refs);
        repo.bootstrap()?;
        Ok(repo)
    }

    /// Create a repository under `path/<repo_dir_name>`.
    pub fn init(path: impl AsRef<Path>, config: RepoConfig) -> SdkResult<Self> {
        let dir = path.as_ref().join(&config.repo_dir_name);
        if dir.join(HEAD_FILE).exists() {
            return Err(SdkError::AlreadyInitialized(dir.display().to_string()));
        }
        std::fs::create_dir_all(config.logs_dir(&dir))?;
        config.save(&dir.join(CONFIG_FILE))?;
        let repo = Self::open_dir(dir, config)?;
        repo.bootstrap()?;
        info!(path = %path.as_ref().display(), "initialized repository");
        Ok(repo)
    }

    /// Open the repository under `path`.
    ///
    /// The directory named by the environment's `repo_dir_name` (`.gvcs`
    /// by default) is tried first, then any child directory whose own
    /// `config.toml` names it. The stored config is read and `GRAPHVCS_*`
    /// environment variables are applied on top.
    pub fn open(path: impl AsRef<Path>) -> SdkResult<Self> {
        Self::open_with_env(path.as_ref(), |key| std::env::var(key).ok())
    }

    fn open_with_env(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> SdkResult<Self> {
        let preferred = RepoConfig::from_lookup(&lookup)?.repo_dir_name;
        let dir = locate(path, &preferred)?
            .ok_or_else(|| SdkError::NotInitialized(path.display().to_string()))?;
        let config_path = dir.join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            RepoConfig::load(&config_path)?
        } else {
            RepoConfig::default()
        };
        config.apply_env(&lookup)?;
        if let Some(name) = dir.file_name() {
            config.repo_dir_name = name.to_string_lossy().into_owned();
        }
        debug!(dir = %dir.display(), "opening repository");
        Self::open_dir(dir, config)
    }

    fn open_dir(dir: PathBuf, config: RepoConfig) -> SdkResult<Self> {
        let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::open(
            dir.join(&config.objects_dir_name),
            config.compression_enabled,
        )?);
        let graph = CommitGraph::new(Arc::new(FsCommitStore::open(
            dir.join(&config.commits_dir_name),
        )?));
        let refs: Arc<dyn RefStore> = Arc::new(FsRefStore::open(
            dir.join(&config.refs_dir_name),
            dir.join(HEAD_FILE),
        )?);
        Ok(Self::assemble(Some(dir), config, store, graph, refs))
    }

    fn assemble(
        dir: Option<PathBuf>,
        config: RepoConfig,
        store: Arc<dyn ObjectStore>,
        graph: CommitGraph,
        refs: Arc<dyn RefStore>,
    ) -> Self {
        Self {
            dir,
            config,
            store,
            branches: BranchManager::new(refs, graph.clone()),
            graph,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Put the default branch on an empty root commit and check it out.
    fn bootstrap(&self) -> SdkResult<()> {
        let branch = self.config.default_branch.clone();
        let commit = self.empty_root_commit("Initial commit")?;
        self.branches.create_branch(&branch, commit.id())?;
        self.branches.refs().set_head(&branch)?;
        Ok(())
    }

    fn empty_root_commit(&self, message: &str) -> SdkResult<Commit> {
        let root = Manifest::new(self.store.as_ref()).empty()?;
        Ok(self
            .graph
            .create_commit(root, Vec::new(), self.default_author(), message, now_ms())?)
    }

    /// The configured user, or a placeholder identity.
    pub fn default_author(&self) -> Author {
        self.config
            .author()
            .unwrap_or_else(|| Author::new("graphvcs", "graphvcs@localhost"))
    }

    fn branch_lock(&self, branch: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(branch.to_string()).or_default().clone()
    }

    /// Swap `branch` from `from` to `to`; the branch lock must be held.
    fn publish(&self, branch: &str, from: CommitId, to: CommitId) -> SdkResult<()> {
        self.branches
            .refs()
            .compare_and_swap(&branch_ref(branch), Some(from), to)?;
        debug!(branch, from = %from.short_hex(), to = %to.short_hex(), "advanced branch");
        Ok(())
    }

    /// Publish a commit created for this update, deleting it again if the
    /// ref swap fails so a lost race leaves no commit behind.
    fn publish_new(&self, branch: &str, from: CommitId, commit: &Commit) -> SdkResult<()> {
        let err = match self.publish(branch, from, commit.id()) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        let published = self
            .branches
            .list_branches()?
            .iter()
            .any(|info| info.commit == commit.id());
        if !published {
            self.graph.discard_unpublished(&commit.id())?;
        }
        Err(err)
    }

    // ---- Staging and commits ----

    /// A fresh staging area on the tip of `branch`.
    pub fn checkout(&self, branch: &str) -> SdkResult<StagingArea> {
        let commit = self.branches.current_commit(branch)?;
        Ok(StagingArea::new(
            Arc::clone(&self.store),
            branch,
            commit.id(),
            *commit.snapshot(),
            self.config.inline_threshold,
        ))
    }

    /// A fresh staging area on the branch HEAD names.
    pub fn checkout_head(&self) -> SdkResult<StagingArea> {
        self.checkout(&self.head_branch()?)
    }

    pub fn commit(
        &self,
        staging: &mut StagingArea,
        author: Author,
        message: impl Into<String>,
    ) -> SdkResult<Commit> {
        self.commit_with(staging, author, message, CommitOptions::default())
    }

    /// Commit the staged changes and advance the staging area's branch.
    ///
    /// Fails with a non-fast-forward ref error, leaving the branch and the
    /// staging area untouched, if the branch moved since the staging area
    /// was checked out.
    pub fn commit_with(
        &self,
        staging: &mut StagingArea,
        author: Author,
        message: impl Into<String>,
        options: CommitOptions,
    ) -> SdkResult<Commit> {
        let branch = staging.branch().to_string();
        let lock = self.branch_lock(&branch);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let tip = self.branches.current_commit_id(&branch)?;
        if tip != staging.base_commit() {
            return Err(RefError::NonFastForward {
                name: branch,
                current: tip,
                target: staging.base_commit(),
            }
            .into());
        }
        let commit = staging.write_commit(&self.graph, author, message, &options)?;
        self.publish_new(&branch, tip, &commit)?;
        staging.reset_to(&commit);
        Ok(commit)
    }

    /// Persist a staging area to the repository's `STAGE` file.
    pub fn save_staging(&self, staging: &StagingArea) -> SdkResult<()> {
        let dir = self.require_dir()?;
        let bytes = staging.to_state().to_bytes()?;
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        file.persist(dir.join(STAGE_FILE))
            .map_err(|e| SdkError::Io(e.error))?;
        debug!(branch = staging.branch(), "saved staging area");
        Ok(())
    }

    /// The staging area saved by [`Repository::save_staging`], if any.
    pub fn load_staging(&self) -> SdkResult<Option<StagingArea>> {
        let path = self.require_dir()?.join(STAGE_FILE);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state = StagingState::from_bytes(&bytes)?;
        Ok(Some(StagingArea::from_state(Arc::clone(&self.store), state)?))
    }

    /// Remove the saved staging area. Returns `true` if one existed.
    pub fn clear_staging(&self) -> SdkResult<bool> {
        match std::fs::remove_file(self.require_dir()?.join(STAGE_FILE)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn require_dir(&self) -> SdkResult<&Path> {
        self.dir.as_deref().ok_or_else(|| {
            SdkError::InvalidOperation("in-memory repository has no staging file".into())
        })
    }

    // ---- Branch operations ----

    pub fn create_branch(&self, name: &str, from: CommitId) -> SdkResult<()> {
        Ok(self.branches.create_branch(name, from)?)
    }

    /// Create `name` on a new empty root commit, unrelated to any history.
    pub fn create_orphan_branch(&self, name: &str) -> SdkResult<Commit> {
        validate_branch_name(name)?;
        let commit = self.empty_root_commit(&format!("Start {name}"))?;
        self.branches.create_branch(name, commit.id())?;
        Ok(commit)
    }

    /// Move `name` to `to` and return its previous tip.
    pub fn move_branch(&self, name: &str, to: CommitId, mode: MoveMode) -> SdkResult<CommitId> {
        let lock = self.branch_lock(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.branches.move_ref(name, to, mode)?)
    }

    /// Point `name` back at one of its own ancestors.
    ///
    /// Later commits stay in the graph; they are only no longer reachable
    /// from this branch.
    pub fn rollback(&self, name: &str, to: CommitId) -> SdkResult<CommitId> {
        let lock = self.branch_lock(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.branches.current_commit_id(name)?;
        if !self.graph.is_ancestor(&to, &current)? {
            return Err(SdkError::InvalidOperation(format!(
                "{} is not in the history of {name}",
                to.short_hex()
            )));
        }
        let previous = self.branches.move_ref(name, to, MoveMode::Force)?;
        info!(branch = name, from = %previous.short_hex(), to = %to.short_hex(), "rolled back branch");
        Ok(previous)
    }

    pub fn delete_branch(&self, name: &str) -> SdkResult<()> {
        Ok(self.branches.delete_branch(name)?)
    }

    pub fn current_commit(&self, branch: &str) -> SdkResult<Commit> {
        Ok(self.branches.current_commit(branch)?)
    }

    pub fn branches(&self) -> SdkResult<Vec<BranchInfo>> {
        Ok(self.branches.list_branches()?)
    }

    pub fn head_branch(&self) -> SdkResult<String> {
        Ok(self.branches.head_branch()?)
    }

    pub fn switch(&self, name: &str) -> SdkResult<()> {
        self.branches.switch(name)?;
        info!(branch = name, "switched branch");
        Ok(())
    }

    // ---- Merge ----

    /// Merge the tip of `theirs_branch` into `ours_branch`.
    ///
    /// Both tips are pinned when the merge starts. A fast-forward or clean
    /// merge advances `ours_branch`; a conflicted merge changes no ref and
    /// is completed with [`Repository::complete_merge`].
    pub fn merge(
        &self,
        ours_branch: &str,
        theirs_branch: &str,
        author: Author,
        message: impl Into<String>,
        policy: &dyn MergePolicy,
    ) -> SdkResult<MergeOutcome> {
        let lock = self.branch_lock(ours_branch);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let ours = self.branches.current_commit_id(ours_branch)?;
        let theirs = self.branches.current_commit_id(theirs_branch)?;
        let outcome = MergeEngine::new(self.store.as_ref(), &self.graph)
            .with_policy(policy)
            .with_threshold(self.config.inline_threshold)
            .merge(ours, theirs, author, message, now_ms())?;

        match &outcome {
            MergeOutcome::FastForward(to) => self.publish(ours_branch, ours, *to)?,
            MergeOutcome::Clean(commit) => self.publish_new(ours_branch, ours, commit)?,
            MergeOutcome::UpToDate(_) | MergeOutcome::Conflicted(_) => {}
        }
        info!(ours = ours_branch, theirs = theirs_branch, phase = %outcome.phase(), "merge finished");
        Ok(outcome)
    }

    /// Apply a resolution to a conflicted merge of this repository.
    pub fn resolve_conflict(
        &self,
        merge: &mut ConflictedMerge,
        id: &EntityId,
        resolution: Resolution,
    ) -> SdkResult<Vec<ConflictRecord>> {
        Ok(merge.resolve(self.store.as_ref(), id, resolution)?)
    }

    /// Commit a fully resolved merge and advance `branch` to it.
    ///
    /// `branch` must still point at the merge's `ours` commit.
    pub fn complete_merge(
        &self,
        branch: &str,
        merge: ConflictedMerge,
        author: Author,
        message: impl Into<String>,
    ) -> SdkResult<Commit> {
        let lock = self.branch_lock(branch);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let tip = self.branches.current_commit_id(branch)?;
        if tip != merge.ours() {
            return Err(RefError::NonFastForward {
                name: branch.to_string(),
                current: tip,
                target: merge.ours(),
            }
            .into());
        }
        let commit = merge.finish(self.store.as_ref(), &self.graph, author, message, now_ms())?;
        self.publish_new(branch, tip, &commit)?;
        Ok(commit)
    }

    // ---- Reads ----

    /// The full graph recorded by `commit`.
    pub fn materialize(&self, commit: &CommitId) -> SdkResult<Graph> {
        let commit = self.graph.get(commit)?;
        Ok(materialize(self.store.as_ref(), commit.snapshot())?)
    }

    /// Stream the graph recorded by `commit` into a backend.
    pub fn materialize_into(
        &self,
        commit: &CommitId,
        backend: &mut dyn GraphBackend,
    ) -> SdkResult<()> {
        let commit = self.graph.get(commit)?;
        Ok(materialize_into(self.store.as_ref(), commit.snapshot(), backend)?)
    }

    /// Entity-level changes from commit `a` to commit `b`.
    pub fn diff(&self, a: &CommitId, b: &CommitId) -> SdkResult<SnapshotDiff> {
        let a = self.graph.get(a)?;
        let b = self.graph.get(b)?;
        Ok(diff(self.store.as_ref(), a.snapshot(), b.snapshot())?)
    }

    /// History of `branch`, newest first.
    pub fn log(&self, branch: &str, limit: Option<usize>) -> SdkResult<Vec<Commit>> {
        let tip = self.branches.current_commit_id(branch)?;
        Ok(self.graph.log(&tip, limit)?)
    }

    /// Resolve `HEAD`, a branch name, or a hex commit id prefix of at least
    /// [`MIN_PREFIX_LEN`] characters.
    pub fn resolve_rev(&self, rev: &str) -> SdkResult<CommitId> {
        if rev == HEAD_FILE {
            return Ok(self.branches.current_commit_id(&self.head_branch()?)?);
        }
        if validate_branch_name(rev).is_ok() {
            if let Some(id) = self.branches.read_branch(rev)? {
                return Ok(id);
            }
        }
        if rev.len() < MIN_PREFIX_LEN || !rev.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SdkError::UnknownRevision(rev.to_string()));
        }
        let mut matches = self.graph.find_by_prefix(rev)?;
        match matches.len() {
            0 => Err(SdkError::UnknownRevision(rev.to_string())),
            1 => Ok(matches.remove(0)),
            n => Err(SdkError::AmbiguousRevision {
                rev: rev.to_string(),
                matches: n,
            }),
        }
    }

    // ---- Accessors ----

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// The repository directory, or `None` for an in-memory repository.
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn graph(&self) -> &CommitGraph {
        &self.graph
    }

    pub fn branch_manager(&self) -> &BranchManager {
        &self.branches
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("dir", &self.dir)
            .field("default_branch", &self.config.default_branch)
            .finish_non_exhaustive()
    }
}

/// The repository directory under `path`: `preferred` if it holds a
/// repository, else a child directory whose config names it.
fn locate(path: &Path, preferred: &str) -> SdkResult<Option<PathBuf>> {
    let dir = path.join(preferred);
    if dir.join(HEAD_FILE).is_file() {
        return Ok(Some(dir));
    }
    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let candidate = entry?.path();
        let config_path = candidate.join(CONFIG_FILE);
        if !candidate.join(HEAD_FILE).is_file() || !config_path.is_file() {
            continue;
        }
        let Ok(config) = RepoConfig::load(&config_path) else {
            debug!(dir = %candidate.display(), "skipping directory with unreadable config");
            continue;
        };
        if candidate
            .file_name()
            .is_some_and(|name| name == config.repo_dir_name.as_str())
        {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gvcs_index::StagingError;
    use gvcs_merge::ThreeWayPolicy;
    use gvcs_snapshot::Node;
    use gvcs_types::NodeId;

    fn author() -> Author {
        Author::new("Ada", "ada@example.org")
    }

    fn node(id: &str) -> Node {
        Node::new(NodeId::new(id).unwrap()).with_label("Thing")
    }

    fn commit_node(repo: &Repository, branch: &str, id: &str) -> Commit {
        let mut staging = repo.checkout(branch).unwrap();
        staging.add_or_update_node(node(id)).unwrap();
        repo.commit(&mut staging, author(), format!("add {id}")).unwrap()
    }

    #[test]
    fn in_memory_starts_on_empty_root() {
        let repo = Repository::in_memory(RepoConfig::default()).unwrap();
        assert_eq!(repo.head_branch().unwrap(), "main");
        let root = repo.current_commit("main").unwrap();
        assert!(root.is_root());
        assert!(repo.materialize(&root.id()).unwrap().is_empty());
        assert!(repo.path().is_none());
    }

    #[test]
    fn commit_advances_branch() {
        let repo = Repository::in_memory(RepoConfig::default()).unwrap();
        let root = repo.current_commit("main").unwrap();
        let commit = commit_node(&repo, "main", "a");
        assert_eq!(commit.parents(), &[root.id()]);
        assert_eq!(repo.current_commit("main").unwrap().id(), commit.id());
        assert_eq!(repo.log("main", None).unwrap().len(), 2);
    }

    #[test]
    fn empty_commit_is_rejected() {
        let repo = Repository::in_memory(RepoConfig::default()).unwrap();
        let mut staging = repo.checkout("main").unwrap();
        let err = repo.commit(&mut staging, author(), "nothing").unwrap_err();
        assert!(matches!(err, SdkError::Staging(StagingError::EmptyCommit)));

        let forced = repo
            .commit_with(&mut staging, author(), "marker", CommitOptions::forced())
            .unwrap();
        assert_eq!(repo.current_commit("main").unwrap().id(), forced.id());
    }

    #[test]
    fn stale_staging_cannot_commit() {
        let repo = Repository::in_memory(RepoConfig::default()).unwrap();
        let mut stale = repo.checkout("main").unwrap();
        stale.add_or_update_node(node("late")).unwrap();
        let tip = commit_node(&repo, "main", "early");

        let err = repo.commit(&mut stale, author(), "late").unwrap_err();
        assert!(err.is_non_fast_forward());
        assert_eq!(repo.current_commit("main").unwrap().id(), tip.id());
        assert!(!stale.is_clean());
    }

    #[test]
    fn concurrent_commits_on_one_base_admit_one_winner() {
        let repo = Arc::new(Repository::in_memory(RepoConfig::default()).unwrap());
        let handles: Vec<_> = ["x", "y"]
            .into_iter()
            .map(|id| {
                let mut staging = repo.checkout("main").unwrap();
                staging.add_or_update_node(node(id)).unwrap();
                let repo = Arc::clone(&repo);
                std::thread::spawn(move || repo.commit(&mut staging, author(), id).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(repo.log("main", None).unwrap().len(), 2);
    }

    #[test]
    fn lost_ref_race_leaves_no_commit_behind() {
        let repo = Repository::in_memory(RepoConfig::default()).unwrap();
        let base = repo.current_commit("main").unwrap();
        let mut staging = repo.checkout("main").unwrap();
        staging.add_or_update_node(node("late")).unwrap();
        let loser = staging
            .write_commit(&repo.graph, author(), "late", &CommitOptions::default())
            .unwrap();
        let winner = commit_node(&repo, "main", "early");

        let err = repo.publish_new("main", base.id(), &loser).unwrap_err();
        assert!(matches!(err, SdkError::Ref(RefError::Stale { .. })));
        assert!(!repo.graph().exists(&loser.id()).unwrap());
        assert!(repo.graph().find_by_prefix(&loser.id().to_hex()[..8]).unwrap().is_empty());
        assert_eq!(repo.current_commit("main").unwrap(), winner);
        assert_eq!(repo.graph().list().unwrap().len(), 2);
    }

    #[test]
    fn resolve_rev_forms() {
        let repo = Repository::in_memory(RepoConfig::default()).unwrap();
        let commit = commit_node(&repo, "main", "a");
        assert_eq!(repo.resolve_rev("HEAD").unwrap(), commit.id());
        assert_eq!(repo.resolve_rev("main").unwrap(), commit.id());
        assert_eq!(repo.resolve_rev(&commit.id().to_hex()).unwrap(), commit.id());
        assert_eq!(repo.resolve_rev(&commit.id().to_hex()[..12]).unwrap(), commit.id());
        assert!(matches!(
            repo.resolve_rev("nope"),
            Err(SdkError::UnknownRevision(_))
        ));
        assert!(matches!(
            repo.resolve_rev("ab"),
            Err(SdkError::UnknownRevision(_))
        ));
    }

    #[test]
    fn rollback_requires_an_ancestor() {
        let repo = Repository::in_memory(RepoConfig::default()).unwrap();
        let first = commit_node(&repo, "main", "a");
        let second = commit_node(&repo, "main", "b");
        let orphan = repo.create_orphan_branch("other").unwrap();

        assert!(matches!(
            repo.rollback("main", orphan.id()),
            Err(SdkError::InvalidOperation(_))
        ));
        assert_eq!(repo.rollback("main", first.id()).unwrap(), second.id());
        assert_eq!(repo.current_commit("main").unwrap().id(), first.id());
        assert!(repo.graph().exists(&second.id()).unwrap());
    }

    #[test]
    fn merge_of_unrelated_branches_fails() {
        let repo = Repository::in_memory(RepoConfig::default()).unwrap();
        commit_node(&repo, "main", "a");
        repo.create_orphan_branch("other").unwrap();
        commit_node(&repo, "other", "b");
        let err = repo
            .merge("main", "other", author(), "m", &ThreeWayPolicy)
            .unwrap_err();
        assert!(matches!(
            err,
            SdkError::Merge(gvcs_merge::MergeError::Unrelated { .. })
        ));
    }

    #[test]
    fn in_memory_has_no_staging_file() {
        let repo = Repository::in_memory(RepoConfig::default()).unwrap();
        let staging = repo.checkout("main").unwrap();
        assert!(matches!(
            repo.save_staging(&staging),
            Err(SdkError::InvalidOperation(_))
        ));
    }

    // ---------------------------------------------------------------
    // On disk
    // ---------------------------------------------------------------

    #[test]
    fn init_lays_out_directory() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path(), RepoConfig::default()).unwrap();
        let gvcs = dir.path().join(".gvcs");
        assert_eq!(repo.path(), Some(gvcs.as_path()));
        for entry in ["objects", "commits", "logs", "refs/heads/main", "HEAD", "config.toml"] {
            assert!(gvcs.join(entry).exists(), "missing {entry}");
        }
        assert!(matches!(
            Repository::init(dir.path(), RepoConfig::default()),
            Err(SdkError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn open_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Repository::open(dir.path()),
            Err(SdkError::NotInitialized(_))
        ));
    }

    #[test]
    fn reopen_sees_history_and_branches() {
        let dir = tempfile::tempdir().unwrap();
        let commit = {
            let repo = Repository::init(dir.path(), RepoConfig::default()).unwrap();
            let commit = commit_node(&repo, "main", "a");
            repo.create_branch("feature", commit.id()).unwrap();
            repo.switch("feature").unwrap();
            commit
        };
        let repo = Repository::open(dir.path()).unwrap();
        assert_eq!(repo.head_branch().unwrap(), "feature");
        assert_eq!(repo.resolve_rev("feature").unwrap(), commit.id());
        let graph = repo.materialize(&commit.id()).unwrap();
        assert!(graph.node(&NodeId::new("a").unwrap()).is_some());
    }

    #[test]
    fn open_finds_a_custom_repo_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = RepoConfig {
            repo_dir_name: ".graph".into(),
            ..RepoConfig::default()
        };
        let commit = {
            let repo = Repository::init(dir.path(), config).unwrap();
            commit_node(&repo, "main", "a")
        };
        std::fs::create_dir(dir.path().join("unrelated")).unwrap();

        let repo = Repository::open_with_env(dir.path(), |_| None).unwrap();
        let expected = dir.path().join(".graph");
        assert_eq!(repo.path(), Some(expected.as_path()));
        assert_eq!(repo.config().repo_dir_name, ".graph");
        assert_eq!(repo.resolve_rev("main").unwrap(), commit.id());

        let named = Repository::open_with_env(dir.path(), |key| {
            (key == "GRAPHVCS_REPO_DIR_NAME").then(|| ".graph".to_string())
        })
        .unwrap();
        assert_eq!(named.path(), Some(expected.as_path()));
    }

    #[test]
    fn staging_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let repo = Repository::init(dir.path(), RepoConfig::default()).unwrap();
            let mut staging = repo.checkout("main").unwrap();
            staging.add_or_update_node(node("pending")).unwrap();
            repo.save_staging(&staging).unwrap();
        }
        let repo = Repository::open(dir.path()).unwrap();
        let mut staging = repo.load_staging().unwrap().unwrap();
        assert!(staging.get_node(&NodeId::new("pending").unwrap()).unwrap().is_some());
        repo.commit(&mut staging, author(), "resume").unwrap();
        assert!(repo.clear_staging().unwrap());
        assert!(repo.load_staging().unwrap().is_none());
    }
}
