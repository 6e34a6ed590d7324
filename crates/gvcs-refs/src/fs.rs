//! Filesystem reference store.
//!
//! Layout, with the refs directory and HEAD file chosen by the caller:
//!
//! ```text
//! HEAD                   "ref: refs/heads/<branch>\n"
//! <refs>/heads/<branch>  "<64 hex>\n"
//! ```
//!
//! Updates follow git's lock-file protocol: the new value is written to
//! `<ref>.lock`, created exclusively, which is then renamed over the ref.
//! A second writer finds the lock file already present and fails with
//! `Locked`; a reader always sees either the old or the new value.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use gvcs_types::CommitId;

use crate::error::{RefError, Result};
use crate::names::validate_branch_name;
use crate::traits::RefStore;

const HEAD_PREFIX: &str = "ref: ";

/// Ref store backed by one file per ref.
#[derive(Debug, Clone)]
pub struct FsRefStore {
    /// Directory that canonical `refs/...` names resolve under.
    refs_dir: PathBuf,
    head_path: PathBuf,
}

/// Removes the lock file unless it was committed by a rename.
struct LockGuard {
    path: PathBuf,
    armed: bool,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

impl FsRefStore {
    /// Open a ref store keeping refs under `refs_dir` and HEAD at
    /// `head_path`. Directories are created as needed.
    pub fn open(refs_dir: impl Into<PathBuf>, head_path: impl Into<PathBuf>) -> Result<Self> {
        let refs_dir = refs_dir.into();
        let head_path = head_path.into();
        fs::create_dir_all(refs_dir.join("heads"))?;
        if let Some(parent) = head_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            refs_dir,
            head_path,
        })
    }

    pub fn refs_dir(&self) -> &Path {
        &self.refs_dir
    }

    fn ref_path(&self, name: &str) -> Result<PathBuf> {
        let rest = name
            .strip_prefix("refs/")
            .filter(|rest| !rest.split('/').any(|c| c.is_empty() || c == "." || c == ".."))
            .ok_or_else(|| RefError::InvalidBranchName {
                name: name.to_string(),
                reason: "not a canonical ref path".into(),
            })?;
        Ok(self.refs_dir.join(rest))
    }

    fn read_file(path: &Path, name: &str) -> Result<Option<CommitId>> {
        match fs::read_to_string(path) {
            Ok(text) => CommitId::from_hex(text.trim()).map(Some).map_err(|e| {
                RefError::Serialization(format!("malformed ref {name}: {e}"))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn collect(&self, dir: &Path, out: &mut Vec<(String, CommitId)>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.collect(&path, out)?;
                continue;
            }
            if path.extension().is_some_and(|ext| ext == "lock") {
                continue;
            }
            let Ok(rel) = path.strip_prefix(&self.refs_dir) else {
                continue;
            };
            let mut name = String::from("refs");
            for component in rel.components() {
                name.push('/');
                name.push_str(&component.as_os_str().to_string_lossy());
            }
            if let Some(id) = Self::read_file(&path, &name)? {
                out.push((name, id));
            }
        }
        Ok(())
    }
}

impl RefStore for FsRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<CommitId>> {
        Self::read_file(&self.ref_path(name)?, name)
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<CommitId>,
        new: CommitId,
    ) -> Result<()> {
        let path = self.ref_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock_path = path.with_file_name(format!(
            "{}.lock",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));

        let mut lock = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(RefError::Locked {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let mut guard = LockGuard {
            path: lock_path.clone(),
            armed: true,
        };

        let actual = Self::read_file(&path, name)?;
        if actual != expected {
            return Err(RefError::Stale {
                name: name.to_string(),
                expected,
                actual,
            });
        }

        writeln!(lock, "{}", new.to_hex())?;
        lock.sync_all()?;
        drop(lock);
        fs::rename(&lock_path, &path)?;
        guard.armed = false;
        tracing::trace!(name, to = %new.short_hex(), "updated ref file");
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        match fs::remove_file(self.ref_path(name)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, CommitId)>> {
        let mut out = Vec::new();
        self.collect(&self.refs_dir, &mut out)?;
        out.retain(|(name, _)| name.starts_with(prefix));
        out.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(out)
    }

    fn head(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.head_path) {
            Ok(text) => {
                let target = text
                    .trim()
                    .strip_prefix(HEAD_PREFIX)
                    .and_then(crate::names::branch_name)
                    .ok_or_else(|| RefError::Serialization(format!("malformed HEAD: {text:?}")))?;
                Ok(Some(target.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_head(&self, branch: &str) -> Result<()> {
        validate_branch_name(branch)?;
        let dir = self.head_path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        writeln!(tmp, "{HEAD_PREFIX}{}", crate::names::branch_ref(branch))?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.head_path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gvcs_types::ObjectId;

    fn cid(tag: &str) -> CommitId {
        CommitId::from_object_id(ObjectId::from_bytes(tag.as_bytes()))
    }

    fn open(dir: &Path) -> FsRefStore {
        FsRefStore::open(dir.join("refs"), dir.join("HEAD")).unwrap()
    }

    #[test]
    fn refs_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open(dir.path());
            store.compare_and_swap("refs/heads/main", None, cid("a")).unwrap();
            store
                .compare_and_swap("refs/heads/feature/x", None, cid("b"))
                .unwrap();
            store.set_head("main").unwrap();
        }
        let store = open(dir.path());
        assert_eq!(store.read_ref("refs/heads/main").unwrap(), Some(cid("a")));
        assert_eq!(store.head().unwrap().as_deref(), Some("main"));
        let names: Vec<String> = store.branches().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["refs/heads/feature/x", "refs/heads/main"]);
    }

    #[test]
    fn file_format_is_git_like() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        store.compare_and_swap("refs/heads/main", None, cid("a")).unwrap();
        store.set_head("main").unwrap();
        let head = fs::read_to_string(dir.path().join("HEAD")).unwrap();
        assert_eq!(head, "ref: refs/heads/main\n");
        let value = fs::read_to_string(dir.path().join("refs/heads/main")).unwrap();
        assert_eq!(value.trim(), cid("a").to_hex());
    }

    #[test]
    fn stale_cas_leaves_ref_and_no_lock() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        store.compare_and_swap("refs/heads/main", None, cid("a")).unwrap();
        let err = store
            .compare_and_swap("refs/heads/main", Some(cid("b")), cid("c"))
            .unwrap_err();
        assert!(matches!(err, RefError::Stale { .. }));
        assert_eq!(store.read_ref("refs/heads/main").unwrap(), Some(cid("a")));
        assert!(!dir.path().join("refs/heads/main.lock").exists());
    }

    #[test]
    fn held_lock_blocks_writers() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        store.compare_and_swap("refs/heads/main", None, cid("a")).unwrap();
        fs::write(dir.path().join("refs/heads/main.lock"), b"").unwrap();
        let err = store
            .compare_and_swap("refs/heads/main", Some(cid("a")), cid("b"))
            .unwrap_err();
        assert!(matches!(err, RefError::Locked { .. }));
        // Lock files never show up as refs.
        assert_eq!(store.branches().unwrap().len(), 1);
    }

    #[test]
    fn delete_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        assert_eq!(store.head().unwrap(), None);
        store.compare_and_swap("refs/heads/tmp", None, cid("a")).unwrap();
        assert!(store.delete_ref("refs/heads/tmp").unwrap());
        assert!(!store.delete_ref("refs/heads/tmp").unwrap());
    }

    #[test]
    fn path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        assert!(store.read_ref("refs/heads/../../etc").is_err());
    }
}
