//! Filesystem commit table: one `<hex>.json` file per commit.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use gvcs_types::CommitId;

use crate::commit::Commit;
use crate::error::DagResult;
use crate::store::CommitStore;

/// Commit store keeping each commit as pretty JSON in its own file.
///
/// A file is written to a temporary name and linked into place without
/// clobbering, so a commit file is either absent or complete.
#[derive(Debug, Clone)]
pub struct FsCommitStore {
    root: PathBuf,
}

impl FsCommitStore {
    /// Open (creating if needed) a commit directory.
    pub fn open(root: impl Into<PathBuf>) -> DagResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, id: &CommitId) -> PathBuf {
        self.root.join(format!("{}.json", id.to_hex()))
    }
}

impl CommitStore for FsCommitStore {
    fn read(&self, id: &CommitId) -> DagResult<Option<Commit>> {
        match std::fs::read(self.path(id)) {
            Ok(bytes) => Commit::from_json(id, &bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, commit: &Commit) -> DagResult<()> {
        let path = self.path(&commit.id());
        if path.exists() {
            return Ok(());
        }
        let bytes = commit.to_json()?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.error.into()),
        }
    }

    fn exists(&self, id: &CommitId) -> DagResult<bool> {
        Ok(self.path(id).is_file())
    }

    fn list(&self) -> DagResult<Vec<CommitId>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some(id) = name
                .strip_suffix(".json")
                .and_then(|hex| CommitId::from_hex(hex).ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn remove(&self, id: &CommitId) -> DagResult<bool> {
        match std::fs::remove_file(self.path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::CommitContent;
    use crate::error::DagError;
    use gvcs_types::{Author, ObjectId};

    fn commit(message: &str) -> Commit {
        Commit::seal(CommitContent {
            snapshot: ObjectId::from_bytes(b"snap"),
            parents: vec![],
            author: Author::new("t", "t@example.org"),
            timestamp_ms: 42,
            message: message.into(),
        })
        .unwrap()
    }

    #[test]
    fn roundtrip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let c = commit("first");
        FsCommitStore::open(dir.path()).unwrap().write(&c).unwrap();

        let store = FsCommitStore::open(dir.path()).unwrap();
        assert_eq!(store.read(&c.id()).unwrap(), Some(c.clone()));
        assert!(store.exists(&c.id()).unwrap());
        assert_eq!(store.list().unwrap(), vec![c.id()]);
    }

    #[test]
    fn rewrite_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::open(dir.path()).unwrap();
        let c = commit("again");
        store.write(&c).unwrap();
        store.write(&c).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn tampered_commit_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::open(dir.path()).unwrap();
        let c = commit("honest");
        store.write(&c).unwrap();

        let forged = commit("forged").to_json().unwrap();
        std::fs::write(store.path(&c.id()), forged).unwrap();
        assert!(matches!(store.read(&c.id()), Err(DagError::Corrupt { .. })));
    }

    #[test]
    fn remove_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::open(dir.path()).unwrap();
        let c = commit("gone");
        store.write(&c).unwrap();
        assert!(store.remove(&c.id()).unwrap());
        assert!(!store.exists(&c.id()).unwrap());
        assert!(!store.remove(&c.id()).unwrap());
    }

    #[test]
    fn missing_commit_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCommitStore::open(dir.path()).unwrap();
        assert_eq!(store.read(&commit("x").id()).unwrap(), None);
    }
}
