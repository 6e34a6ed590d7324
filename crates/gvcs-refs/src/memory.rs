//! In-memory reference store for testing and ephemeral use.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use gvcs_types::CommitId;

use crate::error::{RefError, Result};
use crate::names::validate_branch_name;
use crate::traits::RefStore;

/// An in-memory implementation of [`RefStore`].
///
/// Refs live in a `BTreeMap` behind a `Mutex` so that compare-and-swap is a
/// single critical section. Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    refs: Mutex<BTreeMap<String, CommitId>>,
    head: RwLock<Option<String>>,
}

impl InMemoryRefStore {
    /// Create a new empty ref store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> RefError {
    RefError::Serialization(format!("lock poisoned: {e}"))
}

impl RefStore for InMemoryRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<CommitId>> {
        let refs = self.refs.lock().map_err(poisoned)?;
        Ok(refs.get(name).copied())
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<CommitId>,
        new: CommitId,
    ) -> Result<()> {
        let mut refs = self.refs.lock().map_err(poisoned)?;
        let actual = refs.get(name).copied();
        if actual != expected {
            return Err(RefError::Stale {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        refs.insert(name.to_string(), new);
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        let mut refs = self.refs.lock().map_err(poisoned)?;
        Ok(refs.remove(name).is_some())
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, CommitId)>> {
        let refs = self.refs.lock().map_err(poisoned)?;
        Ok(refs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }

    fn head(&self) -> Result<Option<String>> {
        let head = self.head.read().map_err(poisoned)?;
        Ok(head.clone())
    }

    fn set_head(&self, branch: &str) -> Result<()> {
        validate_branch_name(branch)?;
        let mut head = self.head.write().map_err(poisoned)?;
        *head = Some(branch.to_string());
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

    #[test]
    fn create_read_update() {
        let store = InMemoryRefStore::new();
        store.compare_and_swap("refs/heads/main", None, cid("a")).unwrap();
        assert_eq!(store.read_ref("refs/heads/main").unwrap(), Some(cid("a")));

        store
            .compare_and_swap("refs/heads/main", Some(cid("a")), cid("b"))
            .unwrap();
        assert_eq!(store.read_ref("refs/heads/main").unwrap(), Some(cid("b")));
    }

    #[test]
    fn stale_expectation_is_rejected() {
        let store = InMemoryRefStore::new();
        store.compare_and_swap("refs/heads/main", None, cid("a")).unwrap();

        let err = store
            .compare_and_swap("refs/heads/main", None, cid("x"))
            .unwrap_err();
        assert!(matches!(err, RefError::Stale { actual: Some(_), .. }));

        let err = store
            .compare_and_swap("refs/heads/main", Some(cid("zzz")), cid("x"))
            .unwrap_err();
        assert!(matches!(err, RefError::Stale { .. }));
        assert_eq!(store.read_ref("refs/heads/main").unwrap(), Some(cid("a")));
    }

    #[test]
    fn list_by_prefix_is_sorted() {
        let store = InMemoryRefStore::new();
        for name in ["refs/heads/b", "refs/heads/a", "refs/heads/a/x", "refs/other"] {
            store.compare_and_swap(name, None, cid(name)).unwrap();
        }
        let names: Vec<String> = store.branches().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["refs/heads/a", "refs/heads/a/x", "refs/heads/b"]);
    }

    #[test]
    fn delete() {
        let store = InMemoryRefStore::new();
        store.compare_and_swap("refs/heads/tmp", None, cid("a")).unwrap();
        assert!(store.delete_ref("refs/heads/tmp").unwrap());
        assert!(!store.delete_ref("refs/heads/tmp").unwrap());
        assert_eq!(store.read_ref("refs/heads/tmp").unwrap(), None);
    }

    #[test]
    fn head_roundtrip() {
        let store = InMemoryRefStore::new();
        assert_eq!(store.head().unwrap(), None);
        store.set_head("main").unwrap();
        assert_eq!(store.head().unwrap().as_deref(), Some("main"));
        assert!(store.set_head("bad..name").is_err());
    }

    #[test]
    fn concurrent_cas_has_one_winner() {
        use std::sync::Arc;
        let store = Arc::new(InMemoryRefStore::new());
        store.compare_and_swap("refs/heads/main", None, cid("base")).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .compare_and_swap(
                            "refs/heads/main",
                            Some(cid("base")),
                            cid(&format!("w{i}")),
                        )
                        .is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    }
}
