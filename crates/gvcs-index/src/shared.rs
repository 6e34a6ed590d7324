//! Single-writer sharing of a staging area across threads.

use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use crate::error::{StagingError, StagingResult};
use crate::staging::StagingArea;

/// A staging area behind a mutex that refuses to queue writers.
///
/// A second writer arriving while one is editing gets `StagingBusy`
/// instead of waiting, so two callers can never interleave edits.
#[derive(Clone, Debug)]
pub struct SharedStaging {
    inner: Arc<Mutex<StagingArea>>,
}

impl SharedStaging {
    pub fn new(area: StagingArea) -> Self {
        Self {
            inner: Arc::new(Mutex::new(area)),
        }
    }

    /// Run `edit` with exclusive access, or fail with `StagingBusy` if
    /// another writer holds the area.
    ///
    /// If `edit` returns an error, every change it made is rolled back.
    pub fn try_edit<R>(
        &self,
        edit: impl FnOnce(&mut StagingArea) -> StagingResult<R>,
    ) -> StagingResult<R> {
        let mut guard = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(StagingError::StagingBusy),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        let checkpoint = guard.checkpoint();
        let result = edit(&mut guard);
        if result.is_err() {
            guard.restore(checkpoint);
        }
        result
    }

    /// Read the area, waiting for any writer to finish.
    pub fn read<R>(&self, read: impl FnOnce(&StagingArea) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        read(&guard)
    }

    /// Take the area back if this is the last handle.
    pub fn into_inner(self) -> Option<StagingArea> {
        Arc::try_unwrap(self.inner)
            .ok()
            .map(|m| m.into_inner().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    use gvcs_snapshot::{Manifest, Node, Relationship, DEFAULT_INLINE_THRESHOLD};
    use gvcs_store::{InMemoryObjectStore, ObjectStore};
    use gvcs_types::{CommitId, EntityId, NodeId, ObjectId, RelationshipId};

    fn area() -> StagingArea {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        let root = Manifest::new(store.as_ref()).empty().unwrap();
        StagingArea::new(
            store,
            "main",
            CommitId::from_object_id(ObjectId::from_bytes(b"base")),
            root,
            DEFAULT_INLINE_THRESHOLD,
        )
    }

    #[test]
    fn concurrent_writer_is_rejected() {
        let shared = SharedStaging::new(area());
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let shared = shared.clone();
            thread::spawn(move || {
                shared.try_edit(|area| {
                    area.add_or_update_node(Node::new(NodeId::new("a").unwrap()))?;
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(())
                })
            })
        };

        entered_rx.recv().unwrap();
        let second = shared.try_edit(|area| area.add_or_update_node(Node::new(NodeId::new("b").unwrap())));
        assert!(matches!(second, Err(StagingError::StagingBusy)));

        release_tx.send(()).unwrap();
        holder.join().unwrap().unwrap();

        // Free again once the first writer is done.
        shared
            .try_edit(|area| area.add_or_update_node(Node::new(NodeId::new("b").unwrap())))
            .unwrap();
        assert_eq!(shared.read(|area| area.staged().count()), 2);
        assert!(shared.into_inner().is_some());
    }

    #[test]
    fn failed_edit_leaves_no_partial_changes() {
        let shared = SharedStaging::new(area());
        shared
            .try_edit(|area| area.add_or_update_node(Node::new(NodeId::new("a").unwrap())))
            .unwrap();

        let result = shared.try_edit(|area| {
            area.add_or_update_node(Node::new(NodeId::new("b").unwrap()))?;
            area.add_or_update_relationship(Relationship::new(
                RelationshipId::new("r").unwrap(),
                NodeId::new("b").unwrap(),
                NodeId::new("ghost").unwrap(),
                "KNOWS",
            ))
        });
        assert!(matches!(result, Err(StagingError::DanglingReference { .. })));

        let b = EntityId::Node(NodeId::new("b").unwrap());
        assert!(!shared.read(|area| area.contains(&b)).unwrap());
        assert_eq!(shared.read(|area| area.staged().count()), 1);
    }
}
