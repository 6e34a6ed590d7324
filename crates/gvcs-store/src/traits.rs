use gvcs_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{ContentKind, ContentObject};

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. The same (kind, payload) always
///   produces the same id, and an existing id is never rewritten.
/// - Writes are idempotent: storing identical content twice performs no
///   second write.
/// - Concurrent reads and writes are safe without caller-side locking.
/// - The store never interprets payloads.
/// - There is no update and no delete.
pub trait ObjectStore: Send + Sync {
    /// Read an object by its content-addressed ID.
    ///
    /// Returns `Ok(None)` if the object does not exist. The bytes are
    /// returned as stored; use [`ObjectStore::get`] for a verified read.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<ContentObject>>;

    /// Write an object and return its content-addressed ID.
    ///
    /// If the object already exists, this is a no-op.
    fn write(&self, object: &ContentObject) -> StoreResult<ObjectId>;

    /// Check whether an object exists in the store.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Read multiple objects in a batch.
    fn read_batch(&self, ids: &[ObjectId]) -> StoreResult<Vec<Option<ContentObject>>> {
        ids.iter().map(|id| self.read(id)).collect()
    }

    /// Write multiple objects in a batch and return their IDs.
    fn write_batch(&self, objects: &[ContentObject]) -> StoreResult<Vec<ObjectId>> {
        objects.iter().map(|obj| self.write(obj)).collect()
    }

    /// Store a payload under the given kind.
    fn put(&self, kind: ContentKind, payload: Vec<u8>) -> StoreResult<ObjectId> {
        self.write(&ContentObject::new(kind, payload))
    }

    /// Verified read.
    ///
    /// Fails with `NotFound` when the object is absent and with `Corrupt`
    /// when the stored bytes hash to a different id.
    fn get(&self, id: &ObjectId) -> StoreResult<ContentObject> {
        let obj = self.read(id)?.ok_or(StoreError::NotFound(*id))?;
        let actual = obj.compute_id();
        if actual != *id {
            return Err(StoreError::Corrupt {
                id: *id,
                reason: format!("content hashes to {}", actual.short_hex()),
            });
        }
        Ok(obj)
    }
}

impl<S: ObjectStore + ?Sized> ObjectStore for std::sync::Arc<S> {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<ContentObject>> {
        (**self).read(id)
    }

    fn write(&self, object: &ContentObject) -> StoreResult<ObjectId> {
        (**self).write(object)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        (**self).exists(id)
    }

    fn read_batch(&self, ids: &[ObjectId]) -> StoreResult<Vec<Option<ContentObject>>> {
        (**self).read_batch(ids)
    }

    fn write_batch(&self, objects: &[ContentObject]) -> StoreResult<Vec<ObjectId>> {
        (**self).write_batch(objects)
    }
}
