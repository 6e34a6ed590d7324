//! Loose-object filesystem backend.
//!
//! Each object lives in its own file at `<root>/<2 hex>/<62 hex>`. A file is
//! a one-byte codec marker followed by the encoded body:
//!
//! ```text
//! 'R' <kind tag> <payload>                 raw
//! 'Z' zstd(<kind tag> <payload>)           compressed
//! ```
//!
//! Files are written to a temporary file in the target directory and then
//! linked into place without clobbering, so a reader never observes a
//! partially written object and an existing object is never rewritten.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use gvcs_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{ContentKind, ContentObject};
use crate::traits::ObjectStore;

const MARKER_RAW: u8 = b'R';
const MARKER_ZSTD: u8 = b'Z';
const ZSTD_LEVEL: i32 = 3;

/// Object store backed by loose files on disk.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    compression: bool,
}

impl FsObjectStore {
    /// Open (creating if needed) an object directory.
    pub fn open(root: impl Into<PathBuf>, compression: bool) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), compression, "opened object store");
        Ok(Self { root, compression })
    }

    /// The object directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether newly written objects are zstd-compressed.
    pub fn compression_enabled(&self) -> bool {
        self.compression
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }

    fn encode(&self, object: &ContentObject) -> StoreResult<Vec<u8>> {
        let mut body = Vec::with_capacity(object.data.len() + 1);
        body.push(object.kind.tag());
        body.extend_from_slice(&object.data);
        if !self.compression {
            let mut out = Vec::with_capacity(body.len() + 1);
            out.push(MARKER_RAW);
            out.extend_from_slice(&body);
            return Ok(out);
        }
        let compressed = zstd::encode_all(body.as_slice(), ZSTD_LEVEL)?;
        let mut out = Vec::with_capacity(compressed.len() + 1);
        out.push(MARKER_ZSTD);
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    fn decode(id: &ObjectId, bytes: &[u8]) -> StoreResult<ContentObject> {
        let corrupt = |reason: String| StoreError::Corrupt { id: *id, reason };
        let (marker, rest) = bytes
            .split_first()
            .ok_or_else(|| corrupt("empty object file".into()))?;
        let body = match *marker {
            MARKER_RAW => rest.to_vec(),
            MARKER_ZSTD => zstd::decode_all(rest)
                .map_err(|e| corrupt(format!("zstd decode failed: {e}")))?,
            other => return Err(corrupt(format!("unknown codec marker 0x{other:02x}"))),
        };
        let (tag, payload) = body
            .split_first()
            .ok_or_else(|| corrupt("missing kind tag".into()))?;
        let kind = ContentKind::from_tag(*tag)
            .ok_or_else(|| corrupt(format!("unknown kind tag {tag}")))?;
        Ok(ContentObject::new(kind, payload.to_vec()))
    }

    /// Every object id present on disk, sorted.
    pub fn all_ids(&self) -> StoreResult<Vec<ObjectId>> {
        let mut ids = Vec::new();
        for fanout in std::fs::read_dir(&self.root)? {
            let fanout = fanout?;
            if !fanout.file_type()?.is_dir() {
                continue;
            }
            let prefix = fanout.file_name().to_string_lossy().into_owned();
            for entry in std::fs::read_dir(fanout.path())? {
                let name = entry?.file_name().to_string_lossy().into_owned();
                // Skip leftover temp files; only full-length names are objects.
                if let Ok(id) = ObjectId::from_hex(&format!("{prefix}{name}")) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl ObjectStore for FsObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<ContentObject>> {
        match std::fs::read(self.object_path(id)) {
            Ok(bytes) => Self::decode(id, &bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, object: &ContentObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Serialization("object path has no parent".into()))?;
        std::fs::create_dir_all(dir)?;

        let encoded = self.encode(object)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&encoded)?;
        tmp.as_file().sync_all()?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                tracing::trace!(%id, kind = %object.kind, bytes = encoded.len(), "wrote object file");
                Ok(id)
            }
            // A concurrent writer of the same content got there first.
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(id),
            Err(e) => Err(e.error.into()),
        }
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).is_file())
    }
}
