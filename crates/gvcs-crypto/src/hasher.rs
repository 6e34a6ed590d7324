use gvcs_types::ObjectId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"gvcs-node-v1"`) that is
/// prepended to every hash computation. A node record and a relationship
/// record with identical bytes therefore produce different hashes.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for node records.
    pub const NODE: Self = Self {
        domain: "gvcs-node-v1",
    };
    /// Hasher for relationship records.
    pub const RELATIONSHIP: Self = Self {
        domain: "gvcs-rel-v1",
    };
    /// Hasher for spilled attribute values.
    pub const ATTRIBUTE: Self = Self {
        domain: "gvcs-attr-v1",
    };
    /// Hasher for snapshot manifest trie nodes.
    pub const MANIFEST: Self = Self {
        domain: "gvcs-manifest-v1",
    };
    /// Hasher for commits.
    pub const COMMIT: Self = Self {
        domain: "gvcs-commit-v1",
    };
    /// Hasher for manifest key placement (not an object identity).
    pub const KEY: Self = Self {
        domain: "gvcs-key-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<ObjectId, HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Verify that data produces the expected object ID.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::NODE.hash(data), ContentHasher::NODE.hash(data));
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        let all = [
            ContentHasher::NODE.hash(data),
            ContentHasher::RELATIONSHIP.hash(data),
            ContentHasher::ATTRIBUTE.hash(data),
            ContentHasher::MANIFEST.hash(data),
            ContentHasher::COMMIT.hash(data),
            ContentHasher::KEY.hash(data),
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn domain_separated_hash_differs_from_raw() {
        assert_ne!(ContentHasher::NODE.hash(b"x"), ObjectId::from_bytes(b"x"));
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::ATTRIBUTE.hash(b"original");
        assert!(ContentHasher::ATTRIBUTE.verify(b"original", &id));
        assert!(!ContentHasher::ATTRIBUTE.verify(b"tampered", &id));
    }

    #[test]
    fn hash_json_matches_hash_of_encoding() {
        let value = serde_json::json!({"key": "value", "num": 42});
        let id = ContentHasher::COMMIT.hash_json(&value).unwrap();
        let bytes = serde_json::to_vec(&value).unwrap();
        assert_eq!(id, ContentHasher::COMMIT.hash(&bytes));
    }

    #[test]
    fn custom_domain() {
        let hasher = ContentHasher::new("my-custom-domain-v1");
        assert_eq!(hasher.domain(), "my-custom-domain-v1");
        assert_ne!(hasher.hash(b"data"), ContentHasher::NODE.hash(b"data"));
    }
}
