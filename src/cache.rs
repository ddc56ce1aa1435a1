//! Bounded, thread-safe LRU caches shared across the node tree: decoded schema blobs, and
//! directory name-to-child-blob lookups. Both default to 1024 entries.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::blobref::BlobRef;
use crate::schema::SchemaBlob;

pub const DEFAULT_CAPACITY: usize = 1024;

/// Caches the decoded form of small, immutable schema blobs (file/directory/symlink/
/// static-set). Schema blobs never change once written, so entries never need invalidating.
pub struct SchemaCache {
    inner: Mutex<LruCache<BlobRef, Arc<SchemaBlob>>>,
}

impl SchemaCache {
    pub fn new(capacity: usize) -> Self {
        SchemaCache {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap()),
            )),
        }
    }

    pub fn get(&self, blob_ref: &BlobRef) -> Option<Arc<SchemaBlob>> {
        self.inner.lock().get(blob_ref).cloned()
    }

    pub fn insert(&self, blob_ref: BlobRef, schema: Arc<SchemaBlob>) {
        self.inner.lock().put(blob_ref, schema);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Caches a directory's child-name-to-blob-ref lookups, keyed by `(directory blob, name)`.
/// Unlike `SchemaCache`, these entries go stale when a directory's membership changes and
/// must be explicitly invalidated by whoever holds the write lock on that directory.
pub struct NameCache {
    inner: Mutex<LruCache<(BlobRef, String), BlobRef>>,
}

impl NameCache {
    pub fn new(capacity: usize) -> Self {
        NameCache {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap()),
            )),
        }
    }

    pub fn get(&self, dir: &BlobRef, name: &str) -> Option<BlobRef> {
        self.inner.lock().get(&(dir.clone(), name.to_string())).cloned()
    }

    pub fn insert(&self, dir: BlobRef, name: String, child: BlobRef) {
        self.inner.lock().put((dir, name), child);
    }

    /// Drops every cached entry for `dir`. Called after a mutation that changes `dir`'s
    /// membership (create, remove, rename).
    pub fn invalidate_dir(&self, dir: &BlobRef) {
        let mut inner = self.inner.lock();
        let stale: Vec<(BlobRef, String)> = inner
            .iter()
            .filter(|((d, _), _)| d == dir)
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            inner.pop(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

impl Default for NameCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn br(digest_byte: u8) -> BlobRef {
        BlobRef::new_unchecked("sha1", format!("{:0>40}", digest_byte.to_string()))
    }

    #[test]
    fn schema_cache_roundtrips() {
        let cache = SchemaCache::new(4);
        let key = br(1);
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), Arc::new(SchemaBlob::Permanode));
        assert_eq!(cache.get(&key).unwrap().camli_type(), "permanode");
    }

    #[test]
    fn name_cache_invalidate_dir_clears_only_that_dir() {
        let cache = NameCache::new(16);
        let dir_a = br(1);
        let dir_b = br(2);
        cache.insert(dir_a.clone(), "x".to_string(), br(3));
        cache.insert(dir_b.clone(), "y".to_string(), br(4));

        cache.invalidate_dir(&dir_a);

        assert!(cache.get(&dir_a, "x").is_none());
        assert!(cache.get(&dir_b, "y").is_some());
    }

    #[test]
    fn name_cache_evicts_least_recently_used() {
        let cache = NameCache::new(1);
        let dir = br(1);
        cache.insert(dir.clone(), "a".to_string(), br(10));
        cache.insert(dir.clone(), "b".to_string(), br(11));
        assert!(cache.get(&dir, "a").is_none());
        assert!(cache.get(&dir, "b").is_some());
    }
}
