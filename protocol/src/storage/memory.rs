//! In-memory blob store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{check_key, BlobStore, StoreError, StoreResult};

/// `HashMap`-backed [`BlobStore`]. Can be told to refuse writes, which is
/// how tests prove that failed persistence leaves state untouched.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every `write` and `delete` fails with `WriteRefused`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs.read().contains_key(key)
    }

    /// Raw bytes, bypassing the async interface. Test helper.
    pub fn snapshot(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(key).cloned()
    }

    /// Seeds a value directly.
    pub fn insert(&self, key: &str, bytes: Vec<u8>) {
        self.blobs.write().insert(key.to_string(), bytes);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        check_key(key)?;
        Ok(self.blobs.read().get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        check_key(key)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRefused(key.to_string()));
        }
        self.blobs.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        check_key(key)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRefused(key.to_string()));
        }
        self.blobs.write().remove(key);
        Ok(())
    }
}
