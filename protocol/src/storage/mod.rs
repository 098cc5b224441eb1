//! # Storage Module
//!
//! Opaque blob persistence for the key store and the history ledger. The
//! engine never interprets bytes at this layer; encryption and JSON happen
//! above it.
//!
//! ## Architecture
//!
//! ```text
//! file.rs   - FileBlobStore: one file per key, atomic replace via rename
//! memory.rs - MemoryBlobStore: in-process map for tests and embedders
//! ```
//!
//! ## Design Decisions
//!
//! 1. **Whole-blob writes.** Every write replaces the entire value. Callers
//!    build the new state in memory, serialize it, and hand it over in one
//!    piece, so a failed write can never leave half a registry on disk.
//!
//! 2. **Missing is not an error.** `read` returns `Ok(None)` for an absent
//!    key; first runs and migrations branch on that.

pub mod file;
pub mod memory;

use async_trait::async_trait;

pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Test stores can be told to fail.
    #[error("write refused for {0}")]
    WriteRefused(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Keys are plain identifiers so they map one-to-one onto file names.
pub(crate) fn check_key(key: &str) -> StoreResult<()> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && !key.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

// ---------------------------------------------------------------------------
// BlobStore
// ---------------------------------------------------------------------------

/// Key-value blob persistence with atomic whole-value replacement.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// The stored bytes, or `None` if the key was never written or deleted.
    async fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replaces the value atomically: readers see the old bytes or the new
    /// bytes, never a mix.
    async fn write(&self, key: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Removes the key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}
