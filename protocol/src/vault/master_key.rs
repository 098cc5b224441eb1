//! Master key providers.
//!
//! The key store encrypts everything under one AES-256 key that it never
//! persists itself. Where that key comes from is the host's business: an OS
//! keystore, a hardware module, or, for the CLI, a private file next to the
//! data it protects.

use std::sync::Arc;

use async_trait::async_trait;
use rand::RngCore;
use tokio::sync::OnceCell;
use zeroize::Zeroizing;

use crate::config::AES_KEY_LENGTH;
use crate::error::{PaymentError, PaymentResult};
use crate::storage::BlobStore;

pub type MasterKey = Zeroizing<[u8; AES_KEY_LENGTH]>;

/// Supplies the registry master key.
#[async_trait]
pub trait MasterKeyProvider: Send + Sync {
    async fn master_key(&self) -> PaymentResult<MasterKey>;
}

/// A fixed key held in memory.
pub struct StaticMasterKey(MasterKey);

impl StaticMasterKey {
    pub fn new(key: [u8; AES_KEY_LENGTH]) -> Self {
        Self(Zeroizing::new(key))
    }

    pub fn random() -> Self {
        let mut key = Zeroizing::new([0u8; AES_KEY_LENGTH]);
        rand::rngs::OsRng.fill_bytes(&mut key[..]);
        Self(key)
    }
}

#[async_trait]
impl MasterKeyProvider for StaticMasterKey {
    async fn master_key(&self) -> PaymentResult<MasterKey> {
        Ok(self.0.clone())
    }
}

/// Key kept as a `0600` blob in a [`BlobStore`], generated on first use.
pub struct FileMasterKey {
    store: Arc<dyn BlobStore>,
    cached: OnceCell<MasterKey>,
}

const MASTER_KEY_BLOB: &str = "master.key";

impl FileMasterKey {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            cached: OnceCell::new(),
        }
    }

    async fn load_or_create(&self) -> PaymentResult<MasterKey> {
        let ks = |e: crate::storage::StoreError| PaymentError::KeyStoreError(e.to_string());

        if let Some(bytes) = self.store.read(MASTER_KEY_BLOB).await.map_err(ks)? {
            let bytes = Zeroizing::new(bytes);
            if bytes.len() != AES_KEY_LENGTH {
                return Err(PaymentError::KeyStoreError(format!(
                    "master key blob is {} bytes, expected {AES_KEY_LENGTH}",
                    bytes.len()
                )));
            }
            let mut key = Zeroizing::new([0u8; AES_KEY_LENGTH]);
            key.copy_from_slice(&bytes);
            return Ok(key);
        }

        let mut key = Zeroizing::new([0u8; AES_KEY_LENGTH]);
        rand::rngs::OsRng.fill_bytes(&mut key[..]);
        self.store
            .write(MASTER_KEY_BLOB, &key[..])
            .await
            .map_err(ks)?;
        tracing::info!("generated new master key");
        Ok(key)
    }
}

#[async_trait]
impl MasterKeyProvider for FileMasterKey {
    async fn master_key(&self) -> PaymentResult<MasterKey> {
        let key = self
            .cached
            .get_or_try_init(|| self.load_or_create())
            .await?;
        Ok(key.clone())
    }
}
