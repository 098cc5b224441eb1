//! # Encrypted Key Store
//!
//! Owns every wallet. Nothing outside this file ever holds a decrypted
//! private key for longer than one signing call or one backup export.
//!
//! ## Storage layout
//!
//! ```text
//! "wallets"  seal(master, JSON {currentId, wallets:[...]}, "trxsafe:registry:v1")
//!            each PrivateKey record carries seal(master, key, wallet id)
//! "wallet"   legacy single-wallet blob, migrated on first read then deleted
//! ```
//!
//! ## Write discipline
//!
//! Writers take the registry lock, clone the current registry, apply the
//! change to the clone, encrypt and write it atomically, and only then swap
//! it in. A failed write leaves disk and memory exactly as they were.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::master_key::{MasterKey, MasterKeyProvider};
use super::wallet::{LegacyWallet, Registry, Wallet, WalletKind, WalletRecord};
use crate::codec::address::Address;
use crate::crypto::encryption::{open, seal};
use crate::crypto::keys::TronKeypair;
use crate::error::{PaymentError, PaymentResult};
use crate::storage::{BlobStore, StoreError};
use crate::transaction::signing::sign_transaction;
use crate::transaction::types::{SignedTransaction, UnsignedTransaction};

const REGISTRY_BLOB: &str = "wallets";
const LEGACY_BLOB: &str = "wallet";
const REGISTRY_AAD: &[u8] = b"trxsafe:registry:v1";
const DEFAULT_LEGACY_NAME: &str = "Wallet";

fn store_err(e: StoreError) -> PaymentError {
    PaymentError::KeyStoreError(e.to_string())
}

fn validated_name(name: &str) -> PaymentResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PaymentError::KeyStoreError("wallet name must not be empty".into()));
    }
    Ok(name.to_string())
}

fn seal_key(master: &MasterKey, keypair: &TronKeypair, wallet_id: &str) -> PaymentResult<String> {
    let secret = keypair.secret_bytes();
    let sealed = seal(master, secret.as_slice(), wallet_id.as_bytes())?;
    Ok(B64.encode(sealed))
}

fn private_record(
    master: &MasterKey,
    name: String,
    keypair: &TronKeypair,
) -> PaymentResult<WalletRecord> {
    let id = Uuid::new_v4().to_string();
    let ciphertext = seal_key(master, keypair, &id)?;
    Ok(WalletRecord {
        address: keypair.address(),
        private_key_ciphertext: Some(ciphertext),
        kind: WalletKind::PrivateKey,
        created_at_millis: Utc::now().timestamp_millis(),
        id,
        name,
    })
}

fn watch_record(name: String, address: Address) -> WalletRecord {
    WalletRecord {
        id: Uuid::new_v4().to_string(),
        name,
        address,
        kind: WalletKind::WatchOnly,
        private_key_ciphertext: None,
        created_at_millis: Utc::now().timestamp_millis(),
    }
}

/// Encrypted multi-wallet registry with a single "current" selector.
pub struct KeyStore {
    store: Arc<dyn BlobStore>,
    master: Arc<dyn MasterKeyProvider>,
    registry: RwLock<Option<Registry>>,
}

impl KeyStore {
    pub fn new(store: Arc<dyn BlobStore>, master: Arc<dyn MasterKeyProvider>) -> Self {
        Self {
            store,
            master,
            registry: RwLock::new(None),
        }
    }

    // -- persistence -------------------------------------------------------

    async fn read_from_store(&self, master: &MasterKey) -> PaymentResult<Registry> {
        if let Some(blob) = self.store.read(REGISTRY_BLOB).await.map_err(store_err)? {
            let plain = Zeroizing::new(open(master, &blob, REGISTRY_AAD)?);
            let registry: Registry = serde_json::from_slice(&plain)
                .map_err(|e| PaymentError::KeyStoreError(format!("registry JSON: {e}")))?;
            for record in &registry.wallets {
                record.check_shape()?;
            }
            return Ok(registry);
        }

        if let Some(blob) = self.store.read(LEGACY_BLOB).await.map_err(store_err)? {
            return self.migrate_legacy(master, &blob).await;
        }

        Ok(Registry::default())
    }

    async fn migrate_legacy(&self, master: &MasterKey, blob: &[u8]) -> PaymentResult<Registry> {
        let plain = Zeroizing::new(open(master, blob, &[])?);
        let legacy: LegacyWallet = serde_json::from_slice(&plain)
            .map_err(|e| PaymentError::KeyStoreError(format!("legacy wallet JSON: {e}")))?;

        let address: Address = legacy.address.parse()?;
        let name = legacy
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_LEGACY_NAME)
            .to_string();

        let record = match legacy.private_key.as_deref() {
            Some(hex) => {
                let keypair = TronKeypair::from_hex(hex)?;
                if keypair.address() != address {
                    return Err(PaymentError::KeyStoreError(
                        "legacy wallet key does not control its stored address".into(),
                    ));
                }
                private_record(master, name, &keypair)?
            }
            None => watch_record(name, address),
        };

        let mut registry = Registry::default();
        registry.push(record);
        self.persist(master, &registry).await?;
        self.store.delete(LEGACY_BLOB).await.map_err(store_err)?;

        tracing::info!(address = %address, "migrated legacy wallet into registry");
        Ok(registry)
    }

    async fn persist(&self, master: &MasterKey, registry: &Registry) -> PaymentResult<()> {
        let plain = Zeroizing::new(
            serde_json::to_vec(registry)
                .map_err(|e| PaymentError::KeyStoreError(format!("registry JSON: {e}")))?,
        );
        let sealed = seal(master, &plain, REGISTRY_AAD)?;
        self.store
            .write(REGISTRY_BLOB, &sealed)
            .await
            .map_err(store_err)
    }

    /// Consistent snapshot of the registry, loading it on first use.
    async fn snapshot(&self) -> PaymentResult<Registry> {
        if let Some(registry) = self.registry.read().await.as_ref() {
            return Ok(registry.clone());
        }

        let mut guard = self.registry.write().await;
        if let Some(registry) = guard.as_ref() {
            return Ok(registry.clone());
        }
        let master = self.master.master_key().await?;
        let registry = self.read_from_store(&master).await?;
        *guard = Some(registry.clone());
        Ok(registry)
    }

    /// Clone, mutate, persist, swap. `f` runs under the writer lock.
    async fn mutate<T, F>(&self, f: F) -> PaymentResult<T>
    where
        F: FnOnce(&mut Registry, &MasterKey) -> PaymentResult<T>,
    {
        let mut guard = self.registry.write().await;
        let master = self.master.master_key().await?;

        let mut next = match guard.as_ref() {
            Some(current) => current.clone(),
            None => self.read_from_store(&master).await?,
        };
        let out = f(&mut next, &master)?;
        self.persist(&master, &next).await?;
        *guard = Some(next);
        Ok(out)
    }

    // -- lifecycle ---------------------------------------------------------

    /// Generates a fresh key from the OS CSPRNG.
    pub async fn create_private_key(&self, name: &str) -> PaymentResult<Wallet> {
        let name = validated_name(name)?;
        let keypair = TronKeypair::generate();
        let wallet = self
            .mutate(|registry, master| {
                registry.ensure_unique(&keypair.address(), None)?;
                let record = private_record(master, name, &keypair)?;
                let view = record.view();
                registry.push(record);
                Ok(view)
            })
            .await?;
        tracing::info!(wallet_id = %wallet.id, address = %wallet.address, "created wallet");
        Ok(wallet)
    }

    /// Imports 64 hex digits, `0x` prefix optional.
    pub async fn import_private_key(&self, name: &str, hex: &str) -> PaymentResult<Wallet> {
        let name = validated_name(name)?;
        let keypair = TronKeypair::from_hex(hex)?;
        let wallet = self
            .mutate(|registry, master| {
                registry.ensure_unique(&keypair.address(), None)?;
                let record = private_record(master, name, &keypair)?;
                let view = record.view();
                registry.push(record);
                Ok(view)
            })
            .await?;
        tracing::info!(wallet_id = %wallet.id, address = %wallet.address, "imported wallet");
        Ok(wallet)
    }

    pub async fn import_watch_only(&self, name: &str, address: &str) -> PaymentResult<Wallet> {
        let name = validated_name(name)?;
        let address: Address = address.parse()?;
        let wallet = self
            .mutate(|registry, _| {
                registry.ensure_unique(&address, None)?;
                let record = watch_record(name, address);
                let view = record.view();
                registry.push(record);
                Ok(view)
            })
            .await?;
        tracing::info!(wallet_id = %wallet.id, address = %wallet.address, "imported watch-only wallet");
        Ok(wallet)
    }

    /// Every wallet in creation order.
    pub async fn list(&self) -> PaymentResult<Vec<Wallet>> {
        Ok(self
            .snapshot()
            .await?
            .wallets
            .iter()
            .map(WalletRecord::view)
            .collect())
    }

    pub async fn get(&self, id: &str) -> PaymentResult<Wallet> {
        Ok(self.snapshot().await?.find(id)?.view())
    }

    pub async fn set_current(&self, id: &str) -> PaymentResult<()> {
        self.mutate(|registry, _| {
            registry.find(id)?;
            registry.current_id = Some(id.to_string());
            Ok(())
        })
        .await
    }

    pub async fn current(&self) -> PaymentResult<Option<Wallet>> {
        Ok(self.snapshot().await?.current().map(WalletRecord::view))
    }

    /// Renames, and for watch-only wallets only, re-points the address.
    pub async fn update(
        &self,
        id: &str,
        name: Option<&str>,
        address: Option<&str>,
    ) -> PaymentResult<Wallet> {
        let name = name.map(validated_name).transpose()?;
        let address = address.map(str::parse::<Address>).transpose()?;

        self.mutate(|registry, _| {
            let kind = registry.find(id)?.kind;
            if let Some(address) = &address {
                if kind != WalletKind::WatchOnly {
                    return Err(PaymentError::KeyStoreError(
                        "only watch-only wallets can change address".into(),
                    ));
                }
                registry.ensure_unique(address, Some(id))?;
            }

            let record = registry.find_mut(id)?;
            if let Some(name) = name {
                record.name = name;
            }
            if let Some(address) = address {
                record.address = address;
            }
            Ok(record.view())
        })
        .await
    }

    pub async fn delete(&self, id: &str) -> PaymentResult<()> {
        let removed = self.mutate(|registry, _| registry.remove(id)).await?;
        tracing::info!(wallet_id = %removed.id, address = %removed.address, "deleted wallet");
        Ok(())
    }

    // -- key material ------------------------------------------------------

    /// Decrypts the key of a `PrivateKey` wallet. The keypair wipes itself
    /// on drop; callers hold it for one operation only.
    pub(crate) async fn load_private_key_for_signing(&self, id: &str) -> PaymentResult<TronKeypair> {
        let registry = self.snapshot().await?;
        let record = registry.find(id)?;
        let sealed = match (record.kind, &record.private_key_ciphertext) {
            (WalletKind::WatchOnly, _) => return Err(PaymentError::WatchOnlyCannotSign),
            (WalletKind::PrivateKey, Some(sealed)) => sealed,
            (WalletKind::PrivateKey, None) => {
                return Err(PaymentError::KeyStoreError(format!(
                    "wallet {id} has no key material"
                )))
            }
        };

        let master = self.master.master_key().await?;
        let sealed = B64
            .decode(sealed)
            .map_err(|e| PaymentError::KeyStoreError(format!("key ciphertext: {e}")))?;
        let secret = Zeroizing::new(open(&master, &sealed, record.id.as_bytes())?);
        let keypair = TronKeypair::from_bytes(&secret)?;

        if keypair.address() != record.address {
            return Err(PaymentError::KeyStoreError(format!(
                "wallet {id} key does not control its address"
            )));
        }
        Ok(keypair)
    }

    /// The only signing entry point. Watch-only wallets are refused before
    /// any key material is touched.
    pub async fn sign_transfer(
        &self,
        id: &str,
        tx: &UnsignedTransaction,
    ) -> PaymentResult<SignedTransaction> {
        let wallet = self.get(id).await?;
        if wallet.kind == WalletKind::WatchOnly {
            return Err(PaymentError::WatchOnlyCannotSign);
        }
        let keypair = self.load_private_key_for_signing(id).await?;
        sign_transaction(tx, &keypair)
    }

    /// Plaintext hex key for backup. Not gated here; the caller is the
    /// authentication layer.
    pub async fn export_for_backup(&self, id: &str) -> PaymentResult<Zeroizing<String>> {
        let keypair = match self.load_private_key_for_signing(id).await {
            Err(PaymentError::WatchOnlyCannotSign) => {
                return Err(PaymentError::KeyStoreError(
                    "watch-only wallet has no key to export".into(),
                ))
            }
            other => other?,
        };
        tracing::warn!(wallet_id = %id, "private key exported for backup");
        Ok(keypair.secret_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;
    use crate::transaction::builder::{assemble_transfer, Tapos};
    use crate::transaction::verification::validate_signed;
    use crate::vault::master_key::StaticMasterKey;

    const KEY_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";
    const KEY_ONE_ADDRESS: &str = "TMVQGm1qAQYVdetCeGRRkTWYYrLXuHK2HC";
    const SELLER: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    fn fixture() -> (Arc<MemoryBlobStore>, Arc<StaticMasterKey>, KeyStore) {
        let store = Arc::new(MemoryBlobStore::new());
        let master = Arc::new(StaticMasterKey::new([7u8; 32]));
        let ks = KeyStore::new(store.clone(), master.clone());
        (store, master, ks)
    }

    fn transfer_from(owner: &Address) -> UnsignedTransaction {
        let to: Address = SELLER.parse().unwrap();
        assemble_transfer(owner, &to, 1_000_000, &Tapos::synthetic(1_700_000_000_000)).unwrap()
    }

    #[tokio::test]
    async fn import_derives_address_and_becomes_current() {
        let (_, _, ks) = fixture();
        let w = ks.import_private_key("main", &format!("0x{KEY_ONE}")).await.unwrap();
        assert_eq!(w.address.encode(), KEY_ONE_ADDRESS);
        assert_eq!(w.kind, WalletKind::PrivateKey);
        assert_eq!(ks.current().await.unwrap().unwrap().id, w.id);
    }

    #[tokio::test]
    async fn bad_inputs_are_rejected() {
        let (_, _, ks) = fixture();
        assert!(matches!(
            ks.create_private_key("   ").await,
            Err(PaymentError::KeyStoreError(_))
        ));
        assert!(matches!(
            ks.import_private_key("k", "abcd").await,
            Err(PaymentError::KeyStoreError(_))
        ));
        assert!(matches!(
            ks.import_watch_only("w", "TNotAnAddress").await,
            Err(PaymentError::InvalidAddress(_))
        ));
        assert!(ks.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_address_is_rejected() {
        let (_, _, ks) = fixture();
        ks.import_private_key("a", KEY_ONE).await.unwrap();
        match ks.import_watch_only("b", KEY_ONE_ADDRESS).await {
            Err(PaymentError::DuplicateWallet(addr)) => assert_eq!(addr, KEY_ONE_ADDRESS),
            other => panic!("expected DuplicateWallet, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn registry_survives_reopen_and_is_encrypted() {
        let (store, master, ks) = fixture();
        let w = ks.create_private_key("main").await.unwrap();
        ks.import_watch_only("shop", SELLER).await.unwrap();

        let raw = store.snapshot(REGISTRY_BLOB).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("main"));

        let reopened = KeyStore::new(store.clone(), master);
        let wallets = reopened.list().await.unwrap();
        assert_eq!(wallets.len(), 2);
        assert_eq!(wallets[0], w);
        assert_eq!(reopened.current().await.unwrap().unwrap().id, w.id);
    }

    #[tokio::test]
    async fn wrong_master_key_is_a_key_store_error() {
        let (store, _, ks) = fixture();
        ks.create_private_key("main").await.unwrap();

        let other = KeyStore::new(store, Arc::new(StaticMasterKey::new([8u8; 32])));
        assert!(matches!(other.list().await, Err(PaymentError::KeyStoreError(_))));
    }

    #[tokio::test]
    async fn watch_only_cannot_sign_and_nothing_changes() {
        let (store, _, ks) = fixture();
        let w = ks.import_watch_only("watch", KEY_ONE_ADDRESS).await.unwrap();
        let before = store.snapshot(REGISTRY_BLOB);

        let tx = transfer_from(&w.address);
        match ks.sign_transfer(&w.id, &tx).await {
            Err(PaymentError::WatchOnlyCannotSign) => {}
            other => panic!("expected WatchOnlyCannotSign, got {:?}", other),
        }
        assert_eq!(store.snapshot(REGISTRY_BLOB), before);
    }

    #[tokio::test]
    async fn sign_transfer_produces_valid_signature() {
        let (_, _, ks) = fixture();
        let w = ks.import_private_key("main", KEY_ONE).await.unwrap();
        let signed = ks.sign_transfer(&w.id, &transfer_from(&w.address)).await.unwrap();
        validate_signed(&signed).unwrap();
    }

    #[tokio::test]
    async fn swapped_ciphertext_fails_authentication() {
        let (_, _, ks) = fixture();
        let a = ks.create_private_key("a").await.unwrap();
        let b = ks.create_private_key("b").await.unwrap();

        ks.mutate(|registry, _| {
            let sealed_a = registry.find(&a.id)?.private_key_ciphertext.clone();
            registry.find_mut(&b.id)?.private_key_ciphertext = sealed_a;
            Ok(())
        })
        .await
        .unwrap();

        assert!(matches!(
            ks.sign_transfer(&b.id, &transfer_from(&b.address)).await,
            Err(PaymentError::KeyStoreError(_))
        ));
    }

    #[tokio::test]
    async fn address_edit_only_for_watch_only() {
        let (_, _, ks) = fixture();
        let pk = ks.import_private_key("pk", KEY_ONE).await.unwrap();
        let watch = ks.import_watch_only("w", SELLER).await.unwrap();

        assert!(matches!(
            ks.update(&pk.id, None, Some(SELLER)).await,
            Err(PaymentError::KeyStoreError(_))
        ));

        let other = TronKeypair::generate().address().encode();
        let updated = ks.update(&watch.id, Some("renamed"), Some(&other)).await.unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.address.encode(), other);

        let renamed = ks.update(&pk.id, Some("main"), None).await.unwrap();
        assert_eq!(renamed.address.encode(), KEY_ONE_ADDRESS);
    }

    #[tokio::test]
    async fn failed_write_keeps_prior_state() {
        let (store, _, ks) = fixture();
        let w = ks.create_private_key("main").await.unwrap();
        let blob = store.snapshot(REGISTRY_BLOB);

        store.fail_writes(true);
        assert!(matches!(
            ks.update(&w.id, Some("other"), None).await,
            Err(PaymentError::KeyStoreError(_))
        ));
        assert!(ks.create_private_key("second").await.is_err());

        assert_eq!(ks.get(&w.id).await.unwrap().name, "main");
        assert_eq!(ks.list().await.unwrap().len(), 1);
        assert_eq!(store.snapshot(REGISTRY_BLOB), blob);
    }

    #[tokio::test]
    async fn delete_current_moves_selection() {
        let (_, _, ks) = fixture();
        let a = ks.create_private_key("a").await.unwrap();
        let b = ks.import_watch_only("b", SELLER).await.unwrap();

        ks.delete(&a.id).await.unwrap();
        assert_eq!(ks.current().await.unwrap().unwrap().id, b.id);
        ks.delete(&b.id).await.unwrap();
        assert_eq!(ks.current().await.unwrap(), None);
        assert!(matches!(ks.delete(&b.id).await, Err(PaymentError::WalletNotFound(_))));
    }

    #[tokio::test]
    async fn export_returns_hex_key() {
        let (_, _, ks) = fixture();
        let w = ks.import_private_key("main", KEY_ONE).await.unwrap();
        assert_eq!(ks.export_for_backup(&w.id).await.unwrap().as_str(), KEY_ONE);

        let watch = ks.import_watch_only("w", SELLER).await.unwrap();
        assert!(matches!(
            ks.export_for_backup(&watch.id).await,
            Err(PaymentError::KeyStoreError(_))
        ));
    }

    #[tokio::test]
    async fn legacy_wallet_is_migrated_then_removed() {
        let (store, master, ks) = fixture();
        let legacy = serde_json::json!({
            "privateKey": KEY_ONE,
            "address": KEY_ONE_ADDRESS,
            "name": "old"
        });
        let key = master.master_key().await.unwrap();
        let sealed = seal(&key, legacy.to_string().as_bytes(), &[]).unwrap();
        store.insert(LEGACY_BLOB, sealed);

        let wallets = ks.list().await.unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].name, "old");
        assert_eq!(wallets[0].address.encode(), KEY_ONE_ADDRESS);
        assert_eq!(ks.current().await.unwrap().unwrap().id, wallets[0].id);
        assert!(!store.contains(LEGACY_BLOB));
        assert!(store.contains(REGISTRY_BLOB));

        assert_eq!(ks.export_for_backup(&wallets[0].id).await.unwrap().as_str(), KEY_ONE);
    }

    #[tokio::test]
    async fn legacy_watch_only_is_migrated() {
        let (store, master, ks) = fixture();
        let legacy = serde_json::json!({ "address": SELLER });
        let key = master.master_key().await.unwrap();
        store.insert(LEGACY_BLOB, seal(&key, legacy.to_string().as_bytes(), &[]).unwrap());

        let wallets = ks.list().await.unwrap();
        assert_eq!(wallets[0].kind, WalletKind::WatchOnly);
        assert_eq!(wallets[0].name, DEFAULT_LEGACY_NAME);
    }
}
