//! # Wallet Records
//!
//! A wallet is either a [`WalletKind::PrivateKey`] wallet, whose sealed key
//! lives inside the registry, or a [`WalletKind::WatchOnly`] wallet, which is
//! just a named address.
//!
//! ## Shapes
//!
//! [`Wallet`] is the public view: everything except key material.
//! `WalletRecord` is what the registry stores and never leaves this module
//! tree. The invariant tying them together:
//!
//! ```text
//! kind = WatchOnly   => ciphertext absent
//! kind = PrivateKey  => ciphertext present, and it decrypts to the key of `address`
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::codec::address::Address;
use crate::error::{PaymentError, PaymentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletKind {
    PrivateKey,
    WatchOnly,
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletKind::PrivateKey => f.write_str("private-key"),
            WalletKind::WatchOnly => f.write_str("watch-only"),
        }
    }
}

/// Public view of a wallet. Carries no key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: String,
    pub name: String,
    pub address: Address,
    pub kind: WalletKind,
    pub created_at_millis: i64,
}

impl Wallet {
    pub fn can_sign(&self) -> bool {
        self.kind == WalletKind::PrivateKey
    }
}

/// Stored form. `private_key_ciphertext` is base64 of `seal(master, key, id)`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WalletRecord {
    pub id: String,
    pub name: String,
    pub address: Address,
    pub kind: WalletKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_ciphertext: Option<String>,
    pub created_at_millis: i64,
}

impl WalletRecord {
    pub fn view(&self) -> Wallet {
        Wallet {
            id: self.id.clone(),
            name: self.name.clone(),
            address: self.address,
            kind: self.kind,
            created_at_millis: self.created_at_millis,
        }
    }

    /// Kind and ciphertext presence must agree.
    pub fn check_shape(&self) -> PaymentResult<()> {
        match (self.kind, &self.private_key_ciphertext) {
            (WalletKind::PrivateKey, Some(_)) | (WalletKind::WatchOnly, None) => Ok(()),
            (kind, _) => Err(PaymentError::KeyStoreError(format!(
                "wallet {} is {kind} but its key material does not match",
                self.id
            ))),
        }
    }
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("address", &self.address)
            .field("kind", &self.kind)
            .field("sealed", &self.private_key_ciphertext.is_some())
            .finish()
    }
}

/// The decrypted registry payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Registry {
    #[serde(default)]
    pub current_id: Option<String>,
    #[serde(default)]
    pub wallets: Vec<WalletRecord>,
}

impl Registry {
    pub fn find(&self, id: &str) -> PaymentResult<&WalletRecord> {
        self.wallets
            .iter()
            .find(|w| w.id == id)
            .ok_or_else(|| PaymentError::WalletNotFound(id.to_string()))
    }

    pub fn find_mut(&mut self, id: &str) -> PaymentResult<&mut WalletRecord> {
        self.wallets
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| PaymentError::WalletNotFound(id.to_string()))
    }

    pub fn ensure_unique(&self, address: &Address, except_id: Option<&str>) -> PaymentResult<()> {
        let clash = self
            .wallets
            .iter()
            .any(|w| w.address == *address && Some(w.id.as_str()) != except_id);
        if clash {
            Err(PaymentError::DuplicateWallet(address.encode()))
        } else {
            Ok(())
        }
    }

    /// Appends `record`; the first wallet ever added becomes current.
    pub fn push(&mut self, record: WalletRecord) {
        if self.current_id.is_none() {
            self.current_id = Some(record.id.clone());
        }
        self.wallets.push(record);
    }

    pub fn current(&self) -> Option<&WalletRecord> {
        let id = self.current_id.as_deref()?;
        self.wallets.iter().find(|w| w.id == id)
    }

    /// Removes `id`. If it was current, the earliest remaining wallet by
    /// creation order takes over, or nothing if none remain.
    pub fn remove(&mut self, id: &str) -> PaymentResult<WalletRecord> {
        let idx = self
            .wallets
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| PaymentError::WalletNotFound(id.to_string()))?;
        let removed = self.wallets.remove(idx);

        if self.current_id.as_deref() == Some(id) {
            self.current_id = self
                .wallets
                .iter()
                .min_by_key(|w| w.created_at_millis)
                .map(|w| w.id.clone());
        }
        Ok(removed)
    }
}

/// Pre-registry single-wallet layout.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LegacyWallet {
    #[serde(default)]
    pub private_key: Option<String>,
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Drop for LegacyWallet {
    fn drop(&mut self) {
        if let Some(key) = self.private_key.as_mut() {
            key.zeroize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, created: i64, kind: WalletKind) -> WalletRecord {
        WalletRecord {
            id: id.into(),
            name: id.into(),
            address: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".parse().unwrap(),
            kind,
            private_key_ciphertext: match kind {
                WalletKind::PrivateKey => Some("c2VhbGVk".into()),
                WalletKind::WatchOnly => None,
            },
            created_at_millis: created,
        }
    }

    #[test]
    fn first_push_becomes_current() {
        let mut reg = Registry::default();
        reg.push(record("a", 1, WalletKind::WatchOnly));
        reg.push(record("b", 2, WalletKind::WatchOnly));
        assert_eq!(reg.current_id.as_deref(), Some("a"));
    }

    #[test]
    fn deleting_current_selects_earliest_remaining() {
        let mut reg = Registry::default();
        reg.push(record("a", 1, WalletKind::WatchOnly));
        reg.push(record("b", 3, WalletKind::WatchOnly));
        reg.push(record("c", 2, WalletKind::WatchOnly));
        reg.current_id = Some("b".into());

        reg.remove("b").unwrap();
        assert_eq!(reg.current_id.as_deref(), Some("a"));
        reg.remove("a").unwrap();
        assert_eq!(reg.current_id.as_deref(), Some("c"));
        reg.remove("c").unwrap();
        assert_eq!(reg.current_id, None);
    }

    #[test]
    fn deleting_other_keeps_current() {
        let mut reg = Registry::default();
        reg.push(record("a", 1, WalletKind::WatchOnly));
        reg.push(record("b", 2, WalletKind::WatchOnly));
        reg.remove("b").unwrap();
        assert_eq!(reg.current_id.as_deref(), Some("a"));
        assert!(matches!(reg.remove("zzz"), Err(PaymentError::WalletNotFound(_))));
    }

    #[test]
    fn shape_check() {
        record("a", 1, WalletKind::PrivateKey).check_shape().unwrap();
        let mut bad = record("b", 1, WalletKind::WatchOnly);
        bad.private_key_ciphertext = Some("x".into());
        assert!(bad.check_shape().is_err());
    }

    #[test]
    fn record_json_omits_absent_ciphertext() {
        let json = serde_json::to_value(record("a", 7, WalletKind::WatchOnly)).unwrap();
        assert!(json.get("privateKeyCiphertext").is_none());
        assert_eq!(json["createdAtMillis"], 7);
        assert_eq!(json["kind"], "WatchOnly");
    }
}
