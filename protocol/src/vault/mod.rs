//! # Vault Module: Encrypted Wallet Registry
//!
//! The vault is where keys live. Every private key the engine knows about is
//! sealed here, and the only ways back out are a signature or an explicit
//! backup export.
//!
//! ## Architecture
//!
//! ```text
//! master_key.rs - MasterKeyProvider: where the AES-256 master key comes from
//! wallet.rs     - Wallet view, stored records, registry and legacy layouts
//! keystore.rs   - KeyStore: lifecycle, current selector, signing, export
//! ```
//!
//! ## Design Principles
//!
//! 1. **One owner.** The [`KeyStore`] exclusively owns every wallet record.
//!    Callers get [`Wallet`] views with no key material in them.
//!
//! 2. **Two kinds, pattern-matched.** [`WalletKind::PrivateKey`] and
//!    [`WalletKind::WatchOnly`]. A watch-only wallet is refused at the door
//!    of every signing path.
//!
//! 3. **Atomic writes.** The registry is one sealed blob, replaced whole.

pub mod keystore;
pub mod master_key;
pub mod wallet;

pub use keystore::KeyStore;
pub use master_key::{FileMasterKey, MasterKey, MasterKeyProvider, StaticMasterKey};
pub use wallet::{Wallet, WalletKind};
