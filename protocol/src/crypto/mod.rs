//! # Cryptographic Primitives
//!
//! Everything security-related in the engine flows through here: hashing,
//! secp256k1 keys, recoverable signatures, and AES-256-GCM sealing for the
//! key store.
//!
//! Boring, well-audited choices only:
//!
//! - **secp256k1 ECDSA** via `k256`, because that is what TRON verifies.
//! - **SHA-256 / Keccak-256** via `sha2` / `sha3`, because that is what TRON
//!   hashes with.
//! - **AES-256-GCM** via `aes-gcm` for data at rest.
//!
//! Everything here is a thin, type-safe wrapper. If you're tempted to
//! optimize these functions, please reconsider.

pub mod encryption;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use encryption::{open, seal};
pub use hash::{double_sha256, keccak256, sha256};
pub use keys::{KeyError, TronKeypair};
pub use signatures::{recover_address, recover_public_key, sign_digest, RecoverableSignature};
