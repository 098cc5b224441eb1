//! # Hashing Utilities
//!
//! TRON uses two hash functions and we refuse to support more:
//!
//! - **SHA-256** for transaction ids and signing digests (`txID =
//!   SHA-256(raw_data)`), and doubled for the Base58Check address checksum.
//! - **Keccak-256** (the pre-standard SHA-3 variant Ethereum also uses) for
//!   deriving an address from a public key.
//!
//! Everything returns fixed-size arrays. A transaction id is exactly 32
//! bytes and the type says so.

use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// SHA-256 of `data`.
///
/// # Example
///
/// ```
/// use trxsafe_protocol::crypto::sha256;
///
/// let hash = sha256(b"trxsafe");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `SHA-256(SHA-256(data))`. The first four bytes are the Base58Check
/// checksum of an address.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Keccak-256 of `data`. Not the same as NIST SHA3-256: the padding differs.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn keccak_is_not_sha3() {
        // Keccak-256 of the empty string, as used by Ethereum and TRON.
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn double_sha256_differs_from_single() {
        let data = b"transfer";
        assert_ne!(sha256(data), double_sha256(data));
        assert_eq!(double_sha256(data), sha256(&sha256(data)));
    }
}
