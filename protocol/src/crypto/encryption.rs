//! # AES-256-GCM Sealing
//!
//! Authenticated encryption for everything the key store writes to disk: the
//! wallet registry as a whole, and each private key inside it.
//!
//! ## Wire format
//!
//! [`seal`] returns `nonce || ciphertext || tag` as one `Vec<u8>`. The first
//! 12 bytes are a random nonce from the OS CSPRNG; [`open`] expects exactly
//! that layout back.
//!
//! ## Associated data
//!
//! Both functions take an AAD slice. The registry blob uses a fixed domain
//! label; per-wallet key ciphertexts use the wallet id, so a ciphertext moved
//! onto a different wallet record fails authentication instead of silently
//! signing for the wrong address.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use thiserror::Error;

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH};

/// Errors from sealing or opening.
///
/// Kept deliberately vague: "wrong key" and "corrupted blob" look the same
/// from the outside.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    DecryptFailed,

    #[error("invalid key length: expected {AES_KEY_LENGTH} bytes")]
    InvalidKeyLength,

    #[error("ciphertext too short: must be at least {AES_NONCE_LENGTH} bytes")]
    CiphertextTooShort,
}

/// Encrypt `plaintext` under `key`, binding `aad`. Returns `nonce || ciphertext`.
pub fn seal(
    key: &[u8; AES_KEY_LENGTH],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::InvalidKeyLength)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::EncryptFailed)?;

    let mut out = Vec::with_capacity(AES_NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a blob produced by [`seal`] with the same key and AAD.
pub fn open(
    key: &[u8; AES_KEY_LENGTH],
    sealed: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    if sealed.len() < AES_NONCE_LENGTH {
        return Err(EncryptionError::CiphertextTooShort);
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(AES_NONCE_LENGTH);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::InvalidKeyLength)?;

    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn seal_then_open() {
        let key = test_key();
        let sealed = seal(&key, b"wallet registry", b"registry").unwrap();
        assert_eq!(sealed.len(), AES_NONCE_LENGTH + 15 + 16);
        assert_eq!(open(&key, &sealed, b"registry").unwrap(), b"wallet registry");
    }

    #[test]
    fn wrong_key_fails() {
        let key = test_key();
        let sealed = seal(&key, b"secret", b"").unwrap();
        let mut wrong = test_key();
        wrong[0] ^= 0xFF;
        assert!(matches!(
            open(&wrong, &sealed, b""),
            Err(EncryptionError::DecryptFailed)
        ));
    }

    #[test]
    fn wrong_aad_fails() {
        // A key sealed for one wallet id must not open under another.
        let key = test_key();
        let sealed = seal(&key, b"private key", b"wallet-a").unwrap();
        assert!(open(&key, &sealed, b"wallet-b").is_err());
    }

    #[test]
    fn flipped_bit_fails() {
        let key = test_key();
        let mut sealed = seal(&key, b"secret", b"").unwrap();
        sealed[AES_NONCE_LENGTH] ^= 0x01;
        assert!(open(&key, &sealed, b"").is_err());
    }

    #[test]
    fn nonces_are_fresh() {
        let key = test_key();
        let a = seal(&key, b"same", b"").unwrap();
        let b = seal(&key, b"same", b"").unwrap();
        assert_ne!(&a[..AES_NONCE_LENGTH], &b[..AES_NONCE_LENGTH]);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert!(matches!(
            open(&test_key(), &[0u8; 4], b""),
            Err(EncryptionError::CiphertextTooShort)
        ));
    }
}
