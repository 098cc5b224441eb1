//! # Key Management
//!
//! secp256k1 keypairs for TRON accounts.
//!
//! A [`TronKeypair`] wraps a `k256` signing key. The secret scalar is
//! zeroized when the keypair is dropped (k256 does this for us), and every
//! accessor that hands out secret bytes wraps them in [`Zeroizing`] so the
//! copy is wiped too.
//!
//! Key bytes are never logged. `Debug` prints the derived address only.

use std::fmt;

use k256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::codec::address::Address;
use crate::config::{PRIVATE_KEY_LENGTH, PUBLIC_KEY_LENGTH};

/// Errors that can occur while loading key material.
///
/// Intentionally silent about the bytes involved.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("private key must be 64 hex digits (optionally prefixed with 0x)")]
    InvalidHex,

    #[error("invalid secret key: not a valid secp256k1 scalar")]
    InvalidSecretKey,
}

/// A secp256k1 keypair controlling one TRON address.
pub struct TronKeypair {
    signing_key: SigningKey,
}

impl TronKeypair {
    /// Fresh keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Loads a 32-byte big-endian secret scalar. Zero and values `>= n` are
    /// rejected.
    pub fn from_bytes(secret: &[u8]) -> Result<Self, KeyError> {
        if secret.len() != PRIVATE_KEY_LENGTH {
            return Err(KeyError::InvalidSecretKey);
        }
        let signing_key = SigningKey::from_slice(secret).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self { signing_key })
    }

    /// Loads a hex secret, with or without a `0x` prefix.
    pub fn from_hex(input: &str) -> Result<Self, KeyError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != PRIVATE_KEY_LENGTH * 2 {
            return Err(KeyError::InvalidHex);
        }
        let bytes = Zeroizing::new(hex::decode(digits).map_err(|_| KeyError::InvalidHex)?);
        Self::from_bytes(&bytes)
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Uncompressed SEC1 public key, `0x04 || x || y`.
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        let point = self.verifying_key().to_encoded_point(false);
        let mut out = [0u8; PUBLIC_KEY_LENGTH];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// The TRON address this key controls.
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key())
    }

    /// Raw secret scalar. Wiped when the returned value is dropped.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; PRIVATE_KEY_LENGTH]> {
        Zeroizing::new(self.signing_key.to_bytes().into())
    }

    /// Lowercase hex secret, for backup export only.
    pub fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(*self.secret_bytes()))
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for TronKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TronKeypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(n: u8) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[31] = n;
        bytes
    }

    #[test]
    fn generator_point_address() {
        // Secret 1 => public key G.
        let kp = TronKeypair::from_bytes(&scalar(1)).unwrap();
        let pk = kp.public_key();
        assert_eq!(pk[0], 0x04);
        assert_eq!(
            hex::encode(&pk[1..33]),
            "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
        assert_eq!(kp.address().encode(), "TMVQGm1qAQYVdetCeGRRkTWYYrLXuHK2HC");
    }

    #[test]
    fn second_scalar_address() {
        let kp = TronKeypair::from_bytes(&scalar(2)).unwrap();
        assert_eq!(kp.address().encode(), "TDvSsdrNM5eeXNL3czpa6AxLDHZA9nwe9K");
    }

    #[test]
    fn hex_accepts_optional_prefix() {
        let plain = format!("{:0>64}", "1");
        let a = TronKeypair::from_hex(&plain).unwrap();
        let b = TronKeypair::from_hex(&format!("0x{plain}")).unwrap();
        assert_eq!(a.address(), b.address());
        assert_eq!(a.secret_hex().as_str(), plain);
    }

    #[test]
    fn hex_rejects_wrong_length_and_digits() {
        assert!(matches!(TronKeypair::from_hex("abcd"), Err(KeyError::InvalidHex)));
        let bad = "zz".repeat(32);
        assert!(matches!(TronKeypair::from_hex(&bad), Err(KeyError::InvalidHex)));
    }

    #[test]
    fn zero_scalar_rejected() {
        assert!(matches!(
            TronKeypair::from_bytes(&[0u8; 32]),
            Err(KeyError::InvalidSecretKey)
        ));
    }

    #[test]
    fn generated_keys_round_trip_through_bytes() {
        let kp = TronKeypair::generate();
        let again = TronKeypair::from_bytes(&*kp.secret_bytes()).unwrap();
        assert_eq!(kp.address(), again.address());
    }

    #[test]
    fn debug_does_not_print_secret() {
        let kp = TronKeypair::from_bytes(&scalar(1)).unwrap();
        let printed = format!("{:?}", kp);
        assert!(printed.contains("TMVQGm1qAQYVdetCeGRRkTWYYrLXuHK2HC"));
        assert!(!printed.contains(&"0".repeat(63)));
    }
}
