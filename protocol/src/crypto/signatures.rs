//! # Recoverable ECDSA Signatures
//!
//! TRON signs `SHA-256(raw_data)` with secp256k1 ECDSA and appends a
//! recovery byte so verifiers can rebuild the public key from the signature
//! alone. The wire form is 65 bytes: `r(32) || s(32) || v(1)` with
//! `v = recovery_id + 27`.
//!
//! ## What we guarantee
//!
//! - **Deterministic k.** Nonces come from RFC 6979 (HMAC-SHA-256) inside
//!   `k256`, so the same key and digest always yield the same signature.
//! - **Low s.** `s` is normalized to `s <= n/2` before anything else looks
//!   at it.
//! - **Verified v.** Every candidate recovery id `0..=3` is tried and the one
//!   that rebuilds *our* public key is kept. If none does, signing fails with
//!   `CryptoFailure`; we never fall back to a guess.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use super::keys::TronKeypair;
use crate::codec::address::Address;
use crate::config::{PUBLIC_KEY_LENGTH, RECOVERY_ID_OFFSET, SIGNATURE_LENGTH};
use crate::error::{PaymentError, PaymentResult};

/// A 65-byte `r || s || v` signature with `v` already offset by 27.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RecoverableSignature {
    r: [u8; 32],
    s: [u8; 32],
    v: u8,
}

impl RecoverableSignature {
    /// Parses the 65-byte wire form. `v` must be in `27..=30`.
    pub fn from_bytes(bytes: &[u8]) -> PaymentResult<Self> {
        if bytes.len() != SIGNATURE_LENGTH {
            return Err(PaymentError::CryptoFailure(format!(
                "signature must be {SIGNATURE_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        let v = bytes[64];
        if !(RECOVERY_ID_OFFSET..RECOVERY_ID_OFFSET + 4).contains(&v) {
            return Err(PaymentError::CryptoFailure(format!(
                "recovery byte {v} outside 27..=30"
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, v })
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        let mut out = [0u8; SIGNATURE_LENGTH];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// The offset recovery byte (27..=30).
    pub fn v(&self) -> u8 {
        self.v
    }

    fn ecdsa(&self) -> PaymentResult<Signature> {
        let mut rs = [0u8; 64];
        rs[..32].copy_from_slice(&self.r);
        rs[32..].copy_from_slice(&self.s);
        Signature::from_slice(&rs).map_err(|e| PaymentError::CryptoFailure(e.to_string()))
    }

    /// `true` when `s <= n/2`.
    pub fn is_low_s(&self) -> bool {
        match self.ecdsa() {
            Ok(sig) => sig.normalize_s().is_none(),
            Err(_) => false,
        }
    }
}

/// Signs a 32-byte digest with RFC 6979 nonces, low-s, and a verified
/// recovery byte.
pub fn sign_digest(keypair: &TronKeypair, digest: &[u8; 32]) -> PaymentResult<RecoverableSignature> {
    let (signature, _) = keypair
        .signing_key()
        .sign_prehash_recoverable(digest)
        .map_err(|e| PaymentError::CryptoFailure(e.to_string()))?;

    // k256 already emits low-s; normalizing again is a no-op in that case.
    let signature = signature.normalize_s().unwrap_or(signature);
    let expected = keypair.verifying_key();

    let recovery_id = (0u8..4)
        .filter_map(RecoveryId::from_byte)
        .find(|id| {
            VerifyingKey::recover_from_prehash(digest, &signature, *id)
                .map(|recovered| &recovered == expected)
                .unwrap_or(false)
        })
        .ok_or_else(|| {
            PaymentError::CryptoFailure("no recovery id reproduces the signing key".into())
        })?;

    let bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);

    Ok(RecoverableSignature {
        r,
        s,
        v: recovery_id.to_byte() + RECOVERY_ID_OFFSET,
    })
}

/// Rebuilds the uncompressed public key that produced `signature` over `digest`.
pub fn recover_public_key(
    digest: &[u8; 32],
    signature: &RecoverableSignature,
) -> PaymentResult<[u8; PUBLIC_KEY_LENGTH]> {
    let sig = signature.ecdsa()?;
    let id = RecoveryId::from_byte(signature.v - RECOVERY_ID_OFFSET)
        .ok_or_else(|| PaymentError::CryptoFailure("invalid recovery id".into()))?;
    let key = VerifyingKey::recover_from_prehash(digest, &sig, id)
        .map_err(|e| PaymentError::CryptoFailure(e.to_string()))?;

    let point = key.to_encoded_point(false);
    let mut out = [0u8; PUBLIC_KEY_LENGTH];
    out.copy_from_slice(point.as_bytes());
    Ok(out)
}

/// The TRON address that produced `signature` over `digest`.
pub fn recover_address(
    digest: &[u8; 32],
    signature: &RecoverableSignature,
) -> PaymentResult<Address> {
    recover_public_key(digest, signature).map(|pk| Address::from_public_key(&pk))
}
