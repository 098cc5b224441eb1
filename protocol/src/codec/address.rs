//! TRON Base58Check addresses.
//!
//! A raw address is 21 bytes: the network byte `0x41` followed by the last
//! 20 bytes of `keccak256(pubkey_x || pubkey_y)`. The textual form appends a
//! 4-byte `double_sha256` checksum and Base58-encodes the 25 bytes, which
//! always yields 34 characters starting with `T`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{
    ADDRESS_BASE58_LENGTH, ADDRESS_CHECKSUM_LENGTH, ADDRESS_PREFIX, ADDRESS_RAW_LENGTH,
    PUBLIC_KEY_LENGTH,
};
use crate::crypto::hash::{double_sha256, keccak256};
use crate::error::{PaymentError, PaymentResult};

/// A validated 21-byte TRON address.
///
/// Construction always goes through a check, so holding an `Address` means
/// the prefix byte is `0x41`. Serializes as its Base58Check string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_RAW_LENGTH]);

impl Address {
    /// Accepts raw bytes as they appear inside a protobuf `TransferContract`.
    pub fn from_raw(bytes: &[u8]) -> PaymentResult<Self> {
        if bytes.len() != ADDRESS_RAW_LENGTH {
            return Err(PaymentError::InvalidAddress(format!(
                "raw address must be {ADDRESS_RAW_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0] != ADDRESS_PREFIX {
            return Err(PaymentError::InvalidAddress(format!(
                "raw address must start with 0x41, got 0x{:02x}",
                bytes[0]
            )));
        }
        let mut raw = [0u8; ADDRESS_RAW_LENGTH];
        raw.copy_from_slice(bytes);
        Ok(Self(raw))
    }

    /// Derives the address of an uncompressed SEC1 public key (`0x04 || x || y`).
    pub fn from_public_key(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> Self {
        let digest = keccak256(&public_key[1..]);
        let mut raw = [0u8; ADDRESS_RAW_LENGTH];
        raw[0] = ADDRESS_PREFIX;
        raw[1..].copy_from_slice(&digest[12..]);
        Self(raw)
    }

    /// Parses and checksums a Base58Check string.
    pub fn decode(s: &str) -> PaymentResult<Self> {
        let invalid = |reason: &str| PaymentError::InvalidAddress(format!("{s:?}: {reason}"));

        if s.len() != ADDRESS_BASE58_LENGTH {
            return Err(invalid("expected 34 characters"));
        }
        if !s.starts_with('T') {
            return Err(invalid("must start with 'T'"));
        }

        let decoded = bs58::decode(s)
            .into_vec()
            .map_err(|_| invalid("character outside the Base58 alphabet"))?;
        if decoded.len() != ADDRESS_RAW_LENGTH + ADDRESS_CHECKSUM_LENGTH {
            return Err(invalid("wrong decoded length"));
        }

        let (payload, checksum) = decoded.split_at(ADDRESS_RAW_LENGTH);
        if double_sha256(payload)[..ADDRESS_CHECKSUM_LENGTH] != *checksum {
            return Err(invalid("checksum mismatch"));
        }

        Self::from_raw(payload)
    }

    /// Canonical 34-character Base58Check form.
    pub fn encode(&self) -> String {
        let mut buf = Vec::with_capacity(ADDRESS_RAW_LENGTH + ADDRESS_CHECKSUM_LENGTH);
        buf.extend_from_slice(&self.0);
        buf.extend_from_slice(&double_sha256(&self.0)[..ADDRESS_CHECKSUM_LENGTH]);
        bs58::encode(buf).into_string()
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_RAW_LENGTH] {
        &self.0
    }

    /// Lowercase hex of the raw form, as the node prints it with `visible=false`.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Accepts either Base58Check or 42-char hex, whichever the node sent.
    pub fn from_node_repr(s: &str) -> PaymentResult<Self> {
        if s.len() == ADDRESS_RAW_LENGTH * 2 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            let bytes = hex::decode(s).map_err(|e| PaymentError::InvalidAddress(e.to_string()))?;
            return Self::from_raw(&bytes);
        }
        Self::decode(s)
    }
}

/// Free-function form of [`Address::decode`] returning the raw bytes.
pub fn decode(s: &str) -> PaymentResult<[u8; ADDRESS_RAW_LENGTH]> {
    Address::decode(s).map(|a| a.0)
}

/// Free-function form of [`Address::encode`] over raw bytes.
pub fn encode(bytes: &[u8]) -> PaymentResult<String> {
    Address::from_raw(bytes).map(|a| a.encode())
}

impl FromStr for Address {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s.trim())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.encode())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::decode(&s).map_err(serde::de::Error::custom)
    }
}
