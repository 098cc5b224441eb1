//! Canonical QR payloads.
//!
//! Both payloads are UTF-8 JSON with a fixed key order (struct field order),
//! so the same transaction always yields the same text:
//!
//! ```text
//! unsigned: {"v","type","from","to","amount","refBlock","refBlockHeight","expiration","timestamp","rawData"}
//! signed:   {"v","type","to","amount","signature","signedTx"}
//! ```
//!
//! The human-readable fields exist so a cold signer can show them. They are
//! never trusted: [`UnsignedPayload::to_transaction`] re-derives each one
//! from `rawData` and treats any disagreement as tampering.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::{QR_PAYLOAD_TYPE, QR_PAYLOAD_VERSION, SIGNATURE_LENGTH};
use crate::crypto::signatures::RecoverableSignature;
use crate::error::{PaymentError, PaymentResult};
use crate::transaction::types::{SignedTransaction, UnsignedTransaction};

fn malformed(reason: impl Into<String>) -> PaymentError {
    PaymentError::QrMalformed(reason.into())
}

fn check_header(v: &str, kind: &str) -> PaymentResult<()> {
    if v != QR_PAYLOAD_VERSION {
        return Err(malformed(format!("unsupported payload version {v:?}")));
    }
    if kind != QR_PAYLOAD_TYPE {
        return Err(malformed(format!("unsupported payload type {kind:?}")));
    }
    Ok(())
}

fn b64_field(name: &str, value: &str) -> PaymentResult<Vec<u8>> {
    B64.decode(value)
        .map_err(|e| malformed(format!("{name} is not base64: {e}")))
}

// ---------------------------------------------------------------------------
// Unsigned
// ---------------------------------------------------------------------------

/// What the online device shows the cold signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UnsignedPayload {
    pub v: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub from: String,
    pub to: String,
    pub amount: u64,
    /// Base64 of `ref_block_hash`.
    pub ref_block: String,
    /// Big-endian value of `ref_block_bytes`.
    pub ref_block_height: u64,
    pub expiration: i64,
    pub timestamp: i64,
    /// Base64 of the exact `raw_data` bytes.
    pub raw_data: String,
}

impl UnsignedPayload {
    pub fn from_transaction(tx: &UnsignedTransaction) -> Self {
        Self {
            v: QR_PAYLOAD_VERSION.to_string(),
            kind: QR_PAYLOAD_TYPE.to_string(),
            from: tx.owner().encode(),
            to: tx.to().encode(),
            amount: tx.amount().unsigned_abs(),
            ref_block: B64.encode(tx.ref_block_hash()),
            ref_block_height: tx.ref_block_height(),
            expiration: tx.expiration(),
            timestamp: tx.timestamp(),
            raw_data: B64.encode(tx.raw_bytes()),
        }
    }

    pub fn to_json(&self) -> PaymentResult<String> {
        serde_json::to_string(self).map_err(|e| malformed(e.to_string()))
    }

    pub fn from_json(json: &str) -> PaymentResult<Self> {
        let payload: Self = serde_json::from_str(json)
            .map_err(|e| malformed(format!("unsigned payload: {e}")))?;
        check_header(&payload.v, &payload.kind)?;
        Ok(payload)
    }

    pub fn raw_bytes(&self) -> PaymentResult<Vec<u8>> {
        b64_field("rawData", &self.raw_data)
    }

    /// Decodes `rawData` and checks every displayed field against it.
    pub fn to_transaction(&self) -> PaymentResult<UnsignedTransaction> {
        let tx = UnsignedTransaction::from_raw_bytes(self.raw_bytes()?)?;

        let tamper = |field: &str| {
            Err(PaymentError::TamperDetected(format!(
                "displayed {field} does not match rawData"
            )))
        };
        if self.from != tx.owner().encode() {
            return tamper("from");
        }
        if self.to != tx.to().encode() {
            return tamper("to");
        }
        if self.amount != tx.amount().unsigned_abs() {
            return tamper("amount");
        }
        if b64_field("refBlock", &self.ref_block)? != tx.ref_block_hash() {
            return tamper("refBlock");
        }
        if self.ref_block_height != tx.ref_block_height() {
            return tamper("refBlockHeight");
        }
        if self.expiration != tx.expiration() {
            return tamper("expiration");
        }
        if self.timestamp != tx.timestamp() {
            return tamper("timestamp");
        }
        Ok(tx)
    }
}

// ---------------------------------------------------------------------------
// Signed
// ---------------------------------------------------------------------------

/// What the cold signer shows back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignedPayload {
    pub v: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub to: String,
    pub amount: u64,
    /// Base64 of `r || s || v`.
    pub signature: String,
    /// Base64 of the serialized signed transaction. Advisory only.
    pub signed_tx: String,
}

impl SignedPayload {
    pub fn from_signed(tx: &SignedTransaction) -> PaymentResult<Self> {
        let signature = tx.signature()?;
        Ok(Self {
            v: QR_PAYLOAD_VERSION.to_string(),
            kind: QR_PAYLOAD_TYPE.to_string(),
            to: tx.unsigned().to().encode(),
            amount: tx.unsigned().amount().unsigned_abs(),
            signature: B64.encode(signature.to_bytes()),
            signed_tx: B64.encode(tx.to_envelope_bytes()),
        })
    }

    pub fn to_json(&self) -> PaymentResult<String> {
        serde_json::to_string(self).map_err(|e| malformed(e.to_string()))
    }

    pub fn from_json(json: &str) -> PaymentResult<Self> {
        let payload: Self = serde_json::from_str(json)
            .map_err(|e| malformed(format!("signed payload: {e}")))?;
        check_header(&payload.v, &payload.kind)?;
        Ok(payload)
    }

    pub fn signature(&self) -> PaymentResult<RecoverableSignature> {
        let bytes = b64_field("signature", &self.signature)?;
        if bytes.len() != SIGNATURE_LENGTH {
            return Err(malformed(format!(
                "signature must be {SIGNATURE_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        RecoverableSignature::from_bytes(&bytes)
    }

    pub fn signed_tx_bytes(&self) -> PaymentResult<Vec<u8>> {
        b64_field("signedTx", &self.signed_tx)
    }
}
