//! Core transaction types.
//!
//! An [`UnsignedTransaction`] is its raw protobuf bytes plus the fields we
//! decoded from them. There is no way to build one except by decoding bytes
//! that already passed the structural validator, so the cached fields can
//! never drift from what will actually be signed.

use std::fmt;

use prost::Message;
use serde::{Deserialize, Serialize};

use super::proto::TransactionEnvelope;
use super::verification::{validate_raw, TransferFields};
use crate::codec::address::Address;
use crate::crypto::hash::sha256;
use crate::crypto::signatures::RecoverableSignature;
use crate::error::{PaymentError, PaymentResult};

// ---------------------------------------------------------------------------
// TaposSource
// ---------------------------------------------------------------------------

/// Where the reference-block fields came from.
///
/// Only `Node` transactions can be broadcast. `Synthetic` ones exist for
/// offline tests and demos and are refused by the broadcaster with `NoTapos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaposSource {
    Node,
    Synthetic,
}

// ---------------------------------------------------------------------------
// UnsignedTransaction
// ---------------------------------------------------------------------------

/// A validated, not yet signed TRX transfer.
#[derive(Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    raw_bytes: Vec<u8>,
    fields: TransferFields,
    tx_id: [u8; 32],
    tapos: TaposSource,
}

impl UnsignedTransaction {
    /// Decodes `raw_data` bytes and runs the structural validator over them.
    ///
    /// The result is tagged [`TaposSource::Node`]; the offline builder
    /// re-tags its output.
    pub fn from_raw_bytes(raw_bytes: Vec<u8>) -> PaymentResult<Self> {
        let fields = validate_raw(&raw_bytes)?;
        let tx_id = sha256(&raw_bytes);
        Ok(Self {
            raw_bytes,
            fields,
            tx_id,
            tapos: TaposSource::Node,
        })
    }

    pub(crate) fn with_tapos_source(mut self, tapos: TaposSource) -> Self {
        self.tapos = tapos;
        self
    }

    /// The exact bytes that are hashed, signed and broadcast.
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    pub(crate) fn fields(&self) -> &TransferFields {
        &self.fields
    }

    /// `SHA-256(raw_bytes)`; also the signing digest.
    pub fn tx_id(&self) -> &[u8; 32] {
        &self.tx_id
    }

    pub fn tx_id_hex(&self) -> String {
        hex::encode(self.tx_id)
    }

    pub fn owner(&self) -> &Address {
        &self.fields.owner
    }

    pub fn to(&self) -> &Address {
        &self.fields.to
    }

    pub fn amount(&self) -> i64 {
        self.fields.amount
    }

    pub fn timestamp(&self) -> i64 {
        self.fields.timestamp
    }

    pub fn expiration(&self) -> i64 {
        self.fields.expiration
    }

    pub fn fee_limit(&self) -> i64 {
        self.fields.fee_limit
    }

    pub fn ref_block_bytes(&self) -> &[u8] {
        &self.fields.ref_block_bytes
    }

    pub fn ref_block_hash(&self) -> &[u8] {
        &self.fields.ref_block_hash
    }

    /// Big-endian value of `ref_block_bytes`: the low 16 bits of the
    /// reference block height.
    pub fn ref_block_height(&self) -> u64 {
        self.fields
            .ref_block_bytes
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
    }

    pub fn tapos(&self) -> TaposSource {
        self.tapos
    }

    /// `true` once `now_ms` has reached the expiration time.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.fields.expiration <= now_ms
    }
}

impl fmt::Debug for UnsignedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsignedTransaction")
            .field("tx_id", &self.tx_id_hex())
            .field("owner", &self.fields.owner)
            .field("to", &self.fields.to)
            .field("amount", &self.fields.amount)
            .field("expiration", &self.fields.expiration)
            .field("tapos", &self.tapos)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SignedTransaction
// ---------------------------------------------------------------------------

/// An unsigned transaction plus its signature list.
///
/// A well-formed signed transfer has exactly one 65-byte signature; the
/// list form exists so transactions decoded from the outside can be checked
/// for that instead of assumed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignedTransaction {
    unsigned: UnsignedTransaction,
    signatures: Vec<Vec<u8>>,
}

impl SignedTransaction {
    /// Attaches `signature` as the sole signature.
    pub fn new(unsigned: UnsignedTransaction, signature: RecoverableSignature) -> Self {
        Self {
            unsigned,
            signatures: vec![signature.to_bytes().to_vec()],
        }
    }

    /// Wraps arbitrary signature bytes. Run the validator before trusting it.
    pub fn from_parts(unsigned: UnsignedTransaction, signatures: Vec<Vec<u8>>) -> Self {
        Self {
            unsigned,
            signatures,
        }
    }

    /// Decodes a serialized `protocol.Transaction`.
    pub fn from_envelope_bytes(bytes: &[u8]) -> PaymentResult<Self> {
        let envelope = TransactionEnvelope::decode(bytes)
            .map_err(|e| PaymentError::MalformedTransaction(format!("transaction: {e}")))?;
        let unsigned = UnsignedTransaction::from_raw_bytes(envelope.raw_data)?;
        Ok(Self::from_parts(unsigned, envelope.signature))
    }

    pub fn unsigned(&self) -> &UnsignedTransaction {
        &self.unsigned
    }

    pub fn signatures(&self) -> &[Vec<u8>] {
        &self.signatures
    }

    /// The first signature, parsed. Fails when absent or malformed.
    pub fn signature(&self) -> PaymentResult<RecoverableSignature> {
        let first = self
            .signatures
            .first()
            .ok_or_else(|| PaymentError::MalformedTransaction("transaction is unsigned".into()))?;
        RecoverableSignature::from_bytes(first)
    }

    pub fn tx_id(&self) -> &[u8; 32] {
        self.unsigned.tx_id()
    }

    pub fn tx_id_hex(&self) -> String {
        self.unsigned.tx_id_hex()
    }

    /// Serialized `protocol.Transaction` with the original raw bytes verbatim.
    pub fn to_envelope_bytes(&self) -> Vec<u8> {
        TransactionEnvelope {
            raw_data: self.unsigned.raw_bytes.clone(),
            signature: self.signatures.clone(),
        }
        .encode_to_vec()
    }

    /// Hex of [`to_envelope_bytes`](Self::to_envelope_bytes), as the node wants it.
    pub fn to_broadcast_hex(&self) -> String {
        hex::encode(self.to_envelope_bytes())
    }
}
