//! # Error Taxonomy
//!
//! One closed set of errors for everything that crosses the engine's public
//! boundary. Validation and safety violations are always fatal: nothing in
//! this crate retries them or turns them into warnings.
//!
//! Leaf modules with a purely local concern (AES-GCM, blob storage) keep
//! their own small error enums. Inside the key store both collapse into
//! [`PaymentError::KeyStoreError`], so callers never branch on crypto or I/O
//! internals.

use thiserror::Error;

use crate::crypto::encryption::EncryptionError;
use crate::crypto::keys::KeyError;
use crate::storage::StoreError;

/// Every way a payment operation can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// Not a 34-character Base58Check TRON address with a valid checksum.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Amount text could not be parsed as a non-negative 6-decimal TRX value.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The transaction carries a contract other than TransferContract.
    #[error("forbidden contract type: {0}")]
    ForbiddenType(String),

    /// `raw_data.data` (the memo field) is present and non-empty.
    #[error("extra data is forbidden on transfers")]
    ExtraDataForbidden,

    /// Transaction amount differs from `price * multiplier`.
    #[error("amount mismatch: expected {expected} sun, got {actual} sun")]
    AmountMismatch { expected: i64, actual: i64 },

    /// Transaction recipient differs from the configured seller.
    #[error("recipient mismatch: expected {expected}, got {actual}")]
    RecipientMismatch { expected: String, actual: String },

    /// Transaction owner differs from the wallet that is supposed to sign it.
    #[error("owner mismatch: expected {expected}, got {actual}")]
    OwnerMismatch { expected: String, actual: String },

    /// A watch-only wallet holds no key material.
    #[error("watch-only wallet cannot sign")]
    WatchOnlyCannotSign,

    /// The scanned signed payload disagrees with the retained unsigned one.
    #[error("tamper detected: {0}")]
    TamperDetected(String),

    /// QR fragments disagree on the total part count.
    #[error("inconsistent QR part total: expected {expected}, got {actual}")]
    QrInconsistentTotal { expected: usize, actual: usize },

    /// The node returned fields that disagree with what we asked for.
    #[error("node mismatch: {0}")]
    NodeMismatch(String),

    /// Connect or read timeout on a node request.
    #[error("network timeout")]
    NetworkTimeout,

    /// The node refused the request. The message is already mapped to a
    /// user-facing phrase where a mapping exists.
    #[error("node rejected: {0}")]
    NodeRejected(String),

    /// Arithmetic left the `i64` range.
    #[error("arithmetic overflow")]
    Overflow,

    /// Any crypto or I/O failure inside the key store.
    #[error("key store error: {0}")]
    KeyStoreError(String),

    /// Signing or recovery failed.
    #[error("crypto failure: {0}")]
    CryptoFailure(String),

    // -- supplementary variants --------------------------------------------
    /// Raw bytes do not decode, or the structure breaks a shape invariant.
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    /// The transaction expired before the check ran.
    #[error("transaction expired at {expiration} (now {now})")]
    Expired { expiration: i64, now: i64 },

    /// The offline builder was asked for a transaction without TAPOS, or a
    /// synthetic-TAPOS transaction reached the broadcaster.
    #[error("no TAPOS reference block available")]
    NoTapos,

    /// A QR frame or payload is not well formed.
    #[error("malformed QR payload: {0}")]
    QrMalformed(String),

    /// Reassembly was attempted before every part arrived.
    #[error("QR payload incomplete, missing parts {missing:?}")]
    QrIncomplete { missing: Vec<usize> },

    /// Transport failure other than a timeout.
    #[error("network error: {0}")]
    Network(String),

    /// The operation was cancelled cooperatively.
    #[error("operation cancelled")]
    Cancelled,

    /// The risk engine blocked the transfer.
    #[error("blocked by risk engine: {0}")]
    RiskBlocked(String),

    /// The risk engine requires explicit confirmation that was not given.
    #[error("confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("wallet already exists for address {0}")]
    DuplicateWallet(String),

    #[error("no current wallet selected")]
    NoCurrentWallet,

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// History persistence failed. The ledger keeps its prior state.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Convenience alias used throughout the crate.
pub type PaymentResult<T> = Result<T, PaymentError>;

impl PaymentError {
    /// Transport-level failures are the only ones list endpoints retry.
    pub fn is_transport(&self) -> bool {
        matches!(self, PaymentError::NetworkTimeout | PaymentError::Network(_))
    }
}

impl From<EncryptionError> for PaymentError {
    fn from(e: EncryptionError) -> Self {
        PaymentError::KeyStoreError(e.to_string())
    }
}

impl From<StoreError> for PaymentError {
    fn from(e: StoreError) -> Self {
        PaymentError::Storage(e.to_string())
    }
}

impl From<KeyError> for PaymentError {
    fn from(e: KeyError) -> Self {
        PaymentError::KeyStoreError(e.to_string())
    }
}
