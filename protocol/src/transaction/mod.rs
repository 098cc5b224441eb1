//! # Transaction Module
//!
//! Construction, signing and verification of the single transaction shape
//! this engine produces: a TRON `TransferContract` moving TRX from the
//! current wallet to the configured seller.
//!
//! ## Architecture
//!
//! ```text
//! proto.rs        - prost declarations of the TRON wire messages we touch
//! types.rs        - UnsignedTransaction / SignedTransaction over raw bytes
//! builder.rs      - TransactionBuilder (node TAPOS) and offline assembly
//! signing.rs      - secp256k1 signing behind an owner check
//! verification.rs - Structural and configuration validation at every stage
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build**: [`TransactionBuilder`] asks the node and cross-checks it.
//! 2. **Validate**: [`validate_with_config`] before anything is shown.
//! 3. **Sign**: [`sign_transaction`] with the owner's keypair.
//! 4. **Validate again**: [`validate_signed_with_config`] before broadcast.
//!
//! ## Design Decisions
//!
//! - The raw protobuf bytes are the source of truth. Decoded fields are a
//!   cache derived from them, and the bytes that were hashed are the bytes
//!   that get broadcast.
//! - Transaction IDs are plain `sha256(raw_data)`, exactly as TRON computes
//!   them.
//! - Amounts are `i64` SUN because that is the protobuf type; anything
//!   non-positive is rejected.

pub mod builder;
pub mod proto;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{assemble_transfer, encode_raw, synthetic_tapos_now, Tapos, TransactionBuilder};
pub use signing::sign_transaction;
pub use types::{SignedTransaction, TaposSource, UnsignedTransaction};
pub use verification::{
    validate, validate_signed, validate_signed_with_config, validate_with_config, Stage,
};
