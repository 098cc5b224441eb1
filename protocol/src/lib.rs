// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # trxsafe Protocol: Core Library
//!
//! A payment engine that does exactly one thing on the TRON network: move a
//! fixed amount of TRX from one of your wallets to one configured seller.
//! Every transaction it signs is a single `TransferContract` with no memo,
//! no smart-contract call and no surprises, and it is checked against that
//! shape at every stage from the node's reply to the broadcast.
//!
//! ## Architecture
//!
//! - **codec**: Base58Check addresses and 6-decimal TRX amounts.
//! - **crypto**: Hashes, AES-256-GCM sealing, secp256k1 keys and signatures.
//! - **transaction**: Builder, signer and the validator every stage runs.
//! - **vault**: Encrypted multi-wallet key store with watch-only wallets.
//! - **storage**: Atomic blob persistence on disk or in memory.
//! - **network**: Typed TRON full-node client with timeouts and cancellation.
//! - **risk**: Whitelist rules and price-tier classification.
//! - **qr**: Air-gapped signing over multi-part QR codes.
//! - **history**: Bounded transaction ledger and the status poller.
//! - **resources**: Bandwidth and burn estimates for a transfer.
//! - **pipeline**: [`PaymentEngine`](pipeline::PaymentEngine), all of the above in order.
//! - **config**: Protocol constants and merchant [`Settings`](config::Settings).
//!
//! ## Design Philosophy
//!
//! 1. The raw protobuf bytes are the truth. Everything displayed is derived
//!    from them and re-checked against them.
//! 2. Safety failures are fatal. Nothing is retried or downgraded to a warning,
//!    and `broadcast` is never retried at all.
//! 3. Keys leave the vault as a signature or an explicit backup, never otherwise.
//! 4. If it touches money, it has tests. Plural.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod history;
pub mod network;
pub mod pipeline;
pub mod qr;
pub mod resources;
pub mod risk;
pub mod storage;
pub mod transaction;
pub mod vault;

pub use error::{PaymentError, PaymentResult};
