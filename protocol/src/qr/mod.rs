//! # QR Air-Gap Protocol
//!
//! Moves an unsigned transfer to an offline signer and its signature back,
//! as a series of QR codes.
//!
//! ## Architecture
//!
//! ```text
//! payload.rs  - canonical unsigned / signed JSON payloads
//! framing.rs  - trxsafe:v1:<i>:<N>:<b64> frames and the QrCollector
//! cold.rs     - signing a scanned payload on the offline device
//! verifier.rs - tamper check before the online device broadcasts
//! ```
//!
//! ## Round trip
//!
//! 1. Online: [`UnsignedPayload::from_transaction`] then [`encode_frames`].
//! 2. Offline: [`QrCollector`] then [`cold_sign`], framed the same way.
//! 3. Online: [`QrCollector`] then [`verify_scanned`] against the payload
//!    kept from step 1.

pub mod cold;
pub mod framing;
pub mod payload;
pub mod verifier;

pub use cold::cold_sign;
pub use framing::{encode_frames, reassemble, QrCollector};
pub use payload::{SignedPayload, UnsignedPayload};
pub use verifier::verify_scanned;
