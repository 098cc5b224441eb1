//! # Codecs
//!
//! Lossless conversions at the edges of the engine:
//!
//! ```text
//! address.rs - Base58Check string <-> 21-byte raw TRON address
//! amount.rs  - decimal TRX text  <-> integer sun
//! ```
//!
//! Neither codec ever touches floating point. Amounts are parsed digit by
//! digit; addresses are checksummed before anything else looks at them.

pub mod address;
pub mod amount;

pub use address::Address;
pub use amount::{sun_to_trx, trx_to_sun};
