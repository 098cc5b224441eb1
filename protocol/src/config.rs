//! # Engine Configuration & Constants
//!
//! Every magic number in trxsafe lives here. If you're hardcoding a constant
//! somewhere else, move it here first.
//!
//! The second half of the file is [`Settings`], the merchant configuration
//! the engine consumes but never owns: who gets paid, how much per unit, and
//! which node to talk to. The engine checks every transaction it builds
//! against these values, so they are validated on load and never trusted
//! blindly afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::address::Address;
use crate::error::{PaymentError, PaymentResult};

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// 1 TRX = 1,000,000 sun. All arithmetic and hashing happens in sun.
pub const SUN_PER_TRX: i64 = 1_000_000;

/// Maximum fractional digits accepted when parsing a TRX amount.
pub const TRX_DECIMALS: usize = 6;

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// Network byte prefixed to every mainnet TRON address.
pub const ADDRESS_PREFIX: u8 = 0x41;

/// Raw address length: prefix byte + 20-byte keccak tail.
pub const ADDRESS_RAW_LENGTH: usize = 21;

/// Base58Check textual length. Always starts with `T`.
pub const ADDRESS_BASE58_LENGTH: usize = 34;

/// Truncated double-SHA-256 checksum appended before Base58 encoding.
pub const ADDRESS_CHECKSUM_LENGTH: usize = 4;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// secp256k1 secret scalar length in bytes.
pub const PRIVATE_KEY_LENGTH: usize = 32;

/// Uncompressed SEC1 public key: `0x04 || x || y`.
pub const PUBLIC_KEY_LENGTH: usize = 65;

/// `r(32) || s(32) || v(1)`.
pub const SIGNATURE_LENGTH: usize = 65;

/// Added to the raw recovery id (0..=3) before it is written as `v`.
pub const RECOVERY_ID_OFFSET: u8 = 27;

/// AES-256 key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-GCM nonce length in bytes (96 bits, the only size worth using).
pub const AES_NONCE_LENGTH: usize = 12;

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Maximum `expiration - timestamp` accepted on a freshly built transaction.
pub const MAX_TAPOS_WINDOW_MS: i64 = 60_000;

/// Protobuf type URL carried in `Contract.parameter` for TRX transfers.
pub const TRANSFER_CONTRACT_TYPE_URL: &str = "type.googleapis.com/protocol.TransferContract";

/// Name the node uses for the contract type in its JSON rendering.
pub const TRANSFER_CONTRACT_NAME: &str = "TransferContract";

// ---------------------------------------------------------------------------
// Node RPC
// ---------------------------------------------------------------------------

/// Public TronGrid endpoint used when no node URL is configured.
pub const DEFAULT_NODE_URL: &str = "https://api.trongrid.io";

/// Connect timeout for every node request.
pub const RPC_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Read timeout for every node request.
pub const RPC_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Retries after the first failed attempt on list-and-poll endpoints,
/// so at most `1 + LIST_MAX_RETRIES` requests. Never applied to broadcast.
pub const LIST_MAX_RETRIES: u32 = 3;

/// Linear backoff step between list retries (retry `n` waits `n` steps).
pub const LIST_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Default page size for account transaction listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

// ---------------------------------------------------------------------------
// History & Polling
// ---------------------------------------------------------------------------

/// Records retained by the history ledger.
pub const HISTORY_CAPACITY: usize = 100;

/// Poll cadence while at least one record is pending.
pub const POLL_INTERVAL_PENDING: Duration = Duration::from_secs(10);

/// Poll cadence when nothing is pending.
pub const POLL_INTERVAL_IDLE: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// QR Protocol
// ---------------------------------------------------------------------------

/// Version tag carried in every QR payload.
pub const QR_PAYLOAD_VERSION: &str = "1.0";

/// Payload type tag. Transfers are the only thing we ever put in a QR.
pub const QR_PAYLOAD_TYPE: &str = "transfer";

/// Payloads longer than this are split into framed parts.
pub const QR_MAX_CHUNK: usize = 400;

/// Literal prefix of every multi-part frame.
pub const QR_FRAME_PREFIX: &str = "trxsafe:v1:";

/// Upper bound on the number of parts a collector will accept.
pub const QR_MAX_PARTS: usize = 100;

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Bandwidth consumed by a plain signed TRX transfer, in bytes.
pub const TRANSFER_BANDWIDTH_BYTES: i64 = 280;

/// Sun burned per bandwidth byte when the account has none left.
pub const SUN_PER_BANDWIDTH_BYTE: i64 = 1_000;

// ---------------------------------------------------------------------------
// Risk Tiers (price per unit, in sun)
// ---------------------------------------------------------------------------

/// Below this the price is flagged as abnormally low.
pub const PRICE_LOW_THRESHOLD: i64 = 1_000;

/// Upper bound of the unremarkable band.
pub const PRICE_NORMAL_CEILING: i64 = 1_000_000;

/// Upper bound of the elevated band; anything above needs confirmation.
pub const PRICE_ELEVATED_CEILING: i64 = 10_000_000;

/// Accepted multiplier range, inclusive.
pub const MULTIPLIER_MIN: u8 = 1;
pub const MULTIPLIER_MAX: u8 = 10;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Merchant configuration consumed by the builder, validator and risk engine.
///
/// JSON keys are camelCase so a settings file written by any other client of
/// the same format loads unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Base58Check address that receives every payment.
    pub seller_address: String,
    /// Price of one unit, in sun.
    pub price_per_unit_sun: i64,
    /// Units per payment, `1..=10`.
    pub multiplier: u8,
    /// UI hint: the price cannot be edited at the point of sale.
    #[serde(default)]
    pub price_locked: bool,
    /// Full-node HTTP endpoint.
    #[serde(default = "default_node_url")]
    pub node_url: String,
    /// UI hint: gate signing behind a biometric prompt.
    #[serde(default)]
    pub biometric_enabled: bool,
}

fn default_node_url() -> String {
    DEFAULT_NODE_URL.to_string()
}

impl Settings {
    /// Settings with the default node and no UI flags set.
    pub fn new(seller_address: impl Into<String>, price_per_unit_sun: i64, multiplier: u8) -> Self {
        Self {
            seller_address: seller_address.into(),
            price_per_unit_sun,
            multiplier,
            price_locked: false,
            node_url: default_node_url(),
            biometric_enabled: false,
        }
    }

    /// Total the builder must produce: `price_per_unit_sun * multiplier`.
    pub fn total_sun(&self) -> PaymentResult<i64> {
        self.price_per_unit_sun
            .checked_mul(i64::from(self.multiplier))
            .ok_or(PaymentError::Overflow)
    }

    /// The seller address in raw form.
    pub fn seller(&self) -> PaymentResult<Address> {
        self.seller_address.parse()
    }

    /// Checks every field. Called on load and before each build.
    pub fn validate(&self) -> PaymentResult<()> {
        self.seller()?;

        if self.price_per_unit_sun <= 0 {
            return Err(PaymentError::InvalidSettings(format!(
                "pricePerUnitSun must be > 0, got {}",
                self.price_per_unit_sun
            )));
        }

        if !(MULTIPLIER_MIN..=MULTIPLIER_MAX).contains(&self.multiplier) {
            return Err(PaymentError::InvalidSettings(format!(
                "multiplier must be in [{MULTIPLIER_MIN}, {MULTIPLIER_MAX}], got {}",
                self.multiplier
            )));
        }

        let url = self.node_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(PaymentError::InvalidSettings(format!(
                "nodeUrl must be an http(s) URL, got {:?}",
                self.node_url
            )));
        }

        self.total_sun()?;
        Ok(())
    }
}
