//! # Network Module
//!
//! HTTP client for a TRON full node: transaction creation, single-shot
//! broadcast, account and resource queries, status lookups, and paginated
//! account listings.
//!
//! ## Architecture
//!
//! ```text
//! transport.rs - NodeTransport seam + reqwest HttpTransport (10 s timeouts)
//! mock.rs      - MockTransport: scripted replies and a call log
//! client.rs    - TronClient: typed calls, retry policy, cancellation
//! types.rs     - Response shapes the engine reads
//! ```
//!
//! ## Design Decisions
//!
//! - Broadcast never retries. Listing and polling retry transport failures
//!   with linear backoff. See [`client`] for why.
//! - The client holds no mutable state between calls; clone it freely.
//! - The transport is a trait object so the whole pipeline can run against
//!   [`MockTransport`] in tests without a network.

pub mod client;
pub mod mock;
pub mod transport;
pub mod types;

pub use client::{map_node_error, TronClient};
pub use mock::{node_transaction_json, MockCall, MockReply, MockTransport};
pub use transport::{HttpTransport, NodeTransport};
pub use types::{
    AccountInfo, AccountResource, CreatedTransaction, RemoteTransfer, TransactionInfo,
    TransactionPage,
};
