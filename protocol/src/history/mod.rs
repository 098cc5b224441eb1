//! # History Module
//!
//! Local record of what this device has broadcast, and the poller that
//! moves records from `Pending` to their final status.
//!
//! ## Architecture
//!
//! ```text
//! record.rs - TransactionRecord, TransactionStatus, StatusUpdate
//! ledger.rs - HistoryLedger: bounded, newest first, persisted per change
//! poller.rs - StatusPoller: single-flight background loop
//! ```
//!
//! A record is written only after the node has accepted the broadcast; the
//! pipeline enforces that ordering, the ledger just stores.

pub mod ledger;
pub mod poller;
pub mod record;

pub use ledger::HistoryLedger;
pub use poller::{PollSummary, StatusPoller};
pub use record::{StatusUpdate, TransactionRecord, TransactionStatus};
