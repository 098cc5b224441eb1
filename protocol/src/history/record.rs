//! Ledger entries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::address::Address;
use crate::network::types::TransactionInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Success,
    Failure,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failure => "failure",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "success" => Ok(TransactionStatus::Success),
            "failure" | "failed" => Ok(TransactionStatus::Failure),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}

/// One submitted transaction, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub tx_id: String,
    pub from_address: Address,
    pub to_address: Address,
    pub amount_sun: i64,
    pub timestamp_ms: i64,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_sun: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_usage: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_usage: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub memo: String,
}

impl TransactionRecord {
    /// A freshly broadcast transaction. Always starts `Pending`.
    pub fn new(
        tx_id: String,
        from_address: Address,
        to_address: Address,
        amount_sun: i64,
        timestamp_ms: i64,
        memo: String,
    ) -> Self {
        Self {
            tx_id,
            from_address,
            to_address,
            amount_sun,
            timestamp_ms,
            status: TransactionStatus::Pending,
            block_height: None,
            fee_sun: None,
            net_usage: None,
            energy_usage: None,
            error_message: None,
            memo,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    pub(crate) fn apply(&mut self, update: &StatusUpdate) {
        match update {
            StatusUpdate::Success {
                block_height,
                fee_sun,
                net_usage,
                energy_usage,
            } => {
                self.status = TransactionStatus::Success;
                self.block_height = Some(*block_height);
                self.fee_sun = Some(*fee_sun);
                self.net_usage = Some(*net_usage);
                self.energy_usage = Some(*energy_usage);
                self.error_message = None;
            }
            StatusUpdate::Failure { reason } => {
                self.status = TransactionStatus::Failure;
                self.error_message = Some(reason.clone());
            }
        }
    }
}

/// A terminal status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Success {
        block_height: i64,
        fee_sun: i64,
        net_usage: i64,
        energy_usage: i64,
    },
    Failure {
        reason: String,
    },
}

impl StatusUpdate {
    /// `None` while the node still reports the transaction as pending.
    pub fn from_info(info: TransactionInfo) -> Option<Self> {
        match info {
            TransactionInfo::Pending => None,
            TransactionInfo::Confirmed {
                block_height,
                fee_sun,
                net_usage,
                energy_usage,
            } => Some(StatusUpdate::Success {
                block_height,
                fee_sun,
                net_usage,
                energy_usage,
            }),
            TransactionInfo::Failed { reason } => Some(StatusUpdate::Failure { reason }),
        }
    }

    pub fn status(&self) -> TransactionStatus {
        match self {
            StatusUpdate::Success { .. } => TransactionStatus::Success,
            StatusUpdate::Failure { .. } => TransactionStatus::Failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let addr: Address = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".parse().unwrap();
        let record = TransactionRecord::new("ab".into(), addr, addr, 5, 10, "table 4".into());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["txId"], "ab");
        assert_eq!(json["fromAddress"], "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t");
        assert_eq!(json["status"], "Pending");
        assert_eq!(json["memo"], "table 4");
        assert!(json.get("blockHeight").is_none());
    }

    #[test]
    fn apply_success_fills_usage() {
        let addr: Address = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".parse().unwrap();
        let mut record = TransactionRecord::new("ab".into(), addr, addr, 5, 10, String::new());
        record.apply(&StatusUpdate::Success {
            block_height: 9,
            fee_sun: 0,
            net_usage: 267,
            energy_usage: 0,
        });
        assert_eq!(record.status, TransactionStatus::Success);
        assert_eq!(record.block_height, Some(9));
        assert_eq!(record.net_usage, Some(267));
    }

    #[test]
    fn status_parsing() {
        assert_eq!("Pending".parse::<TransactionStatus>().unwrap(), TransactionStatus::Pending);
        assert_eq!("failed".parse::<TransactionStatus>().unwrap(), TransactionStatus::Failure);
        assert!("lost".parse::<TransactionStatus>().is_err());
    }
}
