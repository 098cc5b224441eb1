//! Node response shapes.
//!
//! Only the fields the engine reads are declared. Everything else in the
//! node's JSON is ignored, except in `CreatedTransaction::raw_data`, which
//! is kept whole so the builder can cross-check it against the binary form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::address::Address;
use crate::history::record::{TransactionRecord, TransactionStatus};

/// `wallet/createtransaction` result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedTransaction {
    #[serde(rename = "txID")]
    pub tx_id: String,
    pub raw_data_hex: String,
    pub raw_data: Value,
}

/// `wallet/broadcasttransaction` result.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct BroadcastResponse {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "Error")]
    pub error: Option<String>,
    #[serde(default)]
    pub txid: Option<String>,
}

/// `wallet/getaccount`. An inactive account comes back as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub create_time: Option<i64>,
}

impl AccountInfo {
    pub fn is_activated(&self) -> bool {
        self.address.is_some()
    }
}

/// `wallet/getaccountresource`. Absent counters are zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccountResource {
    #[serde(default, rename = "freeNetLimit")]
    pub free_net_limit: i64,
    #[serde(default, rename = "freeNetUsed")]
    pub free_net_used: i64,
    #[serde(default, rename = "NetLimit")]
    pub net_limit: i64,
    #[serde(default, rename = "NetUsed")]
    pub net_used: i64,
}

impl AccountResource {
    /// Free plus staked bandwidth still unused today.
    pub fn available_bandwidth(&self) -> i64 {
        let free = self.free_net_limit.saturating_sub(self.free_net_used).max(0);
        let staked = self.net_limit.saturating_sub(self.net_used).max(0);
        free.saturating_add(staked)
    }
}

/// What `wallet/gettransactioninfobyid` says about a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionInfo {
    /// Not in a block yet, or unknown to the node.
    Pending,
    Confirmed {
        block_height: i64,
        fee_sun: i64,
        net_usage: i64,
        energy_usage: i64,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Default, Deserialize)]
struct RawReceipt {
    #[serde(default)]
    net_usage: i64,
    #[serde(default)]
    energy_usage_total: i64,
    #[serde(default)]
    result: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTransactionInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "blockNumber")]
    block_number: Option<i64>,
    #[serde(default)]
    fee: i64,
    #[serde(default)]
    receipt: RawReceipt,
    #[serde(default)]
    result: Option<String>,
    #[serde(default, rename = "resMessage")]
    res_message: Option<String>,
}

/// Node messages are often hex-encoded UTF-8. Anything else passes through.
pub(crate) fn decode_node_message(message: &str) -> String {
    hex::decode(message)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| message.to_string())
}

impl TransactionInfo {
    pub(crate) fn from_node(value: Value) -> Self {
        let raw: RawTransactionInfo = serde_json::from_value(value).unwrap_or_default();
        if raw.id.is_none() {
            return TransactionInfo::Pending;
        }

        if raw.result.as_deref() == Some("FAILED") {
            let reason = raw
                .res_message
                .as_deref()
                .map(decode_node_message)
                .unwrap_or_else(|| "transaction failed".to_string());
            return TransactionInfo::Failed { reason };
        }
        if let Some(result) = raw.receipt.result.as_deref() {
            if result != "SUCCESS" {
                return TransactionInfo::Failed {
                    reason: result.to_string(),
                };
            }
        }

        match raw.block_number {
            Some(block_height) => TransactionInfo::Confirmed {
                block_height,
                fee_sun: raw.fee,
                net_usage: raw.receipt.net_usage,
                energy_usage: raw.receipt.energy_usage_total,
            },
            None => TransactionInfo::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// Account listings
// ---------------------------------------------------------------------------

/// One TRX transfer from an account listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTransfer {
    pub tx_id: String,
    pub from: Address,
    pub to: Address,
    pub amount_sun: i64,
    pub timestamp_ms: i64,
    pub block_height: Option<i64>,
    /// `contractRet` as reported; `SUCCESS` on success.
    pub result: String,
}

impl RemoteTransfer {
    pub fn succeeded(&self) -> bool {
        self.result == "SUCCESS"
    }

    /// Ledger form. Listings only contain mined transactions, so the status
    /// is final.
    pub fn to_record(&self) -> TransactionRecord {
        let mut record = TransactionRecord::new(
            self.tx_id.clone(),
            self.from,
            self.to,
            self.amount_sun,
            self.timestamp_ms,
            String::new(),
        );
        if self.succeeded() {
            record.status = TransactionStatus::Success;
            record.block_height = self.block_height;
        } else {
            record.status = TransactionStatus::Failure;
            record.error_message = Some(self.result.clone());
        }
        record
    }

    /// `None` for anything that is not a plain TransferContract.
    pub(crate) fn from_listing(item: &Value) -> Option<Self> {
        let contract = item.pointer("/raw_data/contract/0")?;
        if contract.get("type")?.as_str()? != "TransferContract" {
            return None;
        }
        let value = contract.pointer("/parameter/value")?;
        let from = Address::from_node_repr(value.get("owner_address")?.as_str()?).ok()?;
        let to = Address::from_node_repr(value.get("to_address")?.as_str()?).ok()?;

        Some(Self {
            tx_id: item.get("txID")?.as_str()?.to_string(),
            from,
            to,
            amount_sun: value.get("amount")?.as_i64()?,
            timestamp_ms: item
                .get("block_timestamp")
                .and_then(Value::as_i64)
                .or_else(|| item.pointer("/raw_data/timestamp").and_then(Value::as_i64))
                .unwrap_or_default(),
            block_height: item.get("blockNumber").and_then(Value::as_i64),
            result: item
                .pointer("/ret/0/contractRet")
                .and_then(Value::as_str)
                .unwrap_or("SUCCESS")
                .to_string(),
        })
    }
}

/// One page of an account listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPage {
    pub transfers: Vec<RemoteTransfer>,
    /// Full URL of the next page, when the node says there is one.
    pub next: Option<String>,
}

impl TransactionPage {
    pub(crate) fn from_node(value: &Value) -> Self {
        let transfers = value
            .get("data")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(RemoteTransfer::from_listing).collect())
            .unwrap_or_default();

        let has_more = value
            .pointer("/meta/links/hasMore")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let next = value
            .pointer("/meta/links/next")
            .and_then(Value::as_str)
            .filter(|_| has_more)
            .map(str::to_string);

        Self { transfers, next }
    }
}
