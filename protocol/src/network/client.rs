//! Typed TRON node client.
//!
//! ## Retry policy
//!
//! The policy is asymmetric on purpose:
//!
//! - `broadcast` is single-shot. A failed or timed-out broadcast may still
//!   have reached the network; resending would not be idempotent from the
//!   user's point of view.
//! - Read-only listing and polling calls retry transport failures up to
//!   [`LIST_MAX_RETRIES`] times, waiting `n * LIST_RETRY_BACKOFF` before
//!   retry `n`.
//!
//! ## Cancellation
//!
//! Every call races the client's [`CancellationToken`]. A cancelled call
//! returns [`PaymentError::Cancelled`] and the caller performs no writes.

use std::future::Future;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::transport::{HttpTransport, NodeTransport};
use super::types::{
    decode_node_message, AccountInfo, AccountResource, BroadcastResponse, CreatedTransaction,
    TransactionInfo, TransactionPage,
};
use crate::codec::address::Address;
use crate::config::{LIST_MAX_RETRIES, LIST_RETRY_BACKOFF};
use crate::error::{PaymentError, PaymentResult};
use crate::transaction::types::{SignedTransaction, TaposSource};

/// Maps raw node error text to the short phrases shown to users.
/// Unknown messages pass through verbatim.
pub fn map_node_error(message: &str) -> String {
    let lower = message.to_lowercase();
    if lower.contains("no owneraccount")
        || lower.contains("does not exist")
        || lower.contains("not exists")
    {
        "sender inactive".to_string()
    } else if lower.contains("balance is not sufficient") || lower.contains("insufficient") {
        "insufficient balance".to_string()
    } else if lower.contains("contract validate")
        || lower.contains("contractvalidate")
        || lower.contains("contract_validate")
    {
        "contract validate failed".to_string()
    } else if lower.contains("invalid param")
        || lower.contains("illegal param")
        || lower.contains("illegalargument")
    {
        "invalid parameter".to_string()
    } else {
        message.trim().to_string()
    }
}

/// A reply carrying `Error` is a rejection even with HTTP 200.
fn reject_on_error(value: Value) -> PaymentResult<Value> {
    match value.get("Error").and_then(Value::as_str) {
        Some(err) => Err(PaymentError::NodeRejected(map_node_error(err))),
        None => Ok(value),
    }
}

#[derive(Clone)]
pub struct TronClient {
    transport: Arc<dyn NodeTransport>,
    cancel: CancellationToken,
}

impl TronClient {
    pub fn new(transport: Arc<dyn NodeTransport>) -> Self {
        Self {
            transport,
            cancel: CancellationToken::new(),
        }
    }

    /// Client over [`HttpTransport`] for `node_url`.
    pub fn http(node_url: &str) -> PaymentResult<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(node_url)?)))
    }

    /// Replaces the cancellation token. Clones share it.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    async fn guarded<T, F>(&self, fut: F) -> PaymentResult<T>
    where
        F: Future<Output = PaymentResult<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(PaymentError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PaymentError::Cancelled),
            result = fut => result,
        }
    }

    async fn post(&self, path: &str, body: Value) -> PaymentResult<Value> {
        self.guarded(self.transport.post_json(path, &body)).await
    }

    async fn get(&self, path_or_url: &str) -> PaymentResult<Value> {
        self.guarded(self.transport.get_json(path_or_url)).await
    }

    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> PaymentResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PaymentResult<T>>,
    {
        let mut retry: u32 = 0;
        loop {
            match op().await {
                Err(err) if err.is_transport() && retry < LIST_MAX_RETRIES => {
                    retry += 1;
                    let delay = LIST_RETRY_BACKOFF * retry;
                    tracing::warn!(call = what, retry, error = %err, ?delay, "retrying node call");
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(PaymentError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                other => return other,
            }
        }
    }

    // -- transactions ------------------------------------------------------

    /// `wallet/createtransaction`. The result is unverified; the builder
    /// checks it.
    pub async fn create_transaction(
        &self,
        owner: &Address,
        to: &Address,
        amount: i64,
    ) -> PaymentResult<CreatedTransaction> {
        let body = json!({
            "owner_address": owner.encode(),
            "to_address": to.encode(),
            "amount": amount,
            "visible": true,
        });
        let value = reject_on_error(self.post("wallet/createtransaction", body).await?)?;
        serde_json::from_value(value)
            .map_err(|e| PaymentError::NodeMismatch(format!("unexpected createtransaction reply: {e}")))
    }

    /// Submits `tx` once. Returns the locally computed transaction ID when
    /// the node accepts it. Never retries.
    pub async fn broadcast(&self, tx: &SignedTransaction) -> PaymentResult<String> {
        if tx.unsigned().tapos() == TaposSource::Synthetic {
            return Err(PaymentError::NoTapos);
        }
        let tx_id = tx.tx_id_hex();
        let body = json!({
            "transaction": tx.to_broadcast_hex(),
            "visible": true,
        });

        let value = self.post("wallet/broadcasttransaction", body).await?;
        let response: BroadcastResponse = match serde_json::from_value(value) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%tx_id, error = %err, "unreadable broadcast reply");
                BroadcastResponse::default()
            }
        };

        if response.result {
            if let Some(node_id) = response.txid.as_deref() {
                if !node_id.eq_ignore_ascii_case(&tx_id) {
                    tracing::warn!(%tx_id, node_id, "node reported a different txid");
                }
            }
            tracing::info!(%tx_id, "broadcast accepted");
            return Ok(tx_id);
        }

        let raw = response
            .error
            .or_else(|| response.message.as_deref().map(decode_node_message))
            .or(response.code)
            .unwrap_or_else(|| "broadcast rejected".to_string());
        let mapped = map_node_error(&raw);
        tracing::warn!(%tx_id, reason = %mapped, "broadcast rejected");
        Err(PaymentError::NodeRejected(mapped))
    }

    /// `wallet/gettransactioninfobyid`. Retried.
    pub async fn get_transaction_info_by_id(&self, tx_id: &str) -> PaymentResult<TransactionInfo> {
        let value = self
            .with_retry("gettransactioninfobyid", || {
                self.post("wallet/gettransactioninfobyid", json!({ "value": tx_id }))
            })
            .await?;
        Ok(TransactionInfo::from_node(reject_on_error(value)?))
    }

    // -- accounts ----------------------------------------------------------

    pub async fn get_account(&self, address: &Address) -> PaymentResult<AccountInfo> {
        let body = json!({ "address": address.encode(), "visible": true });
        let value = reject_on_error(self.post("wallet/getaccount", body).await?)?;
        serde_json::from_value(value)
            .map_err(|e| PaymentError::Network(format!("unexpected getaccount reply: {e}")))
    }

    pub async fn get_account_resource(&self, address: &Address) -> PaymentResult<AccountResource> {
        let body = json!({ "address": address.encode(), "visible": true });
        let value = reject_on_error(self.post("wallet/getaccountresource", body).await?)?;
        serde_json::from_value(value)
            .map_err(|e| PaymentError::Network(format!("unexpected getaccountresource reply: {e}")))
    }

    /// Balance in sun. Zero for an account the chain has never seen.
    pub async fn get_account_balance(&self, address: &Address) -> PaymentResult<i64> {
        Ok(self.get_account(address).await?.balance)
    }

    // -- listings ----------------------------------------------------------

    async fn list_transactions(
        &self,
        address: &Address,
        direction: &str,
        page_size: u32,
        next: Option<&str>,
    ) -> PaymentResult<TransactionPage> {
        let url = match next {
            Some(next) => next.to_string(),
            None => format!(
                "v1/accounts/{address}/transactions?{direction}=true&limit={page_size}&visible=true"
            ),
        };
        let value = self
            .with_retry("account transactions", || self.get(&url))
            .await?;
        Ok(TransactionPage::from_node(&value))
    }

    /// Transfers sent by `address`, newest first. Pass the previous page's
    /// `next` to continue.
    pub async fn get_outgoing_transactions(
        &self,
        address: &Address,
        page_size: u32,
        next: Option<&str>,
    ) -> PaymentResult<TransactionPage> {
        self.list_transactions(address, "only_from", page_size, next)
            .await
    }

    pub async fn get_incoming_transactions(
        &self,
        address: &Address,
        page_size: u32,
        next: Option<&str>,
    ) -> PaymentResult<TransactionPage> {
        self.list_transactions(address, "only_to", page_size, next)
            .await
    }
}
