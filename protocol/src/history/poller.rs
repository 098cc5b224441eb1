//! Background status poller.
//!
//! Walks the ledger's pending records and asks the node about each one:
//! every [`POLL_INTERVAL_PENDING`] while something is pending, every
//! [`POLL_INTERVAL_IDLE`] otherwise. One failing lookup never holds up the
//! others.
//!
//! At most one poll loop runs per process. [`StatusPoller::spawn`] returns
//! `None` when a loop is already active.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::ledger::HistoryLedger;
use super::record::StatusUpdate;
use crate::config::{POLL_INTERVAL_IDLE, POLL_INTERVAL_PENDING};
use crate::error::{PaymentError, PaymentResult};
use crate::network::client::TronClient;

static POLLER_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Clears the single-flight flag when the loop ends, however it ends.
struct ActiveFlag;

impl Drop for ActiveFlag {
    fn drop(&mut self) {
        POLLER_ACTIVE.store(false, Ordering::SeqCst);
    }
}

/// Outcome counts of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub checked: usize,
    pub confirmed: usize,
    pub failed: usize,
    pub still_pending: usize,
    pub errors: usize,
}

#[derive(Clone)]
pub struct StatusPoller {
    client: TronClient,
    ledger: Arc<HistoryLedger>,
}

impl StatusPoller {
    pub fn new(client: TronClient, ledger: Arc<HistoryLedger>) -> Self {
        Self { client, ledger }
    }

    /// `true` while a spawned loop is alive somewhere in the process.
    pub fn is_running() -> bool {
        POLLER_ACTIVE.load(Ordering::SeqCst)
    }

    /// One pass over every pending record.
    pub async fn poll_once(&self) -> PaymentResult<PollSummary> {
        let pending = self.ledger.pending().await;
        let lookups = pending
            .iter()
            .map(|r| self.client.get_transaction_info_by_id(&r.tx_id));
        let results = join_all(lookups).await;

        let mut summary = PollSummary {
            checked: pending.len(),
            ..Default::default()
        };
        for (record, result) in pending.iter().zip(results) {
            let info = match result {
                Ok(info) => info,
                Err(PaymentError::Cancelled) => return Err(PaymentError::Cancelled),
                Err(err) => {
                    tracing::warn!(tx_id = %record.tx_id, error = %err, "status lookup failed");
                    summary.errors += 1;
                    continue;
                }
            };

            let Some(update) = StatusUpdate::from_info(info) else {
                summary.still_pending += 1;
                continue;
            };
            match self.ledger.update_status(&record.tx_id, &update).await {
                Ok(_) => match update {
                    StatusUpdate::Success { .. } => summary.confirmed += 1,
                    StatusUpdate::Failure { .. } => summary.failed += 1,
                },
                Err(err) => {
                    tracing::warn!(tx_id = %record.tx_id, error = %err, "status update not persisted");
                    summary.errors += 1;
                }
            }
        }

        tracing::debug!(?summary, "status poll finished");
        Ok(summary)
    }

    /// Starts the poll loop unless one is already running. The loop exits
    /// as soon as `cancel` fires, including in the middle of a pass; an
    /// abandoned pass writes nothing for lookups still in flight.
    pub fn spawn(self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if POLLER_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("status poller already running");
            return None;
        }

        Some(tokio::spawn(async move {
            let _flag = ActiveFlag;
            tracing::info!("status poller started");
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                let pass = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    pass = self.poll_once() => pass,
                };
                match pass {
                    Err(PaymentError::Cancelled) => break,
                    Err(err) => tracing::warn!(error = %err, "status poll failed"),
                    Ok(_) => {}
                }

                let interval = if self.ledger.has_pending().await {
                    POLL_INTERVAL_PENDING
                } else {
                    POLL_INTERVAL_IDLE
                };
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            tracing::info!("status poller stopped");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::address::Address;
    use crate::history::record::{TransactionRecord, TransactionStatus};
    use crate::network::mock::{MockReply, MockTransport};
    use crate::storage::MemoryBlobStore;
    use serde_json::json;

    const INFO: &str = "wallet/gettransactioninfobyid";

    // The single-flight flag is process-wide; tests that spawn take turns.
    static SPAWN_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

    fn record(tx_id: &str, ts: i64) -> TransactionRecord {
        let addr: Address = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".parse().unwrap();
        TransactionRecord::new(tx_id.into(), addr, addr, 1, ts, String::new())
    }

    async fn fixture() -> (Arc<MockTransport>, Arc<HistoryLedger>, StatusPoller) {
        let mock = Arc::new(MockTransport::new());
        let ledger = Arc::new(
            HistoryLedger::open(Arc::new(MemoryBlobStore::new()))
                .await
                .unwrap(),
        );
        let poller = StatusPoller::new(TronClient::new(mock.clone()), ledger.clone());
        (mock, ledger, poller)
    }

    #[tokio::test(start_paused = true)]
    async fn poll_once_transitions_each_record_independently() {
        let (mock, ledger, poller) = fixture().await;
        ledger.save(record("a", 3)).await.unwrap();
        ledger.save(record("b", 2)).await.unwrap();
        ledger.save(record("c", 1)).await.unwrap();

        // Lookups run in ledger order (a, b, c); `b` exhausts its retries.
        mock.push(INFO, MockReply::Json(json!({
            "id": "a", "blockNumber": 77, "fee": 0, "receipt": {"net_usage": 268}
        })));
        mock.push(INFO, MockReply::Fail(PaymentError::NetworkTimeout));
        mock.push(INFO, MockReply::Json(json!({})));
        mock.set_default(INFO, MockReply::Fail(PaymentError::NetworkTimeout));

        let summary = poller.poll_once().await.unwrap();
        assert_eq!(summary.checked, 3);
        assert_eq!(summary.confirmed, 1);

        let a = ledger.get("a").await.unwrap();
        assert_eq!(a.status, TransactionStatus::Success);
        assert_eq!(a.block_height, Some(77));
        assert_eq!(a.net_usage, Some(268));
        assert_eq!(summary.still_pending + summary.errors, 2);
        assert_eq!(ledger.pending().await.len(), 2);
    }

    #[tokio::test]
    async fn failed_transaction_records_reason() {
        let (mock, ledger, poller) = fixture().await;
        ledger.save(record("a", 1)).await.unwrap();
        mock.push(INFO, MockReply::Json(json!({
            "id": "a", "blockNumber": 5, "result": "FAILED", "resMessage": hex::encode("expired")
        })));

        let summary = poller.poll_once().await.unwrap();
        assert_eq!(summary.failed, 1);
        let a = ledger.get("a").await.unwrap();
        assert_eq!(a.status, TransactionStatus::Failure);
        assert_eq!(a.error_message.as_deref(), Some("expired"));
    }

    #[tokio::test(start_paused = true)]
    async fn single_flight_loop_stops_on_cancel() {
        let _serial = SPAWN_LOCK.lock().await;
        let (mock, ledger, poller) = fixture().await;
        ledger.save(record("a", 1)).await.unwrap();
        mock.set_default(INFO, MockReply::Json(json!({})));

        let cancel = CancellationToken::new();
        let handle = poller.clone().spawn(cancel.clone()).expect("first spawn");
        assert!(StatusPoller::is_running());
        assert!(poller.clone().spawn(cancel.clone()).is_none());

        // Two pending-cadence ticks.
        tokio::time::sleep(POLL_INTERVAL_PENDING * 2 + std::time::Duration::from_millis(1)).await;
        assert!(mock.call_count(INFO) >= 3);

        cancel.cancel();
        handle.await.unwrap();
        assert!(!StatusPoller::is_running());

        let again = CancellationToken::new();
        let handle = poller.spawn(again.clone()).expect("respawn after stop");
        again.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_loop_during_hung_lookup() {
        let _serial = SPAWN_LOCK.lock().await;
        let (mock, ledger, poller) = fixture().await;
        ledger.save(record("a", 1)).await.unwrap();
        mock.set_default(INFO, MockReply::Hang);

        let cancel = CancellationToken::new();
        let handle = poller.spawn(cancel.clone()).expect("spawn");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(mock.call_count(INFO), 1);

        cancel.cancel();
        let stopped = tokio::time::timeout(POLL_INTERVAL_PENDING, handle).await;
        assert!(stopped.is_ok(), "loop still running after cancel");
        assert!(!StatusPoller::is_running());
        assert!(ledger.get("a").await.unwrap().is_pending());
    }
}
