//! Bounded transaction history.
//!
//! The ledger is the only writer of [`TransactionStatus`]. It keeps at most
//! [`HISTORY_CAPACITY`] records, newest first, and persists the whole list
//! after every change. Persistence happens before the in-memory swap, so a
//! failed write leaves readers looking at the previous list.

use std::sync::Arc;

use chrono::{Local, NaiveDate, TimeZone};
use tokio::sync::RwLock;

use super::record::{StatusUpdate, TransactionRecord, TransactionStatus};
use crate::config::HISTORY_CAPACITY;
use crate::error::{PaymentError, PaymentResult};
use crate::storage::BlobStore;

const HISTORY_BLOB: &str = "history";

/// Newest first; ties keep their existing order.
fn normalize(records: &mut Vec<TransactionRecord>) {
    records.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
    records.truncate(HISTORY_CAPACITY);
}

pub struct HistoryLedger {
    store: Arc<dyn BlobStore>,
    records: RwLock<Vec<TransactionRecord>>,
}

impl HistoryLedger {
    /// Loads the persisted list, or starts empty.
    pub async fn open(store: Arc<dyn BlobStore>) -> PaymentResult<Self> {
        let mut records: Vec<TransactionRecord> = match store.read(HISTORY_BLOB).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| PaymentError::Storage(format!("history JSON: {e}")))?,
            None => Vec::new(),
        };
        normalize(&mut records);
        Ok(Self {
            store,
            records: RwLock::new(records),
        })
    }

    async fn commit<T, F>(&self, f: F) -> PaymentResult<T>
    where
        F: FnOnce(&mut Vec<TransactionRecord>) -> T,
    {
        let mut guard = self.records.write().await;
        let mut next = guard.clone();
        let out = f(&mut next);
        normalize(&mut next);

        let bytes = serde_json::to_vec(&next)
            .map_err(|e| PaymentError::Storage(format!("history JSON: {e}")))?;
        self.store.write(HISTORY_BLOB, &bytes).await?;
        *guard = next;
        Ok(out)
    }

    /// Prepends `record`, replacing any record with the same `txId`, and
    /// evicts the oldest beyond capacity.
    pub async fn save(&self, record: TransactionRecord) -> PaymentResult<()> {
        let tx_id = record.tx_id.clone();
        self.commit(|records| {
            records.retain(|r| r.tx_id != record.tx_id);
            records.insert(0, record);
        })
        .await?;
        tracing::debug!(%tx_id, "history record saved");
        Ok(())
    }

    /// Applies a terminal status. Returns `false` when `tx_id` is unknown.
    pub async fn update_status(&self, tx_id: &str, update: &StatusUpdate) -> PaymentResult<bool> {
        if !self.records.read().await.iter().any(|r| r.tx_id == tx_id) {
            return Ok(false);
        }
        let found = self
            .commit(|records| match records.iter_mut().find(|r| r.tx_id == tx_id) {
                Some(record) => {
                    record.apply(update);
                    true
                }
                None => false,
            })
            .await?;
        if found {
            tracing::info!(%tx_id, status = %update.status(), "transaction status updated");
        }
        Ok(found)
    }

    pub async fn all(&self) -> Vec<TransactionRecord> {
        self.records.read().await.clone()
    }

    pub async fn get(&self, tx_id: &str) -> Option<TransactionRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.tx_id == tx_id)
            .cloned()
    }

    pub async fn by_status(&self, status: TransactionStatus) -> Vec<TransactionRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect()
    }

    pub async fn pending(&self) -> Vec<TransactionRecord> {
        self.by_status(TransactionStatus::Pending).await
    }

    pub async fn has_pending(&self) -> bool {
        self.records.read().await.iter().any(TransactionRecord::is_pending)
    }

    /// Records whose timestamp falls on `day` in the local time zone.
    pub async fn on_day(&self, day: NaiveDate) -> Vec<TransactionRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| {
                Local
                    .timestamp_millis_opt(r.timestamp_ms)
                    .single()
                    .is_some_and(|t| t.date_naive() == day)
            })
            .cloned()
            .collect()
    }

    pub async fn today(&self) -> Vec<TransactionRecord> {
        self.on_day(Local::now().date_naive()).await
    }
}
