//! Scripted in-process node for tests and demos.
//!
//! Replies are queued per endpoint path. A queued reply is used once; when
//! the queue for a path is empty the path's default reply is used, and when
//! there is none the call fails with a `Network` error. Every call is
//! recorded so tests can assert, for example, that broadcast was attempted
//! exactly once.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::transport::NodeTransport;
use crate::config::{TRANSFER_CONTRACT_NAME, TRANSFER_CONTRACT_TYPE_URL};
use crate::error::{PaymentError, PaymentResult};
use crate::transaction::types::UnsignedTransaction;

#[derive(Debug, Clone)]
pub enum MockReply {
    Json(Value),
    Fail(PaymentError),
    /// Never completes. Used to exercise cancellation and timeouts.
    Hang,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    queued: Mutex<HashMap<String, VecDeque<MockReply>>>,
    defaults: Mutex<HashMap<String, MockReply>>,
    calls: Mutex<Vec<MockCall>>,
}

/// `https://host/v1/x?y=1` and `/v1/x` both become `v1/x`.
fn normalize(path_or_url: &str) -> String {
    let without_scheme = path_or_url
        .strip_prefix("https://")
        .or_else(|| path_or_url.strip_prefix("http://"));
    let path = match without_scheme {
        Some(rest) => rest.find('/').map(|i| &rest[i..]).unwrap_or(""),
        None => path_or_url,
    };
    let path = path.split('?').next().unwrap_or_default();
    path.trim_matches('/').to_string()
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a one-shot reply for `path`.
    pub fn push(&self, path: &str, reply: MockReply) {
        self.queued
            .lock()
            .entry(normalize(path))
            .or_default()
            .push_back(reply);
    }

    /// Reply used for `path` whenever its queue is empty.
    pub fn set_default(&self, path: &str, reply: MockReply) {
        self.defaults.lock().insert(normalize(path), reply);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        let path = normalize(path);
        self.calls.lock().iter().filter(|c| c.path == path).count()
    }

    async fn respond(&self, method: &'static str, path_or_url: &str, body: Option<&Value>) -> PaymentResult<Value> {
        let path = normalize(path_or_url);
        self.calls.lock().push(MockCall {
            method,
            path: path.clone(),
            body: body.cloned(),
        });

        let reply = {
            let queued = self.queued.lock().get_mut(&path).and_then(VecDeque::pop_front);
            queued.or_else(|| self.defaults.lock().get(&path).cloned())
        };

        match reply {
            Some(MockReply::Json(value)) => Ok(value),
            Some(MockReply::Fail(err)) => Err(err),
            Some(MockReply::Hang) => std::future::pending().await,
            None => Err(PaymentError::Network(format!("no mock reply for {path}"))),
        }
    }
}

#[async_trait]
impl NodeTransport for MockTransport {
    async fn post_json(&self, path: &str, body: &Value) -> PaymentResult<Value> {
        self.respond("POST", path, Some(body)).await
    }

    async fn get_json(&self, path_or_url: &str) -> PaymentResult<Value> {
        self.respond("GET", path_or_url, None).await
    }
}

/// The JSON a node would return from `createtransaction` for `tx`.
pub fn node_transaction_json(tx: &UnsignedTransaction) -> Value {
    json!({
        "visible": true,
        "txID": tx.tx_id_hex(),
        "raw_data": {
            "contract": [{
                "parameter": {
                    "value": {
                        "amount": tx.amount(),
                        "owner_address": tx.owner().encode(),
                        "to_address": tx.to().encode(),
                    },
                    "type_url": TRANSFER_CONTRACT_TYPE_URL,
                },
                "type": TRANSFER_CONTRACT_NAME,
            }],
            "ref_block_bytes": hex::encode(tx.ref_block_bytes()),
            "ref_block_hash": hex::encode(tx.ref_block_hash()),
            "expiration": tx.expiration(),
            "timestamp": tx.timestamp(),
        },
        "raw_data_hex": hex::encode(tx.raw_bytes()),
    })
}
