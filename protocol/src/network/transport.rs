//! HTTP transport to a TRON full node.
//!
//! [`NodeTransport`] is the seam between the typed client and the wire.
//! [`HttpTransport`] is the real thing; tests use
//! [`MockTransport`](super::mock::MockTransport).
//!
//! Failure mapping:
//!
//! ```text
//! connect/read timeout      -> NetworkTimeout
//! other transport failure   -> Network
//! HTTP 5xx                  -> Network
//! HTTP 4xx                  -> NodeRejected(body)
//! ```

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;

use crate::config::{RPC_CONNECT_TIMEOUT, RPC_READ_TIMEOUT};
use crate::error::{PaymentError, PaymentResult};

#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// POSTs `body` to `path` (relative to the node URL) and returns the JSON reply.
    async fn post_json(&self, path: &str, body: &Value) -> PaymentResult<Value>;

    /// GETs a relative path or an absolute URL (pagination links are absolute).
    async fn get_json(&self, path_or_url: &str) -> PaymentResult<Value>;
}

/// `reqwest`-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    inner: Client,
    base_url: String,
}

fn map_transport(err: reqwest::Error) -> PaymentError {
    if err.is_timeout() {
        PaymentError::NetworkTimeout
    } else {
        PaymentError::Network(err.to_string())
    }
}

impl HttpTransport {
    pub fn new(base_url: &str) -> PaymentResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(PaymentError::InvalidSettings(format!(
                "node URL must be http(s), got {base_url:?}"
            )));
        }

        let inner = Client::builder()
            .connect_timeout(RPC_CONNECT_TIMEOUT)
            .read_timeout(RPC_READ_TIMEOUT)
            .user_agent(concat!("trxsafe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        Ok(Self { inner, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!("{}/{}", self.base_url, path_or_url.trim_start_matches('/'))
        }
    }

    async fn into_json(response: Response) -> PaymentResult<Value> {
        let status = response.status();
        if status.is_server_error() {
            return Err(PaymentError::Network(format!("node returned HTTP {status}")));
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            let body = body.trim();
            return Err(PaymentError::NodeRejected(if body.is_empty() {
                format!("HTTP {status}")
            } else {
                body.to_string()
            }));
        }
        response.json().await.map_err(|e| {
            if e.is_timeout() {
                PaymentError::NetworkTimeout
            } else {
                PaymentError::Network(format!("invalid JSON from node: {e}"))
            }
        })
    }
}

#[async_trait]
impl NodeTransport for HttpTransport {
    async fn post_json(&self, path: &str, body: &Value) -> PaymentResult<Value> {
        let url = self.url_for(path);
        tracing::trace!(%url, "POST");
        let response = self
            .inner
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_transport)?;
        Self::into_json(response).await
    }

    async fn get_json(&self, path_or_url: &str) -> PaymentResult<Value> {
        let url = self.url_for(path_or_url);
        tracing::trace!(%url, "GET");
        let response = self.inner.get(&url).send().await.map_err(map_transport)?;
        Self::into_json(response).await
    }
}
