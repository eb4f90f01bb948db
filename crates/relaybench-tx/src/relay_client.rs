//! HTTP client for the relay service.
//!
//! Endpoints:
//! - POST /relay

use async_trait::async_trait;
use relaybench_types::{RelayError, Result, SignedTransactionRequest};
use std::time::Duration;
use tracing::debug;

use crate::{RelaySubmitter, SubmissionReceipt};

/// Relay client for submitting signed relay transactions.
#[derive(Debug, Clone)]
pub struct RelayClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl RelayClient {
    pub fn new(base_url: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(30_000);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a signed relay transaction.
    ///
    /// POST /relay
    pub async fn submit(&self, request: &SignedTransactionRequest) -> Result<SubmissionReceipt> {
        let url = format!("{}/relay", self.base_url);

        let resp = self.client
            .post(&url)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RelayError::Transport(format!("relay request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::RejectedByRelay {
                status: status.as_u16(),
                body,
            });
        }

        // The relay has accepted the request at this point; a broken body must
        // not look retryable.
        let text = resp
            .text()
            .await
            .map_err(|e| RelayError::InvalidResponse(format!("failed to read relay response: {}", e)))?;
        let body: serde_json::Value = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| RelayError::InvalidResponse(format!("failed to parse relay response: {}", e)))?
        };

        debug!(status = status.as_u16(), "relay accepted request");
        Ok(SubmissionReceipt::from_body(body))
    }
}

#[async_trait]
impl RelaySubmitter for RelayClient {
    async fn submit(&self, request: SignedTransactionRequest) -> Result<SubmissionReceipt> {
        RelayClient::submit(self, &request).await
    }
}
