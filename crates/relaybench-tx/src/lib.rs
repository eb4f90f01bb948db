//! Relay submission and account balance lookup.
//!
//! - Submit signed relay transactions to the relay service
//! - Query the relay's balance endpoint for a sender

use alloy_primitives::Bytes;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use relaybench_types::{Result, SignedTransactionRequest};

pub mod balance_client;
pub mod relay_client;

pub use balance_client::BalanceClient;
pub use relay_client::RelayClient;

/// Acknowledgement returned by the relay for an accepted request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// Relay's signature over the receipt, when it sends one.
    pub receipt_signature: Option<Bytes>,
    /// Full response body, kept opaque.
    pub body: serde_json::Value,
}

impl SubmissionReceipt {
    /// Build a receipt from a decoded response body.
    pub fn from_body(body: serde_json::Value) -> Self {
        let receipt_signature = body
            .get("receiptSignature")
            .and_then(|v| v.as_str())
            .and_then(|s| relaybench_types::hex_to_bytes(s).ok())
            .map(Bytes::from);
        Self { receipt_signature, body }
    }
}

/// One-shot submission of a signed relay transaction.
///
/// Implementations must not retry on their own: a duplicated submission
/// would be executed (and refunded) twice.
#[async_trait]
pub trait RelaySubmitter: Send + Sync {
    async fn submit(&self, request: SignedTransactionRequest) -> Result<SubmissionReceipt>;
}
