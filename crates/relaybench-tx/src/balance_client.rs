//! HTTP client for the relay's balance service.
//!
//! Endpoints:
//! - GET /balance/{address}

use alloy_primitives::Address;
use relaybench_types::{RelayError, Result};
use std::time::Duration;
use tracing::debug;

/// Balance service client.
#[derive(Debug, Clone)]
pub struct BalanceClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl BalanceClient {
    pub fn new(host: &str, port: u16, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(20_000);
        Self {
            base_url: format!("http://{}:{}", host, port),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Fetch the relay-side account record for `address`.
    ///
    /// Anything other than a plain 200 is a failure.
    pub async fn balance(&self, address: Address) -> Result<serde_json::Value> {
        let url = format!("{}/balance/{}", self.base_url, address);

        let resp = self.client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RelayError::Transport(format!("balance request failed: {}", e)))?;

        let status = resp.status().as_u16();
        if status > 200 {
            return Err(RelayError::BalanceCheckFailure { status });
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| RelayError::InvalidResponse(format!("failed to parse balance response: {}", e)))?;

        debug!(%address, "fetched relay balance");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    async fn serve(app: Router) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_balance_ok() {
        let app = Router::new().route(
            "/balance/:address",
            get(|Path(address): Path<String>| async move {
                Json(json!({ "address": address, "balance": "7000000000000000000" }))
            }),
        );
        let addr = serve(app).await;
        let client = BalanceClient::new(&addr.ip().to_string(), addr.port(), Some(5_000));

        let account = Address::repeat_byte(0x11);
        let body = client.balance(account).await.unwrap();
        assert_eq!(body["balance"], "7000000000000000000");
        assert_eq!(
            body["address"].as_str().unwrap().to_lowercase(),
            account.to_string().to_lowercase()
        );
    }

    #[tokio::test]
    async fn test_balance_non_200_is_failure() {
        let app = Router::new()
            .route("/balance/:address", get(|| async { (StatusCode::ACCEPTED, "{}") }));
        let addr = serve(app).await;
        let client = BalanceClient::new(&addr.ip().to_string(), addr.port(), Some(5_000));

        let err = client.balance(Address::repeat_byte(0x11)).await.unwrap_err();
        assert!(matches!(err, RelayError::BalanceCheckFailure { status: 202 }));
    }

    #[tokio::test]
    async fn test_balance_not_found() {
        let addr = serve(Router::new()).await;
        let client = BalanceClient::new(&addr.ip().to_string(), addr.port(), Some(5_000));

        let err = client.balance(Address::repeat_byte(0x11)).await.unwrap_err();
        assert!(matches!(err, RelayError::BalanceCheckFailure { status: 404 }));
    }
}
