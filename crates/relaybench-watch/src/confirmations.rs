//! Block-depth waiting for ordinary transactions (deposits, deployments).

use alloy_primitives::B256;
use relaybench_types::{RelayError, Result};
use std::time::Duration;
use tracing::{debug, info};

use crate::ChainReader;

/// Number of blocks on top of (and including) `included`.
fn depth(head: u64, included: u64) -> u64 {
    (head + 1).saturating_sub(included)
}

/// Poll until `tx_hash` is `confirmations` blocks deep, waiting between attempts.
///
/// Returns the inclusion block.
pub async fn wait_for_confirmations(
    reader: &dyn ChainReader,
    tx_hash: B256,
    confirmations: u64,
    max_attempts: u32,
    poll_interval_ms: u64,
) -> Result<u64> {
    for attempt in 0..max_attempts {
        if let Some(block) = reader.transaction_block(tx_hash).await? {
            let head = reader.block_number().await?;
            let current = depth(head, block);
            debug!(%tx_hash, block, head, current, confirmations, "waiting for confirmations");
            if current >= confirmations {
                info!(%tx_hash, block, confirmations, "transaction confirmed");
                return Ok(block);
            }
        }
        if attempt + 1 < max_attempts {
            tokio::time::sleep(Duration::from_millis(poll_interval_ms)).await;
        }
    }
    Err(RelayError::Other(format!(
        "transaction {} not {} blocks deep after {} attempts",
        tx_hash, confirmations, max_attempts
    )))
}
