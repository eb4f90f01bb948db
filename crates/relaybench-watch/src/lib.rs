//! Chain access and confirmation tracking for relay transactions.
//!
//! - `ChainReader`: block height, relay logs and receipts
//! - `ConfirmationWatcher`: one shared log poller, many awaiters keyed by identifier
//! - `wait_for_confirmations`: block-depth waiting for funding/deploy transactions

pub mod confirmations;
pub mod memory;
pub mod rpc;
pub mod watcher;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use relaybench_types::{ChainLog, Result};

pub use confirmations::wait_for_confirmations;
pub use memory::MemoryChain;
pub use rpc::RpcChainReader;
pub use watcher::{ConfirmationWatcher, PendingConfirmation};

/// Watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub relay_contract: Address,
    pub poll_interval_ms: u64,
    /// Blocks behind the current head where the first scan starts.
    pub lookback_blocks: u64,
    /// Largest block span requested in one log query.
    pub max_block_range: u64,
    /// Trailing blocks read again on every poll, for nodes that report a
    /// head before its logs can be queried. Awaiters expire only once their
    /// deadline block is this far behind the scanned head.
    pub rescan_blocks: u64,
    /// Confirmations kept for identifiers nobody is waiting on yet.
    pub unclaimed_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            relay_contract: Address::ZERO,
            poll_interval_ms: 2_000,
            lookback_blocks: 10,
            max_block_range: 500,
            rescan_blocks: 2,
            unclaimed_capacity: 256,
        }
    }
}

/// Read-only view of the chain.
///
/// All methods are async so both RPC-backed and in-memory readers fit.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current head block number.
    async fn block_number(&self) -> Result<u64>;

    /// Logs emitted by `address` with topic 0 equal to `topic`, inclusive range.
    async fn logs(
        &self,
        address: Address,
        topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainLog>>;

    /// Block that included `tx_hash`, if it has been mined.
    async fn transaction_block(&self, tx_hash: B256) -> Result<Option<u64>>;
}
