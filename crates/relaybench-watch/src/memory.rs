//! In-memory chain reader for testing.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use relaybench_crypto::event;
use relaybench_types::{ChainLog, ConfirmationRecord, RelayError, Result};

use crate::ChainReader;

#[derive(Default)]
struct ChainState {
    head: u64,
    logs: Vec<ChainLog>,
    receipts: HashMap<B256, u64>,
    failing_reads: usize,
}

/// In-memory chain (for testing and dry runs).
#[derive(Default)]
pub struct MemoryChain {
    state: Mutex<ChainState>,
}

impl MemoryChain {
    pub fn new(head: u64) -> Self {
        Self {
            state: Mutex::new(ChainState { head, ..Default::default() }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn head(&self) -> u64 {
        self.lock().head
    }

    pub fn set_head(&self, head: u64) {
        self.lock().head = head;
    }

    pub fn advance(&self, blocks: u64) -> u64 {
        let mut state = self.lock();
        state.head += blocks;
        state.head
    }

    pub fn push_log(&self, log: ChainLog) {
        self.lock().logs.push(log);
    }

    /// Emit a `RelayExecuted` log from `relay_contract` in `block`.
    pub fn push_confirmation(&self, relay_contract: Address, block: u64, record: &ConfirmationRecord) {
        self.push_log(ChainLog {
            address: relay_contract,
            data: event::encode_confirmation(record),
            block_number: Some(block),
            transaction_hash: record.transaction_hash,
        });
    }

    /// Mark `tx_hash` as mined in `block`.
    pub fn include_transaction(&self, tx_hash: B256, block: u64) {
        self.lock().receipts.insert(tx_hash, block);
    }

    /// Make the next `count` reads fail with a transport error.
    pub fn fail_next_reads(&self, count: usize) {
        self.lock().failing_reads = count;
    }

    fn check_failure(state: &mut ChainState) -> Result<()> {
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(RelayError::Transport("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for MemoryChain {
    async fn block_number(&self) -> Result<u64> {
        let mut state = self.lock();
        Self::check_failure(&mut state)?;
        Ok(state.head)
    }

    async fn logs(
        &self,
        address: Address,
        topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainLog>> {
        let mut state = self.lock();
        Self::check_failure(&mut state)?;
        let logs = state
            .logs
            .iter()
            .filter(|log| {
                if log.address != address {
                    return false;
                }
                if log.data.topics().first() != Some(&topic) {
                    return false;
                }
                // Pending logs (no block yet) are never returned.
                matches!(log.block_number, Some(b) if b >= from_block && b <= to_block && b <= state.head)
            })
            .cloned()
            .collect();
        Ok(logs)
    }

    async fn transaction_block(&self, tx_hash: B256) -> Result<Option<u64>> {
        let mut state = self.lock();
        Self::check_failure(&mut state)?;
        let head = state.head;
        Ok(state.receipts.get(&tx_hash).copied().filter(|b| *b <= head))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn record(byte: u8) -> ConfirmationRecord {
        ConfirmationRecord {
            identifier: B256::repeat_byte(byte),
            success: true,
            executor: Address::repeat_byte(0x77),
            gas_used: U256::from(1u64),
            fee: U256::ZERO,
            block_number: None,
            transaction_hash: None,
        }
    }

    #[tokio::test]
    async fn test_logs_filtered_by_address_topic_and_range() {
        let relay = Address::repeat_byte(0x33);
        let chain = MemoryChain::new(20);
        chain.push_confirmation(relay, 5, &record(1));
        chain.push_confirmation(relay, 15, &record(2));
        chain.push_confirmation(Address::repeat_byte(0x44), 15, &record(3));
        chain.push_confirmation(relay, 25, &record(4));

        let topic = event::relay_executed_topic();
        let logs = chain.logs(relay, topic, 10, 30).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(event::decode_confirmation(&logs[0]).unwrap().identifier, B256::repeat_byte(2));

        assert!(chain.logs(relay, B256::ZERO, 0, 30).await.unwrap().is_empty());

        chain.set_head(30);
        assert_eq!(chain.logs(relay, topic, 0, 30).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let chain = MemoryChain::new(7);
        chain.fail_next_reads(1);
        assert!(matches!(chain.block_number().await, Err(RelayError::Transport(_))));
        assert_eq!(chain.block_number().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_transaction_block_hidden_until_mined() {
        let chain = MemoryChain::new(10);
        let tx = B256::repeat_byte(0x09);
        chain.include_transaction(tx, 12);
        assert_eq!(chain.transaction_block(tx).await.unwrap(), None);
        chain.advance(2);
        assert_eq!(chain.transaction_block(tx).await.unwrap(), Some(12));
    }
}
