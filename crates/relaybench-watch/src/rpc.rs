//! JSON-RPC chain reader.

use alloy_network::Ethereum;
use alloy_primitives::{Address, B256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types_eth::Filter;
use async_trait::async_trait;
use relaybench_types::{ChainLog, RelayError, Result};

use crate::ChainReader;

/// Chain reader backed by an Ethereum JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcChainReader {
    provider: RootProvider<Ethereum>,
}

impl RpcChainReader {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url: reqwest::Url = rpc_url
            .parse()
            .map_err(|e| RelayError::Config(format!("invalid rpc url {}: {}", rpc_url, e)))?;
        let client = alloy_rpc_client::RpcClient::builder().http(url);
        Ok(Self {
            provider: RootProvider::<Ethereum>::new(client),
        })
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| RelayError::Transport(format!("eth_blockNumber failed: {}", e)))
    }

    async fn logs(
        &self,
        address: Address,
        topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainLog>> {
        let filter = Filter::new()
            .address(address)
            .event_signature(topic)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self.provider
            .get_logs(&filter)
            .await
            .map_err(|e| RelayError::Transport(format!("eth_getLogs failed: {}", e)))?;

        Ok(logs
            .into_iter()
            .map(|log| ChainLog {
                address: log.inner.address,
                block_number: log.block_number,
                transaction_hash: log.transaction_hash,
                data: log.inner.data,
            })
            .collect())
    }

    async fn transaction_block(&self, tx_hash: B256) -> Result<Option<u64>> {
        let receipt = self.provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| RelayError::Transport(format!("eth_getTransactionReceipt failed: {}", e)))?;
        Ok(receipt.and_then(|r| r.block_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_rpc_url() {
        assert!(matches!(RpcChainReader::new("not a url"), Err(RelayError::Config(_))));
    }

    #[test]
    fn test_valid_rpc_url() {
        assert!(RpcChainReader::new("http://127.0.0.1:8545").is_ok());
    }
}
