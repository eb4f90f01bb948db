//! Load-test configuration.

use std::path::Path;
use std::str::FromStr;

use alloy_primitives::{address, Address, U256};
use serde::{Deserialize, Serialize};
use relaybench_types::{u256_decimal, RelayError, Result};
use relaybench_watch::WatcherConfig;

use crate::gas::GasPolicy;

/// Everything the dispatcher and the CLI need to talk to the relay and the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Relay contract that executes requests and emits `RelayExecuted`.
    pub relay_contract: Address,
    /// Address expected to sign relay receipts.
    pub receipt_signer: Address,
    pub relay_url: String,
    pub rpc_url: String,
    pub balance_host: String,
    pub balance_port: u16,
    /// Blocks between the batch start and its deadline.
    pub min_deadline_lead: u64,
    pub deposit_confirmations: u64,
    pub deployment_confirmations: u64,
    #[serde(with = "u256_decimal")]
    pub refund_wei: U256,
    pub gas: GasPolicy,
    pub watcher: WatcherConfig,
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay_contract: address!("E25ec6cB37b1a37D8383891BC5DFd627c6Cd66C8"),
            receipt_signer: address!("e41743ca34762b84004d3abe932443fc51d561d5"),
            relay_url: "https://y9g7myp1zl.execute-api.us-east-2.amazonaws.com/Stage".into(),
            rpc_url: "http://127.0.0.1:8545".into(),
            balance_host: "18.188.185.156".into(),
            balance_port: 5399,
            min_deadline_lead: 610,
            deposit_confirmations: 100,
            deployment_confirmations: 6,
            refund_wei: U256::from(10_000_000_000u64),
            gas: GasPolicy::default(),
            watcher: WatcherConfig::default(),
            request_timeout_ms: 30_000,
        }
    }
}

impl Config {
    /// Read a JSON config file; missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_str(&raw)
    }

    /// Fail fast on values that would make every job fail.
    pub fn validate(&self) -> Result<()> {
        if self.relay_contract == Address::ZERO {
            return Err(RelayError::Config("relay_contract is the zero address".into()));
        }
        if self.relay_url.trim().is_empty() {
            return Err(RelayError::Config("relay_url is empty".into()));
        }
        if self.min_deadline_lead == 0 {
            return Err(RelayError::Config("min_deadline_lead must be positive".into()));
        }
        if self.gas.low == 0 || self.gas.low > self.gas.high {
            return Err(RelayError::Config(format!(
                "gas tiers must satisfy 0 < low ({}) <= high ({})",
                self.gas.low, self.gas.high
            )));
        }
        if self.watcher.poll_interval_ms == 0 || self.watcher.max_block_range == 0 {
            return Err(RelayError::Config(
                "watcher poll_interval_ms and max_block_range must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Watcher settings bound to this config's relay contract.
    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            relay_contract: self.relay_contract,
            ..self.watcher.clone()
        }
    }
}

impl FromStr for Config {
    type Err = RelayError;

    fn from_str(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)
            .map_err(|e| RelayError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}
