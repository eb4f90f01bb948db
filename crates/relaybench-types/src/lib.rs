//! Shared types for the relay load-test workspace.
//!
//! - Error enum and `Result` alias used by every crate
//! - Relay transaction data model (unsigned, signed, deadline)
//! - On-chain confirmation records and raw chain logs

use alloy_primitives::{Address, Bytes, LogData, B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Relay transaction identifier: keccak-256 digest of the canonical encoding.
pub type Identifier = B256;

/// Relay load-test error types.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("cannot encode relay transaction: {0}")]
    Encoding(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("relay rejected request with status {status}: {body}")]
    RejectedByRelay { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("no confirmation for {identifier} by deadline block {deadline}")]
    ConfirmationTimeout { identifier: Identifier, deadline: u64 },

    #[error("balance check failed with status {status}")]
    BalanceCheckFailure { status: u16 },

    #[error("deadline block {deadline} is less than {min_lead} blocks ahead of block {current}")]
    DeadlineTooSoon { deadline: u64, current: u64, min_lead: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("confirmation wait cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl RelayError {
    /// Only transport failures may be retried, and only by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Block number by which the relay must have executed a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deadline(u64);

impl Deadline {
    /// Build a deadline, enforcing the minimum lead over the current height.
    pub fn new(block: u64, current_height: u64, min_lead: u64) -> Result<Self> {
        let earliest = current_height.saturating_add(min_lead);
        if block < earliest {
            return Err(RelayError::DeadlineTooSoon {
                deadline: block,
                current: current_height,
                min_lead,
            });
        }
        Ok(Self(block))
    }

    /// Deadline exactly `lead` blocks past `current_height`.
    pub fn after(current_height: u64, lead: u64) -> Self {
        Self(current_height.saturating_add(lead))
    }

    pub fn block(&self) -> u64 {
        self.0
    }

    /// True once `height` has reached the deadline block.
    pub fn is_reached(&self, height: u64) -> bool {
        height >= self.0
    }
}

/// Unsigned relay transaction.
///
/// Field names match the relay's JSON wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub gas: u64,
    pub data: Bytes,
    pub deadline_block_number: u64,
    #[serde(with = "u256_decimal")]
    pub refund: U256,
    pub relay_contract_address: Address,
}

/// Relay transaction plus the sender's signature over its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransactionRequest {
    #[serde(flatten)]
    pub request: TransactionRequest,
    pub signature: Bytes,
}

/// Decoded `RelayExecuted` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRecord {
    pub identifier: Identifier,
    pub success: bool,
    pub executor: Address,
    pub gas_used: U256,
    pub fee: U256,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
}

/// Raw log entry as returned by a chain reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLog {
    pub address: Address,
    pub data: LogData,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
}

/// Parse a hex string to a byte vector.
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(hex_str).map_err(|e| RelayError::InvalidHex(e.to_string()))
}

/// Serde adapter writing a `U256` as a decimal string.
pub mod u256_decimal {
    use alloy_primitives::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_str(&raw).map_err(D::Error::custom)
    }
}
