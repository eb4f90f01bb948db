//! Relay transaction identifier.
//!
//! relay_tx_id = keccak256(abi.encode(
//!     to, from, data, deadlineBlockNumber, refund, gas, relayContractAddress
//! ))
//!
//! The relay and the `RelayExecuted` event both report this value, so the
//! tuple order and types below must not change.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolValue;
use sha3::{Digest, Keccak256};

use relaybench_types::{Identifier, RelayError, Result, TransactionRequest};

/// Solidity types of the encoded tuple, in order.
pub const RELAY_TX_ID_ABI_TYPES: &str =
    "(address,address,bytes,uint256,uint256,uint256,address)";

/// Request fields of the encoded tuple, in order.
pub const RELAY_TX_ID_FIELDS: [&str; 7] = [
    "to",
    "from",
    "data",
    "deadlineBlockNumber",
    "refund",
    "gas",
    "relayContractAddress",
];

fn validate(request: &TransactionRequest) -> Result<()> {
    let addresses = [
        ("to", request.to),
        ("from", request.from),
        ("relayContractAddress", request.relay_contract_address),
    ];
    for (name, address) in addresses {
        if address == Address::ZERO {
            return Err(RelayError::Encoding(format!("{} is the zero address", name)));
        }
    }
    if request.data.is_empty() {
        return Err(RelayError::Encoding("data is empty".into()));
    }
    if request.gas == 0 {
        return Err(RelayError::Encoding("gas is zero".into()));
    }
    if request.deadline_block_number == 0 {
        return Err(RelayError::Encoding("deadlineBlockNumber is zero".into()));
    }
    Ok(())
}

/// ABI-encode the request fields as a parameter list (no outer offset).
pub fn encode(request: &TransactionRequest) -> Result<Vec<u8>> {
    validate(request)?;
    let tuple = (
        request.to,
        request.from,
        request.data.clone(),
        U256::from(request.deadline_block_number),
        request.refund,
        U256::from(request.gas),
        request.relay_contract_address,
    );
    Ok(tuple.abi_encode_params())
}

/// Compute the relay transaction identifier.
pub fn compute(request: &TransactionRequest) -> Result<Identifier> {
    let encoded = encode(request)?;
    Ok(B256::from_slice(&Keccak256::digest(&encoded)))
}
