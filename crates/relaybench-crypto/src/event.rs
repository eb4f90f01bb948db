//! `RelayExecuted` event ABI.

use alloy_primitives::{LogData, B256};
use alloy_sol_types::SolEvent;

use relaybench_types::{ChainLog, ConfirmationRecord, RelayError, Result};

alloy_sol_types::sol! {
    #[derive(Debug, PartialEq, Eq)]
    event RelayExecuted(
        bytes32 relayTxId,
        bool success,
        address executor,
        uint256 gasUsed,
        uint256 fee
    );
}

pub const RELAY_EXECUTED_SIGNATURE: &str = "RelayExecuted(bytes32,bool,address,uint256,uint256)";

/// Topic 0 of every `RelayExecuted` log.
pub fn relay_executed_topic() -> B256 {
    RelayExecuted::SIGNATURE_HASH
}

/// Decode a raw log into a confirmation record.
pub fn decode_confirmation(log: &ChainLog) -> Result<ConfirmationRecord> {
    let event = RelayExecuted::decode_log_data(&log.data)
        .map_err(|e| RelayError::InvalidResponse(format!("undecodable RelayExecuted log: {}", e)))?;
    Ok(ConfirmationRecord {
        identifier: event.relayTxId,
        success: event.success,
        executor: event.executor,
        gas_used: event.gasUsed,
        fee: event.fee,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
    })
}

/// Encode a confirmation record as `RelayExecuted` log data.
pub fn encode_confirmation(record: &ConfirmationRecord) -> LogData {
    RelayExecuted {
        relayTxId: record.identifier,
        success: record.success,
        executor: record.executor,
        gasUsed: record.gas_used,
        fee: record.fee,
    }
    .encode_log_data()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use sha3::{Digest, Keccak256};

    fn record() -> ConfirmationRecord {
        ConfirmationRecord {
            identifier: B256::repeat_byte(0x5a),
            success: true,
            executor: Address::repeat_byte(0x77),
            gas_used: U256::from(21_000u64),
            fee: U256::from(42u64),
            block_number: Some(120),
            transaction_hash: Some(B256::repeat_byte(0x01)),
        }
    }

    #[test]
    fn test_topic_matches_signature_hash() {
        let expected = B256::from_slice(&Keccak256::digest(RELAY_EXECUTED_SIGNATURE.as_bytes()));
        assert_eq!(relay_executed_topic(), expected);
        assert_eq!(RelayExecuted::SIGNATURE, RELAY_EXECUTED_SIGNATURE);
    }

    #[test]
    fn test_decode_encoded_log() {
        let rec = record();
        let data = encode_confirmation(&rec);
        assert_eq!(data.topics(), &[relay_executed_topic()]);

        let log = ChainLog {
            address: Address::repeat_byte(0x33),
            data,
            block_number: rec.block_number,
            transaction_hash: rec.transaction_hash,
        };
        assert_eq!(decode_confirmation(&log).unwrap(), rec);
    }

    #[test]
    fn test_foreign_event_rejected() {
        let foreign_topic = B256::from_slice(&Keccak256::digest(b"Transfer(address,address,uint256)"));
        let log = ChainLog {
            address: Address::repeat_byte(0x33),
            data: LogData::new_unchecked(vec![foreign_topic], vec![0u8; 160].into()),
            block_number: None,
            transaction_hash: None,
        };
        assert!(matches!(decode_confirmation(&log), Err(RelayError::InvalidResponse(_))));
    }
}
