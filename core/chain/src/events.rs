//! Event extraction from transaction receipts
//!
//! Receipts carry logs from every contract touched by the transaction. Each
//! log is decoded independently against the expected event shape; logs that
//! do not parse or do not match are skipped.

use primitive_types::U256;
use tracing::{debug, warn};

use crate::abi::event_topic;
use crate::errors::ChainError;
use crate::types::{Address, Log, RunId, TransactionReceipt};

pub const AGENT_RUN_CREATED: &str = "AgentRunCreated(address,uint256)";
pub const AGENT_DEPLOYED: &str = "AgentDeployed(uint256,address)";

fn parse_topic(topic: &str) -> Result<[u8; 32], ChainError> {
    let bytes = hex::decode(topic.trim_start_matches("0x"))?;
    if bytes.len() != 32 {
        return Err(ChainError::Abi(format!("topic has {} bytes", bytes.len())));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Decodes the indexed `uint256` at `index` (1-based, topic 0 is the
/// signature) if the log is an instance of `signature`.
pub fn decode_indexed_uint(
    log: &Log,
    signature: &str,
    index: usize,
    emitter: Option<&Address>,
) -> Result<Option<U256>, ChainError> {
    if let Some(expected) = emitter {
        let address: Address = log.address.parse()?;
        if &address != expected {
            return Ok(None);
        }
    }

    let topic0 = match log.topics.first() {
        Some(topic) => parse_topic(topic)?,
        None => return Ok(None),
    };
    if topic0 != event_topic(signature) {
        return Ok(None);
    }

    let topic = log
        .topics
        .get(index)
        .ok_or_else(|| ChainError::Abi(format!("{} log has no topic {}", signature, index)))?;
    Ok(Some(U256::from_big_endian(&parse_topic(topic)?)))
}

/// All values of an indexed `uint256` argument emitted as `signature`
pub fn indexed_uints(
    receipt: &TransactionReceipt,
    signature: &str,
    index: usize,
    emitter: Option<&Address>,
) -> Vec<U256> {
    receipt
        .logs
        .iter()
        .enumerate()
        .filter_map(
            |(i, log)| match decode_indexed_uint(log, signature, index, emitter) {
                Ok(found) => found,
                Err(e) => {
                    debug!(log_index = i, error = %e, "skipping unparsable log");
                    None
                }
            },
        )
        .collect()
}

/// Run identifiers from `AgentRunCreated(owner, runId)`
pub fn run_created_ids(receipt: &TransactionReceipt, emitter: Option<&Address>) -> Vec<RunId> {
    indexed_uints(receipt, AGENT_RUN_CREATED, 2, emitter)
        .into_iter()
        .filter_map(|value| match RunId::try_from(value) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "ignoring AgentRunCreated with oversized run id");
                None
            }
        })
        .collect()
}

/// Token identifiers from `AgentDeployed(tokenId, owner)`
pub fn agent_deployed_ids(receipt: &TransactionReceipt, emitter: Option<&Address>) -> Vec<U256> {
    indexed_uints(receipt, AGENT_DEPLOYED, 1, emitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic_hex(bytes: [u8; 32]) -> String {
        format!("0x{}", hex::encode(bytes))
    }

    fn uint_topic(value: u64) -> String {
        let mut word = [0u8; 32];
        U256::from(value).to_big_endian(&mut word);
        topic_hex(word)
    }

    fn run_created_log(emitter: &str, run_id: u64) -> Log {
        Log {
            address: emitter.to_string(),
            topics: vec![
                topic_hex(event_topic(AGENT_RUN_CREATED)),
                topic_hex([0x11; 32]),
                uint_topic(run_id),
            ],
            data: "0x".to_string(),
        }
    }

    const MANAGER: &str = "0x2222222222222222222222222222222222222222";

    #[test]
    fn test_run_id_from_second_indexed_argument() {
        let receipt = TransactionReceipt {
            logs: vec![run_created_log(MANAGER, 42)],
            ..Default::default()
        };
        assert_eq!(run_created_ids(&receipt, None), vec![RunId(42)]);
    }

    #[test]
    fn test_unparsable_and_foreign_logs_are_skipped() {
        let transfer = Log {
            address: MANAGER.to_string(),
            topics: vec![topic_hex(event_topic("Transfer(address,address,uint256)"))],
            data: "0x".to_string(),
        };
        let garbage = Log {
            address: "nonsense".to_string(),
            topics: vec!["0xzz".to_string()],
            data: String::new(),
        };
        let truncated = Log {
            address: MANAGER.to_string(),
            topics: vec![topic_hex(event_topic(AGENT_RUN_CREATED))],
            data: "0x".to_string(),
        };
        let receipt = TransactionReceipt {
            logs: vec![transfer, garbage, truncated, run_created_log(MANAGER, 7)],
            ..Default::default()
        };
        assert_eq!(run_created_ids(&receipt, None), vec![RunId(7)]);
    }

    #[test]
    fn test_emitter_filter() {
        let manager: Address = MANAGER.parse().unwrap();
        let receipt = TransactionReceipt {
            logs: vec![
                run_created_log("0x3333333333333333333333333333333333333333", 1),
                run_created_log(MANAGER, 2),
            ],
            ..Default::default()
        };
        assert_eq!(run_created_ids(&receipt, Some(&manager)), vec![RunId(2)]);
        assert!(run_created_ids(&TransactionReceipt::default(), Some(&manager)).is_empty());
    }

    #[test]
    fn test_agent_deployed_token_id() {
        let log = Log {
            address: MANAGER.to_string(),
            topics: vec![
                topic_hex(event_topic(AGENT_DEPLOYED)),
                uint_topic(9),
                topic_hex([0x11; 32]),
            ],
            data: "0x".to_string(),
        };
        let receipt = TransactionReceipt {
            logs: vec![log],
            ..Default::default()
        };
        assert_eq!(agent_deployed_ids(&receipt, None), vec![U256::from(9u64)]);
    }
}
