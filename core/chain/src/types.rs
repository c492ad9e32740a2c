// agentverse/core/chain/src/types.rs

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ChainError;

/// 20-byte account or contract address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hexstr = s.trim().trim_start_matches("0x");
        let bytes = hex::decode(hexstr).map_err(|_| ChainError::InvalidAddress(s.to_string()))?;
        if bytes.len() != 20 {
            return Err(ChainError::InvalidAddress(s.to_string()));
        }
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&bytes);
        Ok(Address(addr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Identifier the agent contract assigns to a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub u64);

impl RunId {
    pub fn as_u256(&self) -> U256 {
        U256::from(self.0)
    }
}

impl TryFrom<U256> for RunId {
    type Error = ChainError;

    fn try_from(value: U256) -> Result<Self, Self::Error> {
        if value > U256::from(u64::MAX) {
            return Err(ChainError::Abi(format!("run id {} does not fit in u64", value)));
        }
        Ok(RunId(value.as_u64()))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Run record as stored by the agent contract (`agentRuns(uint256)`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub owner: Address,
    pub responses_count: u64,
    pub max_iterations: u8,
    pub is_finished: bool,
    pub knowledge_base: String,
}

/// Log entry as returned by `eth_getTransactionReceipt`.
///
/// Fields are kept as raw hex strings; each consumer decodes what it needs
/// and skips entries it cannot parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub gas_used: Option<String>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl TransactionReceipt {
    /// Pre-Byzantium receipts carry no status; treat them as successful.
    pub fn succeeded(&self) -> bool {
        !matches!(self.status.as_deref(), Some("0x0") | Some("0x00"))
    }

    pub fn contract_address(&self) -> Option<Address> {
        self.contract_address.as_deref().and_then(|a| a.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip_display() {
        let addr: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(
            addr.to_string(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
        assert!("0x1234".parse::<Address>().is_err());
        assert!("not-hex".parse::<Address>().is_err());
    }

    #[test]
    fn test_run_id_overflow() {
        assert_eq!(RunId::try_from(U256::from(42u64)).unwrap(), RunId(42));
        assert!(RunId::try_from(U256::from(u64::MAX) + U256::one()).is_err());
    }

    #[test]
    fn test_receipt_from_rpc_json() {
        let json = serde_json::json!({
            "transactionHash": "0xabc",
            "blockNumber": "0x10",
            "status": "0x1",
            "contractAddress": null,
            "gasUsed": "0x5208",
            "logs": [{
                "address": "0x1111111111111111111111111111111111111111",
                "topics": ["0x01"],
                "data": "0x"
            }]
        });
        let receipt: TransactionReceipt = serde_json::from_value(json).unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.logs.len(), 1);
        assert!(receipt.contract_address().is_none());

        let reverted = TransactionReceipt {
            status: Some("0x0".to_string()),
            ..Default::default()
        };
        assert!(!reverted.succeeded());
    }
}
