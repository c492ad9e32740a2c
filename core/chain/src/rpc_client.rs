use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::errors::ChainError;
use crate::types::{Address, TransactionReceipt};

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Transaction submitted through `eth_sendTransaction`; the node signs it
/// with the unlocked `from` account.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Option<Address>,
    pub data: Vec<u8>,
    pub gas_limit: u64,
    pub gas_price: u64,
}

/// RPC client for the agent chain
pub struct RpcClient {
    url: String,
    client: Client,
    request_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            url: url.to_string(),
            client,
            request_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        debug!(method, id, "rpc call");

        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let response = self.client.post(&self.url).json(&request).send().await?;

        let rpc_response: RpcResponse = response.json().await?;

        if let Some(error) = rpc_response.error {
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(rpc_response.result)
    }

    /// Read-only call against the latest block
    pub async fn eth_call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let params = json!([{
            "to": to.to_string(),
            "data": format!("0x{}", hex::encode(data)),
        }, "latest"]);

        let result = self.call("eth_call", params).await?;
        let data_hex = result
            .as_str()
            .ok_or_else(|| ChainError::InvalidResponse("eth_call result is not a string".into()))?;

        Ok(hex::decode(data_hex.trim_start_matches("0x"))?)
    }

    /// Submit a transaction and return its hash
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String, ChainError> {
        let mut tx_object = json!({
            "from": tx.from.to_string(),
            "data": format!("0x{}", hex::encode(&tx.data)),
            "gas": format!("0x{:x}", tx.gas_limit),
            "gasPrice": format!("0x{:x}", tx.gas_price),
        });

        if let Some(to) = &tx.to {
            tx_object["to"] = json!(to.to_string());
        }

        let result = self.call("eth_sendTransaction", json!([tx_object])).await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChainError::InvalidResponse("Invalid transaction hash response".into()))
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        let result = self
            .call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;

        if result.is_null() {
            Ok(None)
        } else {
            Ok(Some(serde_json::from_value(result)?))
        }
    }

    /// Poll for the receipt of a submitted transaction
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        poll_interval: Duration,
        attempts: u32,
    ) -> Result<TransactionReceipt, ChainError> {
        for attempt in 0..attempts {
            if let Some(receipt) = self.get_transaction_receipt(tx_hash).await? {
                debug!(tx_hash, attempt, "receipt found");
                return Ok(receipt);
            }
            tokio::time::sleep(poll_interval).await;
        }

        Err(ChainError::ReceiptTimeout {
            tx_hash: tx_hash.to_string(),
            attempts,
        })
    }

    pub async fn get_chain_id(&self) -> Result<u64, ChainError> {
        let result = self.call("eth_chainId", json!([])).await?;

        let chain_hex = result
            .as_str()
            .ok_or_else(|| ChainError::InvalidResponse("Invalid chain ID response".into()))?;

        u64::from_str_radix(chain_hex.trim_start_matches("0x"), 16)
            .map_err(|e| ChainError::InvalidResponse(format!("Failed to parse chain ID: {}", e)))
    }
}
