use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Unexpected RPC response: {0}")]
    InvalidResponse(String),

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("Transaction receipt for {tx_hash} not found after {attempts} attempts")]
    ReceiptTimeout { tx_hash: String, attempts: u32 },

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Event {0} not found in transaction receipt")]
    MissingEvent(String),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        ChainError::Transport(err.to_string())
    }
}
