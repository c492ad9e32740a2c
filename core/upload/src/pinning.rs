//! Pins JSON documents through a Pinata-compatible pinning API

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{check_status, Result, UploadError};

pub const DEFAULT_PINNING_ENDPOINT: &str = "https://api.pinata.cloud/pinning/pinFileToIPFS";

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// `ipfs://` URI for a pinned CID
pub fn token_uri(cid: &str) -> String {
    format!("ipfs://{}", cid)
}

pub struct PinningClient {
    endpoint: String,
    jwt: String,
    client: Client,
}

impl PinningClient {
    pub fn new(endpoint: &str, jwt: &str, timeout: Duration) -> Result<Self> {
        if jwt.trim().is_empty() {
            return Err(UploadError::InvalidParams(
                "pinning service JWT is not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self {
            endpoint: endpoint.to_string(),
            jwt: jwt.to_string(),
            client,
        })
    }

    /// Serialize `value` and pin it as a JSON file; returns the CID
    pub async fn pin_json<T: Serialize>(&self, value: &T, file_name: &str) -> Result<String> {
        let body = serde_json::to_vec(value)?;
        debug!(file = file_name, bytes = body.len(), "pinning JSON document");

        let part = Part::bytes(body)
            .file_name(file_name.to_string())
            .mime_str("application/json")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.jwt)
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;

        let pinned: PinResponse = response
            .json()
            .await
            .map_err(|e| UploadError::InvalidResponse(e.to_string()))?;

        info!(cid = %pinned.ipfs_hash, "document pinned");
        Ok(pinned.ipfs_hash)
    }
}
