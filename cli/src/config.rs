use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc_endpoint: String,
    pub chain_id: u64,
    /// Agent manager contract
    pub contract_address: Option<String>,
    /// Agent NFT that chat runs are started on
    pub agent_token_id: u64,
    pub default_account: Option<String>,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub max_iterations: u8,
    pub poll_interval_ms: u64,
    pub receipt_poll_interval_ms: u64,
    pub receipt_poll_attempts: u32,
    pub request_timeout_secs: u64,
    /// Contract method used for follow-up messages
    pub follow_up_signature: String,
    pub rag_endpoint: Option<String>,
    pub pinning_endpoint: String,
    pub pinata_jwt: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_endpoint: "http://localhost:8545".to_string(),
            chain_id: 1337,
            contract_address: None,
            agent_token_id: 1,
            default_account: None,
            gas_price: 1_000_000_000, // 1 gwei
            gas_limit: 3_000_000,
            max_iterations: 5,
            poll_interval_ms: 2_000,
            receipt_poll_interval_ms: 2_000,
            receipt_poll_attempts: 30,
            request_timeout_secs: 30,
            follow_up_signature: agentverse_chain::gateway::DEFAULT_FOLLOW_UP.to_string(),
            rag_endpoint: None,
            pinning_endpoint: agentverse_upload::DEFAULT_PINNING_ENDPOINT.to_string(),
            pinata_jwt: None,
        }
    }
}

impl Config {
    pub fn load(config_path: Option<&Path>, rpc_override: Option<&str>) -> Result<Self> {
        let config_path = config_path
            .map(PathBuf::from)
            .or_else(Self::default_config_path)
            .context("Unable to determine config path")?;

        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {:?}", config_path))?
        } else {
            Self::default()
        };

        if let Some(rpc) = rpc_override {
            config.rpc_endpoint = rpc.to_string();
        }

        Ok(config)
    }

    pub fn save(&self, config_path: Option<&Path>) -> Result<()> {
        let config_path = config_path
            .map(PathBuf::from)
            .or_else(Self::default_config_path)
            .context("Unable to determine config path")?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;

        Ok(())
    }

    /// Write a default config; returns the path written
    pub fn init(config_path: Option<&Path>, force: bool) -> Result<PathBuf> {
        let config_path = config_path
            .map(PathBuf::from)
            .or_else(Self::default_config_path)
            .context("Unable to determine config path")?;

        if config_path.exists() && !force {
            anyhow::bail!(
                "Config already exists at {:?}. Use --force to overwrite",
                config_path
            );
        }

        Self::default().save(Some(&config_path))?;
        Ok(config_path)
    }

    fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".agentverse").join("config.json"))
    }
}
