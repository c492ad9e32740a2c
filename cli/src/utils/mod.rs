pub mod display;

use agentverse_chain::{Address, GatewayConfig, RpcClient, RpcContractGateway, Signer};
use agentverse_sync::{RunSynchronizer, SyncConfig};
use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::Config;

pub type Synchronizer = RunSynchronizer<RpcContractGateway>;

pub fn signer(config: &Config, account: Option<String>) -> Result<Signer> {
    let account = account
        .or(config.default_account.clone())
        .context("No account specified and no default account configured")?;
    let address: Address = account
        .parse()
        .with_context(|| format!("Invalid account address {}", account))?;
    Ok(Signer::new(address))
}

fn contract_address(config: &Config) -> Result<Address> {
    let address = config
        .contract_address
        .as_deref()
        .context("No contract_address configured; run `agentverse init` and edit the config")?;
    address
        .parse()
        .with_context(|| format!("Invalid contract address {}", address))
}

fn gateway_with(config: &Config, contract: Address) -> Result<RpcContractGateway> {
    let rpc = RpcClient::new(
        &config.rpc_endpoint,
        Duration::from_secs(config.request_timeout_secs),
    );

    let mut gateway_config = GatewayConfig::new(contract, config.agent_token_id);
    gateway_config.gas_limit = config.gas_limit;
    gateway_config.gas_price = config.gas_price;
    gateway_config.follow_up_signature = config.follow_up_signature.clone();
    gateway_config.receipt_poll_interval = Duration::from_millis(config.receipt_poll_interval_ms);
    gateway_config.receipt_poll_attempts = config.receipt_poll_attempts;

    RpcContractGateway::new(rpc, gateway_config).context("Failed to configure contract gateway")
}

pub fn gateway(config: &Config) -> Result<RpcContractGateway> {
    gateway_with(config, contract_address(config)?)
}

/// Gateway for contract creation, where no target contract is needed
pub fn deploy_gateway(config: &Config) -> Result<RpcContractGateway> {
    let contract = match config.contract_address.as_deref() {
        Some(_) => contract_address(config)?,
        None => Address::default(),
    };
    gateway_with(config, contract)
}

pub fn synchronizer(config: &Config) -> Result<Synchronizer> {
    let sync_config = SyncConfig {
        poll_interval: Duration::from_millis(config.poll_interval_ms),
    };
    Ok(RunSynchronizer::new(Arc::new(gateway(config)?), sync_config))
}

/// Warn when the node is on a different chain than the config expects
pub async fn check_chain(gateway: &RpcContractGateway, config: &Config) -> Result<()> {
    let chain_id = gateway
        .rpc()
        .get_chain_id()
        .await
        .context("Failed to connect to RPC endpoint")?;
    println!("Network: chain id {}", chain_id.to_string().cyan());
    if chain_id != config.chain_id {
        warn!(expected = config.chain_id, actual = chain_id, "chain id mismatch");
        println!(
            "{}",
            format!(
                "⚠ Node reports chain id {} but config expects {}",
                chain_id, config.chain_id
            )
            .yellow()
        );
    }
    Ok(())
}

/// Token cancelled on Ctrl-C
pub fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}
