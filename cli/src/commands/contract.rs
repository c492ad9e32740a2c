use agentverse_chain::Address;
use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::utils;

#[derive(Subcommand)]
pub enum ContractCommands {
    /// Deploy an agent contract with an `(address oracle, string prompt)` constructor
    Deploy {
        /// Path to the hex-encoded contract bytecode
        bytecode: PathBuf,

        /// Oracle contract address
        #[arg(short, long)]
        oracle: String,

        /// System prompt passed to the constructor
        #[arg(short, long, default_value = "")]
        prompt: String,

        /// Account to deploy from
        #[arg(short, long)]
        account: Option<String>,
    },
}

pub async fn execute(cmd: ContractCommands, config: &Config) -> Result<()> {
    match cmd {
        ContractCommands::Deploy {
            bytecode,
            oracle,
            prompt,
            account,
        } => deploy_contract(config, &bytecode, &oracle, &prompt, account).await,
    }
}

fn read_bytecode(path: &Path) -> Result<Vec<u8>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read contract file {:?}", path))?;
    let trimmed = content.trim();
    hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .with_context(|| format!("Contract file {:?} is not hex bytecode", path))
}

async fn deploy_contract(
    config: &Config,
    bytecode_path: &Path,
    oracle: &str,
    prompt: &str,
    account: Option<String>,
) -> Result<()> {
    println!("{}", "Deploying contract...".cyan());

    let bytecode = read_bytecode(bytecode_path)?;
    let oracle: Address = oracle
        .parse()
        .with_context(|| format!("Invalid oracle address {}", oracle))?;
    let signer = utils::signer(config, account)?;

    let gateway = utils::deploy_gateway(config)?;
    utils::check_chain(&gateway, config).await?;

    println!("Waiting for confirmation...");
    let address = gateway
        .deploy_contract(&signer, &bytecode, oracle, prompt)
        .await
        .context("Contract deployment failed")?;

    println!("{}", "✓ Contract deployed successfully".green().bold());
    println!("Contract Address: {}", address.to_string().cyan().bold());
    Ok(())
}
