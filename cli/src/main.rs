//agentverse/cli/src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod config;
mod utils;

use commands::{agent, contract, kb, run};

#[derive(Parser)]
#[command(
    name = "agentverse",
    version,
    about = "AgentVerse CLI - chat with and deploy on-chain AI agents",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, env = "AGENTVERSE_CONFIG")]
    config: Option<PathBuf>,

    /// RPC endpoint
    #[arg(short, long, global = true, env = "AGENTVERSE_RPC")]
    rpc: Option<String>,

    /// Pinning service JWT
    #[arg(long, global = true, env = "AGENTVERSE_PINATA_JWT", hide_env_values = true)]
    pinata_jwt: Option<String>,

    /// Verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Run(run::RunCommands),

    /// Agent NFT deployment
    #[command(subcommand)]
    Agent(agent::AgentCommands),

    /// Agent contract deployment
    #[command(subcommand)]
    Contract(contract::ContractCommands),

    /// Knowledge base management
    #[command(subcommand)]
    Kb(kb::KbCommands),

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(false)
        .init();

    let mut config = config::Config::load(cli.config.as_deref(), cli.rpc.as_deref())?;
    if let Some(jwt) = cli.pinata_jwt {
        config.pinata_jwt = Some(jwt);
    }

    match cli.command {
        Commands::Run(cmd) => run::execute(cmd, &config).await?,
        Commands::Agent(cmd) => agent::execute(cmd, &config).await?,
        Commands::Contract(cmd) => contract::execute(cmd, &config).await?,
        Commands::Kb(cmd) => kb::execute(cmd, &config).await?,
        Commands::Init { force } => {
            let path = config::Config::init(cli.config.as_deref(), force)?;
            println!("{}", "✓ Configuration initialized successfully".green());
            println!("Config: {}", path.display());
        }
    }

    Ok(())
}
