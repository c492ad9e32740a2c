use agentverse_chain::{AgentDeployment, AgentTool, LlmSettings, ModelProvider};
use agentverse_upload::{token_uri, AgentMetadata, PinningClient};
use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::time::Duration;

use crate::config::Config;
use crate::utils;

#[derive(Subcommand)]
pub enum AgentCommands {
    /// Publish agent metadata and mint a new agent NFT
    Deploy {
        /// Model provider (openai or groq)
        #[arg(short, long, default_value = "openai")]
        provider: String,

        /// Model name; defaults to the provider's default model
        #[arg(short, long)]
        model: Option<String>,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,

        #[arg(long)]
        top_p: Option<f32>,

        #[arg(long, allow_hyphen_values = true)]
        frequency_penalty: Option<f32>,

        #[arg(long, allow_hyphen_values = true)]
        presence_penalty: Option<f32>,

        #[arg(long)]
        seed: Option<i64>,

        /// Built-in tools (web_search, image_generation, code_interpreter)
        #[arg(short, long, value_delimiter = ',')]
        tools: Vec<String>,

        /// Knowledge base index CID (see `agentverse kb upload`)
        #[arg(short, long, default_value = "")]
        knowledge_base: String,

        #[arg(long, default_value = "Agent")]
        name: String,

        #[arg(long, default_value = "AI Agent")]
        description: String,

        /// Embed metadata as a data URI instead of pinning it
        #[arg(long)]
        inline_metadata: bool,

        /// Account to deploy from
        #[arg(short, long)]
        account: Option<String>,
    },
}

pub async fn execute(cmd: AgentCommands, config: &Config) -> Result<()> {
    match cmd {
        AgentCommands::Deploy {
            provider,
            model,
            temperature,
            max_tokens,
            top_p,
            frequency_penalty,
            presence_penalty,
            seed,
            tools,
            knowledge_base,
            name,
            description,
            inline_metadata,
            account,
        } => {
            let provider: ModelProvider = provider.parse()?;
            let tools = tools
                .iter()
                .map(|t| t.trim().parse::<AgentTool>())
                .collect::<Result<Vec<_>, _>>()?;

            let mut deployment = AgentDeployment {
                provider,
                tools,
                knowledge_base,
                ..Default::default()
            };
            let settings: &mut LlmSettings = match provider {
                ModelProvider::OpenAi => &mut deployment.openai,
                ModelProvider::Groq => &mut deployment.groq,
            };
            if let Some(model) = model {
                settings.model = model;
            }
            if let Some(v) = temperature {
                settings.temperature = v;
            }
            if let Some(v) = max_tokens {
                settings.max_tokens = v;
            }
            if let Some(v) = top_p {
                settings.top_p = v;
            }
            if let Some(v) = frequency_penalty {
                settings.frequency_penalty = v;
            }
            if let Some(v) = presence_penalty {
                settings.presence_penalty = v;
            }
            if let Some(v) = seed {
                settings.seed = v;
            }
            if settings.model.is_empty() {
                anyhow::bail!("--model is required for provider {}", provider.as_str());
            }

            deploy_agent(config, deployment, &name, &description, inline_metadata, account).await
        }
    }
}

async fn deploy_agent(
    config: &Config,
    mut deployment: AgentDeployment,
    name: &str,
    description: &str,
    inline_metadata: bool,
    account: Option<String>,
) -> Result<()> {
    let signer = utils::signer(config, account)?;
    let gateway = utils::gateway(config)?;
    utils::check_chain(&gateway, config).await?;

    let metadata = AgentMetadata::from_deployment(name, description, &deployment)?;
    deployment.token_uri = if inline_metadata {
        metadata.to_data_uri()?
    } else {
        println!("{}", "Pinning agent metadata...".cyan());
        let jwt = config
            .pinata_jwt
            .as_deref()
            .context("No pinata_jwt configured; set AGENTVERSE_PINATA_JWT or use --inline-metadata")?;
        let pinning = PinningClient::new(
            &config.pinning_endpoint,
            jwt,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let cid = pinning
            .pin_json(&metadata, "metadata.json")
            .await
            .context("Failed to pin agent metadata")?;
        println!("{}", format!("✓ Metadata pinned: {}", cid).green());
        token_uri(&cid)
    };

    println!("{}", "Deploying agent...".cyan());
    let token_id = gateway
        .deploy_agent(&signer, &deployment)
        .await
        .context("Agent deployment failed")?;

    println!("{}", "✓ Agent deployed successfully".green().bold());
    println!("Token ID: {}", token_id.to_string().cyan().bold());
    println!("Tool choice: {}", deployment.tool_choice());
    Ok(())
}
