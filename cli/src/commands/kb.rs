use agentverse_upload::{ChunkParams, RagClient};
use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;

#[derive(Subcommand)]
pub enum KbCommands {
    /// Chunk, index and store a document as an agent knowledge base
    Upload {
        file: PathBuf,

        #[arg(long, default_value_t = agentverse_upload::rag::DEFAULT_CHUNK_SIZE)]
        chunk_size: u32,

        #[arg(long, default_value_t = agentverse_upload::rag::DEFAULT_CHUNK_OVERLAP)]
        chunk_overlap: u32,
    },
}

pub async fn execute(cmd: KbCommands, config: &Config) -> Result<()> {
    match cmd {
        KbCommands::Upload {
            file,
            chunk_size,
            chunk_overlap,
        } => {
            let endpoint = config
                .rag_endpoint
                .as_deref()
                .context("No rag_endpoint configured")?;
            let client = RagClient::new(endpoint, Duration::from_secs(config.request_timeout_secs));

            println!("{}", format!("Uploading {:?}...", file).cyan());
            let result = client
                .ingest_file(
                    &file,
                    ChunkParams {
                        chunk_size,
                        chunk_overlap,
                    },
                )
                .await
                .context("Knowledge base upload failed")?;

            println!("{}", "✓ Knowledge base created".green().bold());
            println!("CID:       {}", result.cid);
            println!("Index CID: {}", result.index_cid.cyan().bold());
            println!("Documents: {}", result.document_count);
        }
    }
    Ok(())
}
