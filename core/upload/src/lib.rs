// agentverse/core/upload/src/lib.rs

//! Upload Gateway: knowledge-base ingestion, metadata pinning and the agent
//! NFT metadata document.

pub mod errors;
pub mod metadata;
pub mod pinning;
pub mod rag;

pub use errors::UploadError;
pub use metadata::{AgentMetadata, Attribute};
pub use pinning::{token_uri, PinningClient, DEFAULT_PINNING_ENDPOINT};
pub use rag::{ChunkParams, IngestResult, RagClient};
