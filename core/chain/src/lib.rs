// agentverse/core/chain/src/lib.rs

//! Contract Gateway for the AgentVerse contracts: JSON-RPC transport, ABI
//! codec, receipt event extraction, and agent / contract deployment.

pub mod abi;
pub mod deployment;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod rpc_client;
pub mod types;

pub use deployment::{AgentDeployment, AgentTool, LlmSettings, ModelProvider};
pub use errors::ChainError;
pub use gateway::{ContractGateway, GatewayConfig, RpcContractGateway, Signer};
pub use rpc_client::RpcClient;
pub use types::{Address, Log, RunId, RunInfo, TransactionReceipt};
