//! Contract Gateway
//!
//! Read/write interface to the on-chain agent contract. The synchronizer
//! depends only on [`ContractGateway`]; [`RpcContractGateway`] implements it
//! over Ethereum JSON-RPC.

use async_trait::async_trait;
use primitive_types::U256;
use std::time::Duration;
use tracing::{debug, info};

use crate::abi::{self, Function, ParamType, Token};
use crate::errors::ChainError;
use crate::events;
use crate::rpc_client::{RpcClient, TransactionRequest};
use crate::types::{Address, RunId, RunInfo, TransactionReceipt};

pub const RUN_AGENT: &str = "runAgent(uint256,string,uint8)";
pub const MESSAGE_CONTENTS: &str = "getMessageHistoryContents(uint256)";
pub const MESSAGE_ROLES: &str = "getMessageHistoryRoles(uint256)";
pub const IS_RUN_FINISHED: &str = "isRunFinished(uint256)";
pub const AGENT_RUNS: &str = "agentRuns(uint256)";
pub const DEFAULT_FOLLOW_UP: &str = "addMessage(string,uint256)";

/// Identity that authorizes write calls.
///
/// Transactions are sent with `eth_sendTransaction`, so the node (or the
/// wallet behind it) holds the key for this account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signer {
    pub address: Address,
}

impl Signer {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

#[async_trait]
pub trait ContractGateway: Send + Sync {
    async fn submit_run_creation(
        &self,
        signer: &Signer,
        query: &str,
        max_iterations: u8,
    ) -> Result<TransactionReceipt, ChainError>;

    async fn submit_follow_up(
        &self,
        signer: &Signer,
        run_id: RunId,
        content: &str,
    ) -> Result<TransactionReceipt, ChainError>;

    async fn get_message_contents(&self, run_id: RunId) -> Result<Vec<String>, ChainError>;

    async fn get_message_roles(&self, run_id: RunId) -> Result<Vec<String>, ChainError>;

    async fn is_run_finished(&self, run_id: RunId) -> Result<bool, ChainError>;

    async fn get_run(&self, run_id: RunId) -> Result<RunInfo, ChainError>;

    /// Run identifiers announced by `AgentRunCreated` logs in `receipt`
    fn run_created_ids(&self, receipt: &TransactionReceipt) -> Vec<RunId> {
        events::run_created_ids(receipt, None)
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Agent manager contract
    pub contract_address: Address,
    /// Agent NFT the runs are started on
    pub agent_token_id: u64,
    pub gas_limit: u64,
    pub gas_price: u64,
    /// Contract method used for client follow-ups
    pub follow_up_signature: String,
    pub receipt_poll_interval: Duration,
    pub receipt_poll_attempts: u32,
}

impl GatewayConfig {
    pub fn new(contract_address: Address, agent_token_id: u64) -> Self {
        Self {
            contract_address,
            agent_token_id,
            gas_limit: 3_000_000,
            gas_price: 1_000_000_000, // 1 gwei
            follow_up_signature: DEFAULT_FOLLOW_UP.to_string(),
            receipt_poll_interval: Duration::from_secs(2),
            receipt_poll_attempts: 30,
        }
    }
}

/// Argument order of the follow-up method, resolved from its signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FollowUpArg {
    Content,
    RunId,
}

pub struct RpcContractGateway {
    rpc: RpcClient,
    config: GatewayConfig,
    run_agent: Function,
    message_contents: Function,
    message_roles: Function,
    is_run_finished: Function,
    agent_runs: Function,
    follow_up: Function,
    follow_up_args: Vec<FollowUpArg>,
}

impl RpcContractGateway {
    pub fn new(rpc: RpcClient, config: GatewayConfig) -> Result<Self, ChainError> {
        let follow_up = Function::parse(&config.follow_up_signature)?;
        let follow_up_args = follow_up_layout(&follow_up)?;

        Ok(Self {
            rpc,
            run_agent: Function::parse(RUN_AGENT)?,
            message_contents: Function::parse(MESSAGE_CONTENTS)?,
            message_roles: Function::parse(MESSAGE_ROLES)?,
            is_run_finished: Function::parse(IS_RUN_FINISHED)?,
            agent_runs: Function::parse(AGENT_RUNS)?,
            follow_up,
            follow_up_args,
            config,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Send a transaction and wait until it is mined successfully
    pub(crate) async fn transact(
        &self,
        signer: &Signer,
        to: Option<Address>,
        data: Vec<u8>,
    ) -> Result<TransactionReceipt, ChainError> {
        let tx = TransactionRequest {
            from: signer.address,
            to,
            data,
            gas_limit: self.config.gas_limit,
            gas_price: self.config.gas_price,
        };

        let tx_hash = self.rpc.send_transaction(&tx).await?;
        info!(tx_hash = %tx_hash, from = %signer.address, "transaction submitted");

        let receipt = self
            .rpc
            .wait_for_receipt(
                &tx_hash,
                self.config.receipt_poll_interval,
                self.config.receipt_poll_attempts,
            )
            .await?;

        if !receipt.succeeded() {
            return Err(ChainError::Reverted(tx_hash));
        }
        Ok(receipt)
    }

    async fn call_run_method(
        &self,
        function: &Function,
        outputs: &[ParamType],
        run_id: RunId,
    ) -> Result<Vec<Token>, ChainError> {
        let data = function.encode_input(&[Token::Uint(run_id.as_u256())])?;
        let output = self.rpc.eth_call(&self.config.contract_address, &data).await?;
        debug!(method = %function.name, run_id = %run_id, bytes = output.len(), "eth_call returned");
        abi::decode(outputs, &output)
    }

    async fn call_string_array(
        &self,
        function: &Function,
        run_id: RunId,
    ) -> Result<Vec<String>, ChainError> {
        let tokens = self
            .call_run_method(
                function,
                &[ParamType::Array(Box::new(ParamType::String))],
                run_id,
            )
            .await?;

        tokens
            .into_iter()
            .next()
            .and_then(Token::into_array)
            .ok_or_else(|| ChainError::Abi(format!("{} did not return string[]", function.name)))?
            .into_iter()
            .map(|token| {
                token
                    .into_string()
                    .ok_or_else(|| ChainError::Abi("expected string element".into()))
            })
            .collect()
    }
}

fn follow_up_layout(function: &Function) -> Result<Vec<FollowUpArg>, ChainError> {
    let layout: Vec<FollowUpArg> = function
        .inputs
        .iter()
        .map(|ty| match ty {
            ParamType::String => Ok(FollowUpArg::Content),
            ParamType::Uint(_) => Ok(FollowUpArg::RunId),
            other => Err(ChainError::Abi(format!(
                "follow-up method {} has unsupported parameter {}",
                function, other
            ))),
        })
        .collect::<Result<_, _>>()?;

    let has = |arg: FollowUpArg| layout.iter().filter(|a| **a == arg).count() == 1;
    if layout.len() != 2 || !has(FollowUpArg::Content) || !has(FollowUpArg::RunId) {
        return Err(ChainError::Abi(format!(
            "follow-up method {} must take exactly one string and one uint",
            function
        )));
    }
    Ok(layout)
}

#[async_trait]
impl ContractGateway for RpcContractGateway {
    async fn submit_run_creation(
        &self,
        signer: &Signer,
        query: &str,
        max_iterations: u8,
    ) -> Result<TransactionReceipt, ChainError> {
        let data = self.run_agent.encode_input(&[
            Token::Uint(U256::from(self.config.agent_token_id)),
            Token::String(query.to_string()),
            Token::Uint(U256::from(max_iterations)),
        ])?;
        self.transact(signer, Some(self.config.contract_address), data)
            .await
    }

    async fn submit_follow_up(
        &self,
        signer: &Signer,
        run_id: RunId,
        content: &str,
    ) -> Result<TransactionReceipt, ChainError> {
        let args: Vec<Token> = self
            .follow_up_args
            .iter()
            .map(|arg| match arg {
                FollowUpArg::Content => Token::String(content.to_string()),
                FollowUpArg::RunId => Token::Uint(run_id.as_u256()),
            })
            .collect();
        let data = self.follow_up.encode_input(&args)?;
        self.transact(signer, Some(self.config.contract_address), data)
            .await
    }

    async fn get_message_contents(&self, run_id: RunId) -> Result<Vec<String>, ChainError> {
        self.call_string_array(&self.message_contents, run_id).await
    }

    async fn get_message_roles(&self, run_id: RunId) -> Result<Vec<String>, ChainError> {
        self.call_string_array(&self.message_roles, run_id).await
    }

    async fn is_run_finished(&self, run_id: RunId) -> Result<bool, ChainError> {
        self.call_run_method(&self.is_run_finished, &[ParamType::Bool], run_id)
            .await?
            .into_iter()
            .next()
            .and_then(Token::into_bool)
            .ok_or_else(|| ChainError::Abi("isRunFinished did not return bool".into()))
    }

    async fn get_run(&self, run_id: RunId) -> Result<RunInfo, ChainError> {
        let outputs = [
            ParamType::Address,
            ParamType::Uint(256),
            ParamType::Uint(8),
            ParamType::Bool,
            ParamType::String,
        ];
        let tokens = self
            .call_run_method(&self.agent_runs, &outputs, run_id)
            .await?;
        run_info_from_tokens(tokens)
    }
}

fn run_info_from_tokens(tokens: Vec<Token>) -> Result<RunInfo, ChainError> {
    let malformed = || ChainError::Abi("malformed agentRuns output".into());
    let mut tokens = tokens.into_iter();

    let owner = tokens.next().and_then(Token::into_address).ok_or_else(malformed)?;
    let responses_count = tokens.next().and_then(Token::into_uint).ok_or_else(malformed)?;
    let max_iterations = tokens.next().and_then(Token::into_uint).ok_or_else(malformed)?;
    let is_finished = tokens.next().and_then(Token::into_bool).ok_or_else(malformed)?;
    let knowledge_base = tokens.next().and_then(Token::into_string).ok_or_else(malformed)?;

    if responses_count > U256::from(u64::MAX) || max_iterations > U256::from(u8::MAX) {
        return Err(malformed());
    }

    Ok(RunInfo {
        owner,
        responses_count: responses_count.as_u64(),
        max_iterations: max_iterations.low_u32() as u8,
        is_finished,
        knowledge_base,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_up_layout_accepts_either_order() {
        let layout = follow_up_layout(&Function::parse("addMessage(string,uint256)").unwrap()).unwrap();
        assert_eq!(layout, vec![FollowUpArg::Content, FollowUpArg::RunId]);

        let layout =
            follow_up_layout(&Function::parse("respond(uint256,string)").unwrap()).unwrap();
        assert_eq!(layout, vec![FollowUpArg::RunId, FollowUpArg::Content]);
    }

    #[test]
    fn test_follow_up_layout_rejects_other_shapes() {
        for sig in [
            "addMessage(string)",
            "addMessage(string,string)",
            "addMessage(string,uint256,bool)",
            "addMessage(address,uint256)",
        ] {
            assert!(follow_up_layout(&Function::parse(sig).unwrap()).is_err(), "{}", sig);
        }
    }

    #[test]
    fn test_gateway_rejects_bad_follow_up_signature() {
        let mut config = GatewayConfig::new(Address([0x22; 20]), 4);
        config.follow_up_signature = "addMessage(bool)".to_string();
        let rpc = RpcClient::new("http://localhost:8545", Duration::from_secs(5));
        assert!(RpcContractGateway::new(rpc, config).is_err());
    }

    #[test]
    fn test_run_info_decoding() {
        let tokens = abi::decode(
            &[
                ParamType::Address,
                ParamType::Uint(256),
                ParamType::Uint(8),
                ParamType::Bool,
                ParamType::String,
            ],
            &abi::encode(&[
                Token::Address(Address([0x11; 20])),
                Token::Uint(U256::from(3u64)),
                Token::Uint(U256::from(5u64)),
                Token::Bool(true),
                Token::String("bafykb".to_string()),
            ]),
        )
        .unwrap();

        let info = run_info_from_tokens(tokens).unwrap();
        assert_eq!(info.owner, Address([0x11; 20]));
        assert_eq!(info.responses_count, 3);
        assert_eq!(info.max_iterations, 5);
        assert!(info.is_finished);
        assert_eq!(info.knowledge_base, "bafykb");
    }
}
