// agentverse/core/chain/src/deployment.rs

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::abi::{self, Function, Token};
use crate::errors::ChainError;
use crate::events::{self, AGENT_DEPLOYED};
use crate::gateway::{RpcContractGateway, Signer};
use crate::types::Address;

const OPENAI_CONFIG: &str =
    "(string,int8,string,uint32,int8,string,uint256,string,uint256,uint256,string,string,string)";
const GROQ_CONFIG: &str =
    "(string,int8,string,uint32,int8,string,uint256,string,uint256,uint256,string)";

pub fn deploy_agent_signature() -> String {
    format!(
        "deployAgent({},{},bool,string,string,string)",
        OPENAI_CONFIG, GROQ_CONFIG
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    OpenAi,
    Groq,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "openai",
            ModelProvider::Groq => "groq",
        }
    }
}

impl std::str::FromStr for ModelProvider {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ModelProvider::OpenAi),
            "groq" => Ok(ModelProvider::Groq),
            other => Err(ChainError::Abi(format!("unknown model provider: {}", other))),
        }
    }
}

/// Built-in function tools an agent may be allowed to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTool {
    WebSearch,
    ImageGeneration,
    CodeInterpreter,
}

impl AgentTool {
    pub fn name(&self) -> &'static str {
        match self {
            AgentTool::WebSearch => "web_search",
            AgentTool::ImageGeneration => "image_generation",
            AgentTool::CodeInterpreter => "code_interpreter",
        }
    }

    /// OpenAI function-calling definition
    pub fn definition(&self) -> Value {
        let (description, param, param_description) = match self {
            AgentTool::WebSearch => ("Search the internet", "query", "Search query"),
            AgentTool::ImageGeneration => (
                "Generates an image using Dalle-2",
                "prompt",
                "Dalle-2 prompt to generate an image",
            ),
            AgentTool::CodeInterpreter => ("Executes Python code", "code", "Python code to execute"),
        };
        json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": description,
                "parameters": {
                    "type": "object",
                    "properties": {
                        param: { "type": "string", "description": param_description }
                    },
                    "required": [param]
                }
            }
        })
    }
}

impl std::str::FromStr for AgentTool {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web_search" => Ok(AgentTool::WebSearch),
            "image_generation" => Ok(AgentTool::ImageGeneration),
            "code_interpreter" => Ok(AgentTool::CodeInterpreter),
            other => Err(ChainError::Abi(format!("unknown tool: {}", other))),
        }
    }
}

/// Tools JSON stored on-chain; empty when no tool is selected
pub fn tools_json(tools: &[AgentTool]) -> String {
    if tools.is_empty() {
        return String::new();
    }
    let definitions: Vec<Value> = tools.iter().map(AgentTool::definition).collect();
    Value::Array(definitions).to_string()
}

/// Sampling settings as entered by the user (floats, unscaled)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSettings {
    pub model: String,
    pub frequency_penalty: f32,
    pub logit_bias: String,
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub response_format: String,
    pub seed: i64,
    pub stop: String,
    pub temperature: f32,
    pub top_p: f32,
    pub user: String,
}

impl LlmSettings {
    pub fn openai_default() -> Self {
        Self {
            model: "gpt-4-turbo-preview".to_string(),
            ..Self::groq_default()
        }
    }

    pub fn groq_default() -> Self {
        Self {
            model: String::new(),
            frequency_penalty: 0.0,
            logit_bias: String::new(),
            max_tokens: 1000,
            presence_penalty: 0.0,
            response_format: "{\"type\":\"text\"}".to_string(),
            seed: 0,
            stop: String::new(),
            temperature: 0.7,
            top_p: 1.0,
            user: String::new(),
        }
    }

    /// Contract-side integer representation of the settings
    pub fn scaled(&self) -> ScaledSettings {
        ScaledSettings {
            frequency_penalty: scale_penalty(self.frequency_penalty),
            presence_penalty: scale_penalty(self.presence_penalty),
            seed: self.seed.max(0) as u64,
            temperature: (self.temperature.max(0.0) * 10.0).round() as u64,
            top_p: (self.top_p.max(0.0) * 100.0).round() as u64,
        }
    }

    fn common_tokens(&self) -> Vec<Token> {
        let scaled = self.scaled();
        vec![
            Token::String(self.model.clone()),
            Token::Int(scaled.frequency_penalty as i128),
            Token::String(self.logit_bias.clone()),
            Token::Uint(U256::from(self.max_tokens)),
            Token::Int(scaled.presence_penalty as i128),
            Token::String(self.response_format.clone()),
            Token::Uint(U256::from(scaled.seed)),
            Token::String(self.stop.clone()),
            Token::Uint(U256::from(scaled.temperature)),
            Token::Uint(U256::from(scaled.top_p)),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledSettings {
    pub frequency_penalty: i8,
    pub presence_penalty: i8,
    pub seed: u64,
    pub temperature: u64,
    pub top_p: u64,
}

fn scale_penalty(value: f32) -> i8 {
    (value * 10.0).round().clamp(i8::MIN as f32, i8::MAX as f32) as i8
}

/// Everything `deployAgent` needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDeployment {
    pub provider: ModelProvider,
    pub openai: LlmSettings,
    pub groq: LlmSettings,
    pub tools: Vec<AgentTool>,
    pub token_uri: String,
    pub knowledge_base: String,
}

impl Default for AgentDeployment {
    fn default() -> Self {
        Self {
            provider: ModelProvider::OpenAi,
            openai: LlmSettings::openai_default(),
            groq: LlmSettings::groq_default(),
            tools: Vec::new(),
            token_uri: String::new(),
            knowledge_base: String::new(),
        }
    }
}

impl AgentDeployment {
    pub fn tool_choice(&self) -> &'static str {
        if self.tools.is_empty() {
            "none"
        } else {
            "auto"
        }
    }

    /// Arguments of `deployAgent`, in order
    pub fn to_tokens(&self) -> Vec<Token> {
        let tools = tools_json(&self.tools);

        let mut openai = self.openai.common_tokens();
        openai.push(Token::String(tools.clone()));
        openai.push(Token::String(self.tool_choice().to_string()));
        openai.push(Token::String(self.openai.user.clone()));

        let mut groq = self.groq.common_tokens();
        groq.push(Token::String(self.groq.user.clone()));

        vec![
            Token::Tuple(openai),
            Token::Tuple(groq),
            Token::Bool(self.provider == ModelProvider::OpenAi),
            Token::String(self.token_uri.clone()),
            Token::String(self.knowledge_base.clone()),
            Token::String(tools),
        ]
    }
}

impl RpcContractGateway {
    /// Mint a new agent NFT on the manager contract; returns its token id
    pub async fn deploy_agent(
        &self,
        signer: &Signer,
        deployment: &AgentDeployment,
    ) -> Result<U256, ChainError> {
        let function = Function::parse(&deploy_agent_signature())?;
        let data = function.encode_input(&deployment.to_tokens())?;
        let receipt = self
            .transact(signer, Some(self.config().contract_address), data)
            .await?;

        let token_id = events::agent_deployed_ids(&receipt, Some(&self.config().contract_address))
            .into_iter()
            .next()
            .ok_or_else(|| ChainError::MissingEvent(AGENT_DEPLOYED.to_string()))?;

        info!(token_id = %token_id, tx_hash = %receipt.transaction_hash, "agent deployed");
        Ok(token_id)
    }

    /// Deploy an agent or manager contract whose constructor is
    /// `(address oracle, string prompt)`
    pub async fn deploy_contract(
        &self,
        signer: &Signer,
        bytecode: &[u8],
        oracle: Address,
        prompt: &str,
    ) -> Result<Address, ChainError> {
        if bytecode.is_empty() {
            return Err(ChainError::Abi("empty contract bytecode".into()));
        }
        let mut data = bytecode.to_vec();
        data.extend(abi::encode(&[
            Token::Address(oracle),
            Token::String(prompt.to_string()),
        ]));

        let receipt = self.transact(signer, None, data).await?;
        let address = receipt.contract_address().ok_or_else(|| {
            ChainError::InvalidResponse(format!(
                "receipt {} has no contract address",
                receipt.transaction_hash
            ))
        })?;

        info!(address = %address, tx_hash = %receipt.transaction_hash, "contract deployed");
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::ParamType;

    #[test]
    fn test_settings_scaling() {
        let settings = LlmSettings {
            frequency_penalty: -1.5,
            presence_penalty: 20.0,
            seed: -4,
            temperature: 0.7,
            top_p: 0.95,
            ..LlmSettings::openai_default()
        };
        let scaled = settings.scaled();
        assert_eq!(scaled.frequency_penalty, -15);
        assert_eq!(scaled.presence_penalty, 127);
        assert_eq!(scaled.seed, 0);
        assert_eq!(scaled.temperature, 7);
        assert_eq!(scaled.top_p, 95);
    }

    #[test]
    fn test_tool_choice_follows_tool_selection() {
        let mut deployment = AgentDeployment::default();
        assert_eq!(deployment.tool_choice(), "none");
        assert_eq!(tools_json(&deployment.tools), "");

        deployment.tools = vec![AgentTool::WebSearch, AgentTool::CodeInterpreter];
        assert_eq!(deployment.tool_choice(), "auto");

        let parsed: Value = serde_json::from_str(&tools_json(&deployment.tools)).unwrap();
        let names: Vec<&str> = parsed
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["function"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["web_search", "code_interpreter"]);
        assert_eq!(parsed[1]["function"]["parameters"]["required"][0], "code");
    }

    #[test]
    fn test_deploy_agent_arguments_match_signature() {
        let function = Function::parse(&deploy_agent_signature()).unwrap();
        let ParamType::Tuple(openai) = &function.inputs[0] else {
            panic!("expected tuple");
        };
        let ParamType::Tuple(groq) = &function.inputs[1] else {
            panic!("expected tuple");
        };
        assert_eq!(openai.len(), 13);
        assert_eq!(groq.len(), 11);

        let deployment = AgentDeployment {
            provider: ModelProvider::Groq,
            tools: vec![AgentTool::ImageGeneration],
            token_uri: "ipfs://bafy".to_string(),
            ..Default::default()
        };
        let data = function.encode_input(&deployment.to_tokens()).unwrap();
        assert_eq!(&data[..4], &function.selector());

        let decoded = abi::decode(&function.inputs, &data[4..]).unwrap();
        assert_eq!(decoded[2], Token::Bool(false));
        assert_eq!(decoded[3], Token::String("ipfs://bafy".to_string()));
    }

    #[test]
    fn test_provider_and_tool_parsing() {
        assert_eq!("OpenAI".parse::<ModelProvider>().unwrap(), ModelProvider::OpenAi);
        assert_eq!("groq".parse::<ModelProvider>().unwrap(), ModelProvider::Groq);
        assert!("claude".parse::<ModelProvider>().is_err());
        assert_eq!(
            "image_generation".parse::<AgentTool>().unwrap(),
            AgentTool::ImageGeneration
        );
    }
}
