//! Agent NFT metadata

use agentverse_chain::{AgentDeployment, ModelProvider};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: Value,
}

impl Attribute {
    pub fn new(trait_type: &str, value: impl Into<Value>) -> Self {
        Self {
            trait_type: trait_type.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetadata {
    pub name: String,
    pub description: String,
    pub attributes: Vec<Attribute>,
    /// Settings of the selected provider; the other one is `{}`
    pub openai_config: Value,
    pub groq_config: Value,
}

impl AgentMetadata {
    pub fn from_deployment(name: &str, description: &str, deployment: &AgentDeployment) -> Result<Self> {
        let (settings, openai_config, groq_config) = match deployment.provider {
            ModelProvider::OpenAi => (
                &deployment.openai,
                serde_json::to_value(&deployment.openai)?,
                json!({}),
            ),
            ModelProvider::Groq => (
                &deployment.groq,
                json!({}),
                serde_json::to_value(&deployment.groq)?,
            ),
        };

        let tools: Vec<&str> = deployment.tools.iter().map(|t| t.name()).collect();
        let attributes = vec![
            Attribute::new("Model Type", deployment.provider.as_str()),
            Attribute::new("Model", settings.model.as_str()),
            Attribute::new("Frequency Penalty", settings.frequency_penalty),
            Attribute::new("Logit Bias", settings.logit_bias.as_str()),
            Attribute::new("Max Tokens", settings.max_tokens),
            Attribute::new("Presence Penalty", settings.presence_penalty),
            Attribute::new("Response Format", settings.response_format.as_str()),
            Attribute::new("Seed", settings.seed),
            Attribute::new("Stop", settings.stop.as_str()),
            Attribute::new("Temperature", settings.temperature),
            Attribute::new("Top P", settings.top_p),
            Attribute::new("Tools", tools.join(", ")),
            Attribute::new("Tool Choice", deployment.tool_choice()),
            Attribute::new("User", settings.user.as_str()),
            Attribute::new("Knowledge Base", deployment.knowledge_base.as_str()),
        ];

        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            attributes,
            openai_config,
            groq_config,
        })
    }

    pub fn attribute(&self, trait_type: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|a| a.trait_type == trait_type)
            .map(|a| &a.value)
    }

    /// Inline token URI for nodes without a pinning service
    pub fn to_data_uri(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(format!("data:application/json;base64,{}", BASE64.encode(json)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentverse_chain::{AgentTool, LlmSettings};

    #[test]
    fn test_unused_provider_is_empty_object() {
        let deployment = AgentDeployment {
            provider: ModelProvider::Groq,
            groq: LlmSettings {
                model: "llama3-70b-8192".to_string(),
                ..LlmSettings::groq_default()
            },
            ..Default::default()
        };

        let metadata = AgentMetadata::from_deployment("Agent", "AI Agent", &deployment).unwrap();
        assert_eq!(metadata.openai_config, json!({}));
        assert_eq!(metadata.groq_config["model"], "llama3-70b-8192");
        assert_eq!(metadata.attribute("Model Type"), Some(&json!("groq")));
        assert_eq!(metadata.attribute("Tool Choice"), Some(&json!("none")));
    }

    #[test]
    fn test_attributes_reflect_selected_tools() {
        let deployment = AgentDeployment {
            tools: vec![AgentTool::WebSearch, AgentTool::CodeInterpreter],
            knowledge_base: "bafyindex".to_string(),
            ..Default::default()
        };

        let metadata = AgentMetadata::from_deployment("Agent", "AI Agent", &deployment).unwrap();
        assert_eq!(
            metadata.attribute("Tools"),
            Some(&json!("web_search, code_interpreter"))
        );
        assert_eq!(metadata.attribute("Tool Choice"), Some(&json!("auto")));
        assert_eq!(metadata.attribute("Max Tokens"), Some(&json!(1000)));
        assert_eq!(metadata.attribute("Knowledge Base"), Some(&json!("bafyindex")));
        assert_eq!(metadata.openai_config["model"], "gpt-4-turbo-preview");
        assert_eq!(metadata.groq_config, json!({}));
    }

    #[test]
    fn test_data_uri_decodes_to_metadata() {
        let metadata =
            AgentMetadata::from_deployment("Agent", "AI Agent", &AgentDeployment::default()).unwrap();
        let uri = metadata.to_data_uri().unwrap();

        let encoded = uri
            .strip_prefix("data:application/json;base64,")
            .unwrap();
        let decoded: Value = serde_json::from_slice(&BASE64.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded["name"], "Agent");
        assert!(decoded.get("openaiConfig").is_some());
        assert!(decoded.get("groqConfig").is_some());
    }
}
