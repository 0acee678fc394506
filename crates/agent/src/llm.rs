use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use shopmate_core::{ChatRole, TokenUsage};

#[derive(Clone, Debug, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

/// One function the model may invoke, with a JSON-schema parameter object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCatalog {
    pub functions: Vec<FunctionSpec>,
}

/// A structured invocation returned by a native function-calling provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionInvocation {
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub turns: Vec<ChatTurn>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Present only when the caller wants native function calling; providers
    /// without the capability never see it.
    pub functions: Option<FunctionCatalog>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatCompletion {
    pub text: String,
    pub invocation: Option<FunctionInvocation>,
    pub usage: TokenUsage,
}

/// Completion provider boundary. Implementations normalize whatever wire
/// protocol they speak into text plus at most one structured invocation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_id(&self) -> &str;

    /// Whether `ChatRequest::functions` will be honored; false routes the
    /// pipeline through the text-pattern calling protocol.
    fn supports_native_functions(&self) -> bool;

    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion>;
}

/// Deterministic model for the CLI and tests: replies with a fixed text and
/// never invokes functions.
pub struct ScriptedModel {
    model_id: String,
    reply: String,
}

impl ScriptedModel {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { model_id: "scripted".to_string(), reply: reply.into() }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn supports_native_functions(&self) -> bool {
        false
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion> {
        let prompt_tokens = (request.system_prompt.len() / 4) as u32;
        let completion_tokens = (self.reply.len() / 4) as u32;
        Ok(ChatCompletion {
            text: self.reply.clone(),
            invocation: None,
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
        })
    }
}
