//! Language-model contract and an OpenAI-compatible chat-completions client.
//!
//! The model is used for conversational phrasing and tool selection only.
//! Ranking never depends on it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use trailfit_core::AppConfig;

use crate::error::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A tool the model may call, with a JSON Schema for its arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

/// What the model answered: free text, or a request to call one tool.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmReply {
    Text(String),
    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a conversation. `tools` may be empty, in which case the reply
    /// is always text.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<LlmReply, LlmError>;
}

/// Client for any chat-completions endpoint that speaks the OpenAI wire
/// format.
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiClient {
    /// # Errors
    ///
    /// [`LlmError::MissingApiKey`] for a blank key; [`LlmError::Http`] if the
    /// HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_owned(),
            model: model.to_owned(),
            api_key: api_key.to_owned(),
        })
    }

    /// The configured client, or `None` when no API key is set.
    ///
    /// # Errors
    ///
    /// [`LlmError::Http`] if the HTTP client cannot be built.
    pub fn from_app_config(config: &AppConfig) -> Result<Option<Self>, LlmError> {
        let Some(api_key) = config.llm_api_key.as_deref() else {
            return Ok(None);
        };
        Self::new(
            &config.llm_base_url,
            &config.llm_model,
            api_key,
            Duration::from_millis(config.llm_timeout_ms),
        )
        .map(Some)
    }

    fn request_body(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.2,
        });
        if !tools.is_empty() {
            let tools: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = serde_json::Value::Array(tools);
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    /// JSON-encoded argument object.
    #[serde(default)]
    arguments: String,
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<LlmReply, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages, tools))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "chat completion request failed");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        parse_reply(completion)
    }
}

fn parse_reply(completion: CompletionResponse) -> Result<LlmReply, LlmError> {
    let message = completion
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| LlmError::Decode("completion has no choices".to_owned()))?;

    if let Some(call) = message.tool_calls.into_iter().flatten().next() {
        let arguments = if call.function.arguments.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                LlmError::Decode(format!(
                    "arguments for tool '{}' are not JSON: {e}",
                    call.function.name
                ))
            })?
        };
        return Ok(LlmReply::ToolCall {
            name: call.function.name,
            arguments,
        });
    }

    match message.content {
        Some(text) if !text.trim().is_empty() => Ok(LlmReply::Text(text)),
        _ => Err(LlmError::Decode("completion is empty".to_owned())),
    }
}

/// Run one completion under `timeout`, retrying once after a retriable
/// failure.
pub(crate) async fn complete_with_retry(
    model: &dyn LanguageModel,
    messages: &[ChatMessage],
    tools: &[ToolDefinition],
    timeout: Duration,
) -> Result<LlmReply, LlmError> {
    let mut attempt = 0_u32;
    loop {
        let result = match tokio::time::timeout(timeout, model.complete(messages, tools)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(timeout)),
        };
        match result {
            Err(e) if attempt == 0 && e.is_retriable() => {
                tracing::warn!(error = %e, "language model call failed, retrying once");
                attempt += 1;
            }
            other => return other,
        }
    }
}
