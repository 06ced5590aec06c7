//! Utilities for Sampling

use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::types::{IntoResponse, RequestId, Response};

/// List of commands for Sampling
pub mod commands {
    /// Command name that asks the requestor's LLM for a completion.
    pub const CREATE: &str = "sampling/createMessage";
}

/// Represents the type of role in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Corresponds to the user in the conversation.
    User,
    /// Corresponds to the AI in the conversation.
    Assistant
}

/// Represents a message issued to or received from an LLM API within the Model Context Protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingMessage {
    /// The role of the message author.
    pub role: Role,

    /// The message content; text, image or audio shaped per the MCP schema.
    pub content: Value,
}

/// Parameters of a `sampling/createMessage` request.
///
/// See the [schema](https://github.com/modelcontextprotocol/specification/blob/main/schema/) for details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageRequestParams {
    /// The conversation to sample from.
    pub messages: Vec<SamplingMessage>,

    /// An optional system prompt the receiver may use.
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// The maximum number of tokens to sample.
    #[serde(rename = "maxTokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Result of a `sampling/createMessage` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageResult {
    /// The role of the generated message.
    pub role: Role,

    /// The generated content.
    pub content: Value,

    /// The name of the model that produced the completion.
    pub model: String,

    /// The reason sampling stopped, if known.
    #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl SamplingMessage {
    /// Creates a user text message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: serde_json::json!({ "type": "text", "text": text.into() }),
        }
    }

    /// Creates an assistant text message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: serde_json::json!({ "type": "text", "text": text.into() }),
        }
    }
}

impl CreateMessageRequestParams {
    /// Creates new [`CreateMessageRequestParams`] with a default token budget
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            system_prompt: None,
            max_tokens: 512,
            temperature: None,
        }
    }

    /// Appends a user message to the conversation
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        self.messages.push(SamplingMessage::user(text));
        self
    }

    /// Sets the system prompt
    pub fn with_sys_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

impl Default for CreateMessageRequestParams {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl IntoResponse for CreateMessageResult {
    #[inline]
    fn into_response(self, req_id: RequestId) -> Response {
        match serde_json::to_value(self) {
            Ok(v) => Response::success(req_id, v),
            Err(err) => Response::error(req_id, err.into())
        }
    }
}
