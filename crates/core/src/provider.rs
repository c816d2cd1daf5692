//! Provider trait: the abstraction over chat-completion backends.
//!
//! A Provider knows how to send a conversation to a model and hand back the
//! response as a stream of chunks. Chunks carry raw text deltas and raw
//! tool-call fragments; reassembling fragments is the agent loop's job
//! (see [`crate::tool_call`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::tool_call::ToolCallDelta;

/// Receiving side of a provider's chunk stream.
///
/// Dropping it is the cancellation signal: the producing task stops as soon
/// as it notices the channel is closed.
pub type ChunkReceiver = tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>;

/// One completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o")
    pub model: String,

    /// The full conversation so far
    pub messages: Vec<Message>,

    /// Sampling temperature, already clamped to [0, 2]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available abilities. Empty means the `tools` field is omitted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The ability name
    pub name: String,

    /// Description of what the ability does
    pub description: String,

    /// JSON Schema describing the ability's parameters
    pub parameters: serde_json::Value,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial assistant text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Partial tool-call fragments, index-addressed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallDelta>,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn tool_calls(deltas: Vec<ToolCallDelta>) -> Self {
        Self {
            tool_calls: deltas,
            ..Self::default()
        }
    }
}

/// The core Provider trait.
///
/// The agent loop calls `stream()` without knowing which backend answers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get a stream of response chunks.
    ///
    /// Errors returned here happen before any chunk was produced; errors
    /// during the stream arrive as `Err` items on the receiver.
    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError>;
}
