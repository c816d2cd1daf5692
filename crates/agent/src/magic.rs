//! One-shot generation helper.
//!
//! `magic` turns a piece of instructions into finished text: it builds a
//! throwaway [`Agent`], runs a single generation and returns the output.

use std::sync::Arc;

use toolstream_core::error::Result;
use toolstream_core::message::MessagesContainer;
use toolstream_core::provider::Provider;

use crate::loop_runner::{Agent, DEFAULT_MODEL};

/// Settings for [`magic`].
#[derive(Debug, Clone)]
pub struct MagicOptions {
    pub model: String,
    pub temperature: f32,
    pub name: Option<String>,
    /// Prior messages placed after the instructions
    pub messages: MessagesContainer,
}

impl Default for MagicOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            temperature: 1.0,
            name: None,
            messages: MessagesContainer::new(),
        }
    }
}

/// Generate the complete response to `instructions` in one call.
pub async fn magic(
    provider: Arc<dyn Provider>,
    instructions: impl Into<String>,
    options: MagicOptions,
) -> Result<String> {
    let mut agent = Agent::new(instructions, provider)
        .with_model(options.model)
        .with_temperature(options.temperature)
        .with_messages(options.messages);
    if let Some(name) = options.name {
        agent = agent.with_name(name);
    }
    agent.output_text().await
}
