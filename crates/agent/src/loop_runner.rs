//! The generation/dispatch loop implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use toolstream_core::ability::{Ability, AbilityRegistry};
use toolstream_core::error::{Error, Result};
use toolstream_core::message::{Message, MessagesContainer, Role};
use toolstream_core::provider::{Provider, ProviderRequest, ToolDefinition, Usage};
use toolstream_core::tool_call::ToolCallAccumulator;
use tracing::{debug, info, trace, warn};

use crate::instructions::render_instructions;
use crate::stream_event::AgentStreamEvent;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-1106";

/// Where a round currently is.
///
/// `Sending → Streaming → Dispatching → Sending` while the model keeps
/// calling abilities; `Streaming → Done` once a round produces no calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Sending,
    Streaming,
    Dispatching,
    Done,
}

impl RoundState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Streaming => "streaming",
            Self::Dispatching => "dispatching",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for RoundState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn enter(round: u32, state: RoundState) {
    trace!(round, state = %state, "Round state");
}

/// A conversational agent that streams model output and runs the abilities
/// the model asks for.
///
/// The agent owns its conversation log. A running generation borrows the
/// agent mutably, so the log cannot change underneath it.
pub struct Agent {
    /// The completion backend
    provider: Arc<dyn Provider>,

    /// Instructions template for the system message
    instructions: String,

    /// Values substituted into `instructions`
    instruction_vars: BTreeMap<String, String>,

    /// The conversation log, system message first
    messages: MessagesContainer,

    /// Abilities the model may call
    abilities: AbilityRegistry,

    /// Name attached to the agent's own text messages
    name: Option<String>,

    model: String,

    /// Always within [0, 2]
    temperature: f32,

    max_tokens: Option<u32>,

    /// Maximum rounds per generation (`None` = unbounded)
    max_rounds: Option<u32>,
}

impl Agent {
    /// Create an agent whose log starts with a system message holding
    /// `instructions`.
    pub fn new(instructions: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        let instructions = instructions.into();
        let instruction_vars = BTreeMap::new();
        let system = Message::system(render_instructions(&instructions, &instruction_vars));

        Self {
            provider,
            instructions,
            instruction_vars,
            messages: MessagesContainer::from(vec![system]),
            abilities: AbilityRegistry::new(),
            name: None,
            model: DEFAULT_MODEL.into(),
            temperature: 1.0,
            max_tokens: None,
            max_rounds: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature, clamped to `[0, 2]`.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.set_temperature(temperature);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Stop a generation that still has ability calls after `limit` rounds.
    ///
    /// `None` or `Some(0)` leaves the loop unbounded.
    pub fn with_max_rounds(mut self, limit: impl Into<Option<u32>>) -> Self {
        self.max_rounds = limit.into().filter(|&l| l > 0);
        self
    }

    /// Append prior messages after the system message.
    pub fn with_messages(mut self, messages: impl Into<MessagesContainer>) -> Self {
        self.messages.merge(messages.into());
        self
    }

    pub fn with_abilities(mut self, abilities: impl IntoIterator<Item = Ability>) -> Self {
        self.add_abilities(abilities);
        self
    }

    /// Substitute `{key}` placeholders in the instructions and rewrite the
    /// system message.
    pub fn with_instruction_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.instruction_vars
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self.refresh_system_message();
        self
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = if temperature.is_nan() {
            1.0
        } else {
            temperature.clamp(0.0, 2.0)
        };
    }

    /// Register an ability. A second ability with the same name replaces the first.
    pub fn add_ability(&mut self, ability: Ability) -> &mut Self {
        self.abilities.register(ability);
        self
    }

    pub fn add_abilities(&mut self, abilities: impl IntoIterator<Item = Ability>) -> &mut Self {
        for ability in abilities {
            self.abilities.register(ability);
        }
        self
    }

    pub fn add_message(&mut self, message: Message) -> &mut Self {
        self.messages.push(message);
        self
    }

    pub fn add_messages(&mut self, messages: impl IntoIterator<Item = Message>) -> &mut Self {
        self.messages.extend(messages);
        self
    }

    pub fn add_user_message(&mut self, text: impl Into<String>) -> &mut Self {
        self.messages.push(Message::user(text));
        self
    }

    pub fn messages(&self) -> &MessagesContainer {
        &self.messages
    }

    /// Direct access to the log, e.g. for caller-directed truncation.
    pub fn messages_mut(&mut self) -> &mut MessagesContainer {
        &mut self.messages
    }

    /// Names of the registered abilities, in registration order.
    pub fn abilities(&self) -> Vec<&str> {
        self.abilities.names()
    }

    pub fn registry(&self) -> &AbilityRegistry {
        &self.abilities
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn max_rounds(&self) -> Option<u32> {
        self.max_rounds
    }

    fn refresh_system_message(&mut self) {
        let system = Message::system(render_instructions(&self.instructions, &self.instruction_vars));
        let has_system = self
            .messages
            .iter()
            .next()
            .is_some_and(|m| m.role() == Role::System);
        if has_system {
            self.messages.drop_range(1, 0);
        }
        self.messages.insert(0, [system]);
    }

    fn build_request(&self, tools: &[ToolDefinition]) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages: self.messages.as_slice().to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: tools.to_vec(),
        }
    }

    /// Run the generation loop, yielding every event as it happens.
    ///
    /// The stream is lazy: nothing is sent until it is first polled.
    /// Dropping it cancels the generation; messages appended by completed
    /// steps stay in the log. A round's ability calls are committed as one
    /// batch once every call has run, so abandoning the stream during
    /// dispatch discards that round's calls and results. A provider failure ends the stream with one
    /// `Err` item.
    pub fn events(&mut self) -> BoxStream<'_, Result<AgentStreamEvent>> {
        Box::pin(async_stream::try_stream! {
            let tools = self.abilities.definitions();
            let mut rounds: u32 = 0;
            let mut tool_calls_made: usize = 0;
            let mut usage: Option<Usage> = None;

            info!(
                provider = self.provider.name(),
                model = %self.model,
                messages = self.messages.len(),
                abilities = tools.len(),
                "Starting generation"
            );

            loop {
                rounds += 1;
                enter(rounds, RoundState::Sending);

                let request = self.build_request(&tools);
                let mut rx = self.provider.stream(request).await.map_err(Error::from)?;

                enter(rounds, RoundState::Streaming);
                let mut text = String::new();
                let mut accumulator = ToolCallAccumulator::new();

                while let Some(item) = rx.recv().await {
                    let chunk = item.map_err(Error::from)?;

                    if let Some(u) = chunk.usage {
                        *usage.get_or_insert_with(Usage::default) += u;
                    }
                    for delta in &chunk.tool_calls {
                        accumulator.collect_delta(delta);
                    }
                    if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                        text.push_str(&content);
                        yield AgentStreamEvent::Chunk { content };
                    }
                }

                if !text.is_empty() {
                    let mut message = Message::assistant(text);
                    if let Some(name) = &self.name {
                        message = message.with_name(name.clone());
                    }
                    self.messages.push(message);
                }

                if accumulator.has_pending_builders() {
                    accumulator.finalize_all();
                }

                if !accumulator.has_calls() {
                    enter(rounds, RoundState::Done);
                    break;
                }

                enter(rounds, RoundState::Dispatching);
                debug!(round = rounds, calls = accumulator.calls().len(), "Dispatching ability calls");

                // The announcement and its results enter the log together, so
                // a stream dropped mid-dispatch never leaves unanswered calls.
                let mut results = Vec::with_capacity(accumulator.calls().len());
                for call in accumulator.calls() {
                    yield AgentStreamEvent::ToolCall {
                        id: call.call_id().to_string(),
                        name: call.name().to_string(),
                        arguments: call.arguments().to_string(),
                    };

                    let outcome = self.abilities.execute(call.name(), call.arguments()).await;
                    let output = outcome.content();
                    results.push(Message::tool_result(call.call_id(), output.clone()));
                    tool_calls_made += 1;

                    yield AgentStreamEvent::ToolResult {
                        id: call.call_id().to_string(),
                        name: call.name().to_string(),
                        output,
                        success: outcome.is_success(),
                    };
                }
                self.messages.push(accumulator.to_assistant_message());
                self.messages.extend(results);

                if let Some(limit) = self.max_rounds {
                    if rounds >= limit {
                        warn!(limit, "Round limit reached while the model is still calling abilities");
                        Err::<(), Error>(Error::RoundLimitExceeded { limit })?;
                    }
                }
            }

            info!(rounds, tool_calls_made, "Generation complete");
            yield AgentStreamEvent::Done { rounds, tool_calls_made, usage };
        })
    }

    /// Run the generation loop, yielding only text fragments.
    pub fn generate(&mut self) -> BoxStream<'_, Result<String>> {
        self.events()
            .try_filter_map(|event| async move {
                Ok(match event {
                    AgentStreamEvent::Chunk { content } => Some(content),
                    _ => None,
                })
            })
            .boxed()
    }

    /// Append a user message, then generate.
    pub fn ask(&mut self, text: impl Into<String>) -> BoxStream<'_, Result<String>> {
        self.add_user_message(text);
        self.generate()
    }

    /// Generate and collect every fragment into one string.
    pub async fn output_text(&mut self) -> Result<String> {
        let mut output = String::new();
        let mut stream = self.generate();
        while let Some(fragment) = stream.next().await {
            output.push_str(&fragment?);
        }
        Ok(output)
    }

    /// Generate and write each fragment to `writer` as it arrives, flushing
    /// after every fragment, then a trailing newline.
    pub async fn stream_to<W>(&mut self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut stream = self.generate();
        while let Some(fragment) = stream.next().await {
            writer.write_all(fragment?.as_bytes()).await?;
            writer.flush().await?;
        }
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("name", &self.name)
            .field("messages", &self.messages.len())
            .field("abilities", &self.abilities.names())
            .field("max_rounds", &self.max_rounds)
            .finish()
    }
}
