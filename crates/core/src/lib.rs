//! # Toolstream Core
//!
//! Domain types, traits, and error definitions for Toolstream.
//! This crate has **no HTTP dependencies**. It defines the
//! conversation model, the ability registry, and the tool-call accumulator
//! that the provider and agent crates build on.
//!
//! ## Design Philosophy
//!
//! The completion backend is a trait here; implementations live in
//! `toolstream-providers`. Abilities are registered explicitly with a typed
//! argument list, and dispatch never fails loudly: every per-call problem is
//! turned into tool-result text for the model to read.

pub mod ability;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool_call;

// Re-export key types at crate root for ergonomics
pub use ability::{
    Ability, AbilityArgs, AbilityArgument, AbilityBuilder, AbilityHandler, AbilityOutcome,
    AbilityRegistry, ArgumentType,
};
pub use error::{AbilityError, Error, ProviderError, Result};
pub use message::{Message, MessageToolCall, MessagesContainer, Role};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk, ToolDefinition, Usage};
pub use tool_call::{ToolCallAccumulator, ToolCallDelta, ToolFunctionCall, ToolFunctionCallBuilder};
