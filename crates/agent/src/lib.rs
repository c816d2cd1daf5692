//! The generation/dispatch loop for Toolstream.
//!
//! An [`Agent`] runs rounds until the model stops asking for abilities:
//!
//! 1. **Send** the conversation and ability schemas to the provider
//! 2. **Stream** the response: text goes straight to the caller, tool-call
//!    fragments go into a per-round accumulator
//! 3. **Dispatch** any finalized calls in index order, appending each
//!    result to the log before the next call starts
//! 4. **Repeat** from step 1, or finish when the round made no calls

pub mod instructions;
pub mod loop_runner;
pub mod magic;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use instructions::render_instructions;
pub use loop_runner::{Agent, DEFAULT_MODEL, RoundState};
pub use magic::{MagicOptions, magic};
pub use stream_event::AgentStreamEvent;
