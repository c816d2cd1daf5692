//! Tool-call accumulation for streamed completions.
//!
//! A streamed response delivers each tool call as a series of fragments
//! addressed by an integer index. Fragments for different indices can
//! interleave across chunks, but the fragments of one index always arrive in
//! order. [`ToolCallAccumulator`] concatenates them per index and, once the
//! stream is exhausted, finalizes them into immutable [`ToolFunctionCall`]s.
//!
//! An accumulator belongs to exactly one round. Create a fresh one per
//! completion request and drop it after dispatch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::message::{Message, MessageToolCall};

/// One partial tool-call fragment, as delivered in a stream chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolCallDelta {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = Some(arguments.into());
        self
    }
}

/// A finalized tool call. Arguments stay raw text until [`ToolFunctionCall::args`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFunctionCall {
    call_id: String,
    name: String,
    arguments: String,
}

impl ToolFunctionCall {
    pub fn new(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw accumulated arguments text.
    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    /// Parse the arguments as a JSON object.
    ///
    /// Whitespace-only text parses as an empty object.
    pub fn args(&self) -> serde_json::Result<Map<String, Value>> {
        if self.arguments.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&self.arguments)
    }

    pub fn to_message_tool_call(&self) -> MessageToolCall {
        MessageToolCall {
            id: self.call_id.clone(),
            name: self.name.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

/// Collects fragments for one tool-call index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolFunctionCallBuilder {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolFunctionCallBuilder {
    /// Append whichever fields the fragment carries.
    pub fn append(&mut self, id: Option<&str>, name: Option<&str>, arguments: Option<&str>) {
        if let Some(id) = id {
            self.call_id.push_str(id);
        }
        if let Some(name) = name {
            self.name.push_str(name);
        }
        if let Some(arguments) = arguments {
            self.arguments.push_str(arguments);
        }
    }

    pub fn build(&self) -> ToolFunctionCall {
        ToolFunctionCall::new(&self.call_id, &self.name, &self.arguments)
    }
}

/// Per-round accumulator of streamed tool-call fragments.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    builders: BTreeMap<u32, ToolFunctionCallBuilder>,
    calls: Vec<ToolFunctionCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment to the builder at `index`, creating it on first sight.
    pub fn collect(
        &mut self,
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) {
        self.builders
            .entry(index)
            .or_default()
            .append(id, name, arguments);
    }

    pub fn collect_delta(&mut self, delta: &ToolCallDelta) {
        self.collect(
            delta.index,
            delta.id.as_deref(),
            delta.name.as_deref(),
            delta.arguments.as_deref(),
        );
    }

    pub fn has_pending_builders(&self) -> bool {
        !self.builders.is_empty()
    }

    /// Build every pending builder, in index order, replacing any previous
    /// finalized set.
    pub fn finalize_all(&mut self) -> &[ToolFunctionCall] {
        self.calls = self.builders.values().map(|b| b.build()).collect();
        &self.calls
    }

    pub fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }

    pub fn calls(&self) -> &[ToolFunctionCall] {
        &self.calls
    }

    /// The assistant message announcing the finalized calls.
    ///
    /// It carries no text and must precede every tool-result message for
    /// these calls in the conversation log.
    pub fn to_assistant_message(&self) -> Message {
        Message::assistant_tool_calls(
            self.calls
                .iter()
                .map(ToolFunctionCall::to_message_tool_call)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn finalize(deltas: &[ToolCallDelta]) -> Vec<ToolFunctionCall> {
        let mut acc = ToolCallAccumulator::new();
        for delta in deltas {
            acc.collect_delta(delta);
        }
        acc.finalize_all().to_vec()
    }

    #[test]
    fn empty_accumulator_has_nothing() {
        let mut acc = ToolCallAccumulator::new();
        assert!(!acc.has_pending_builders());
        assert!(acc.finalize_all().is_empty());
        assert!(!acc.has_calls());
    }

    #[test]
    fn reconstructs_split_arguments() {
        let calls = finalize(&[
            ToolCallDelta::new(0)
                .with_id("c1")
                .with_name("get_weather")
                .with_arguments("{\"city\":\"Pa"),
            ToolCallDelta::new(0).with_arguments("ris\"}"),
        ]);

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_id(), "c1");
        assert_eq!(calls[0].name(), "get_weather");
        let args = calls[0].args().unwrap();
        assert_eq!(args["city"], "Paris");
    }

    #[test]
    fn split_position_does_not_change_result() {
        let whole = finalize(&[ToolCallDelta::new(0)
            .with_id("c1")
            .with_name("f")
            .with_arguments(r#"{"x":1}"#)]);
        let split = finalize(&[
            ToolCallDelta::new(0).with_id("c").with_name("f"),
            ToolCallDelta::new(0).with_id("1").with_arguments(r#"{"x"#),
            ToolCallDelta::new(0).with_arguments(r#"":1}"#),
        ]);
        assert_eq!(whole, split);
    }

    #[test]
    fn interleaved_indices_are_kept_apart_and_ordered() {
        let calls = finalize(&[
            ToolCallDelta::new(1).with_id("b").with_name("second"),
            ToolCallDelta::new(0).with_id("a").with_name("first"),
            ToolCallDelta::new(1).with_arguments("{\"n\":"),
            ToolCallDelta::new(0).with_arguments("{}"),
            ToolCallDelta::new(1).with_arguments("2}"),
        ]);

        let names: Vec<_> = calls.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(calls[0].arguments(), "{}");
        assert_eq!(calls[1].arguments(), "{\"n\":2}");
    }

    #[test]
    fn sparse_indices_do_not_create_phantom_calls() {
        let calls = finalize(&[
            ToolCallDelta::new(3).with_id("x").with_name("later"),
            ToolCallDelta::new(0).with_id("y").with_name("earlier"),
        ]);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name(), "earlier");
        assert_eq!(calls[1].name(), "later");
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut acc = ToolCallAccumulator::new();
        acc.collect(0, Some("c1"), Some("f"), Some("{}"));
        let first = acc.finalize_all().to_vec();
        let second = acc.finalize_all().to_vec();
        assert_eq!(first, second);
        assert!(acc.has_calls());
    }

    #[test]
    fn malformed_call_is_finalized_without_validation() {
        let calls = finalize(&[ToolCallDelta::new(0).with_arguments("{not json")]);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name(), "");
        assert!(calls[0].args().is_err());
    }

    #[test]
    fn blank_arguments_parse_as_empty_object() {
        let call = ToolFunctionCall::new("c1", "now", "  ");
        assert!(call.args().unwrap().is_empty());
    }

    #[test]
    fn assistant_message_carries_calls_without_text() {
        let mut acc = ToolCallAccumulator::new();
        acc.collect(0, Some("c1"), Some("a"), Some("{}"));
        acc.collect(1, Some("c2"), Some("b"), Some("{}"));
        acc.finalize_all();

        let msg = acc.to_assistant_message();
        assert_eq!(msg.role(), Role::Assistant);
        assert_eq!(msg.content(), "");
        let ids: Vec<_> = msg.tool_calls().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }
}
