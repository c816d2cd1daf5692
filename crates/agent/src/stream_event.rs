//! Agent-level streaming events.
//!
//! `AgentStreamEvent` wraps provider-level stream chunks and ability
//! dispatch into higher-level events a caller can render or forward.

use serde::{Deserialize, Serialize};
use toolstream_core::provider::Usage;

/// Events emitted by the agent during a generation.
///
/// - `chunk`: partial text from the model, in arrival order
/// - `tool_call`: the agent is about to run an ability
/// - `tool_result`: the ability finished; its text is now in the log
/// - `done`: no more rounds are needed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial text token from the model.
    Chunk { content: String },

    /// The model requested an ability call.
    ToolCall {
        id: String,
        name: String,
        /// Raw argument text as streamed; may not be valid JSON.
        arguments: String,
    },

    /// Ability dispatch completed.
    ToolResult {
        id: String,
        name: String,
        output: String,
        success: bool,
    },

    /// The generation is complete.
    Done {
        rounds: u32,
        tool_calls_made: usize,
        usage: Option<Usage>,
    },
}

impl AgentStreamEvent {
    /// Event name, matching the serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_chunk() {
        let event = AgentStreamEvent::Chunk {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn event_serialization_tool_call_keeps_raw_arguments() {
        let event = AgentStreamEvent::ToolCall {
            id: "call_1".into(),
            name: "weather_lookup".into(),
            arguments: r#"{"city":"Par"#.into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_call");
        assert_eq!(json["arguments"], r#"{"city":"Par"#);
    }

    #[test]
    fn event_serialization_done() {
        let event = AgentStreamEvent::Done {
            rounds: 2,
            tool_calls_made: 1,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            }),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"done""#));
        assert!(json.contains(r#""rounds":2"#));
    }

    #[test]
    fn event_type_matches_tag() {
        let events = [
            AgentStreamEvent::Chunk { content: "x".into() },
            AgentStreamEvent::ToolCall {
                id: "a".into(),
                name: "b".into(),
                arguments: String::new(),
            },
            AgentStreamEvent::ToolResult {
                id: "a".into(),
                name: "b".into(),
                output: "c".into(),
                success: true,
            },
            AgentStreamEvent::Done {
                rounds: 1,
                tool_calls_made: 0,
                usage: None,
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.event_type());
        }
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"tool_result","id":"c1","name":"f","output":"ok","success":false}"#;
        let event: AgentStreamEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentStreamEvent::ToolResult { output, success, .. } => {
                assert_eq!(output, "ok");
                assert!(!success);
            }
            _ => panic!("Wrong variant"),
        }
    }
}
