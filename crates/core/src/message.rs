//! Message and conversation-log domain types.
//!
//! These are the value objects that flow through every round:
//! the agent appends to a [`MessagesContainer`], the provider serializes it
//! with [`MessagesContainer::as_chat_messages`], and tool results are
//! appended back in the order the model asked for them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Ability execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the ability to invoke
    pub name: String,

    /// Arguments as raw JSON text
    pub arguments: String,
}

impl MessageToolCall {
    fn to_wire(&self) -> Value {
        json!({
            "id": self.id,
            "type": "function",
            "function": {
                "name": self.name,
                "arguments": self.arguments,
            },
        })
    }
}

/// A single message in a conversation.
///
/// The role is fixed at construction. Content can only grow, through
/// [`Message::append`] and [`Message::append_message`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    role: Role,

    content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,

    /// Extra keys merged verbatim into the wire object
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    extras: Map<String, Value>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            extras: Map::new(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create an assistant message that announces tool calls instead of text.
    pub fn assistant_tool_calls(tool_calls: Vec<MessageToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(Role::Assistant, "")
        }
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }

    /// Attach a sender name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach an extra wire-level key.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn tool_calls(&self) -> &[MessageToolCall] {
        &self.tool_calls
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        self.tool_call_id.as_deref()
    }

    pub fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }

    /// Concatenate text onto this message's content.
    pub fn append(&mut self, text: &str) -> &mut Self {
        self.content.push_str(text);
        self
    }

    /// Concatenate another message's content onto this one.
    pub fn append_message(&mut self, other: &Message) -> &mut Self {
        self.content.push_str(&other.content);
        self
    }

    /// Serialize to the chat-completions wire object.
    ///
    /// Extras override generated keys (except `role`); the message name is
    /// only emitted when extras do not define `name` themselves.
    pub fn to_wire(&self) -> Value {
        let mut wire = Map::new();
        wire.insert("role".into(), json!(self.role));

        if self.role == Role::Assistant && !self.tool_calls.is_empty() {
            let calls: Vec<Value> = self.tool_calls.iter().map(MessageToolCall::to_wire).collect();
            wire.insert("tool_calls".into(), Value::Array(calls));
        } else {
            wire.insert("content".into(), json!(self.content));
        }

        if let Some(id) = &self.tool_call_id {
            wire.insert("tool_call_id".into(), json!(id));
        }

        for (key, value) in &self.extras {
            if key != "role" {
                wire.insert(key.clone(), value.clone());
            }
        }

        if let Some(name) = &self.name {
            wire.entry("name").or_insert_with(|| json!(name));
        }

        Value::Object(wire)
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}({}): {}", self.role, self.content),
            None => write!(f, "{}: {}", self.role, self.content),
        }
    }
}

/// An ordered conversation log. Insertion order is conversation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessagesContainer {
    messages: Vec<Message>,
}

impl MessagesContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append one message.
    pub fn push(&mut self, message: Message) -> &mut Self {
        self.messages.push(message);
        self
    }

    /// Append many messages, in order.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) -> &mut Self {
        self.messages.extend(messages);
        self
    }

    /// Append every message of `other`, preserving its relative order.
    pub fn merge(&mut self, other: MessagesContainer) -> &mut Self {
        self.messages.extend(other.messages);
        self
    }

    /// Insert messages at `index` (clamped to the current length).
    pub fn insert(&mut self, index: usize, messages: impl IntoIterator<Item = Message>) -> &mut Self {
        let index = index.min(self.messages.len());
        self.messages.splice(index..index, messages);
        self
    }

    /// Keep the first `skip` messages, remove the next `k`, keep the rest.
    ///
    /// Out-of-range values are clamped. No message is protected, including
    /// the system message; the caller decides what to keep.
    pub fn drop_range(&mut self, k: usize, skip: usize) -> &mut Self {
        let start = skip.min(self.messages.len());
        let end = start.saturating_add(k).min(self.messages.len());
        self.messages.drain(start..end);
        self
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Wire form of the whole log, in order.
    pub fn as_chat_messages(&self) -> Vec<Value> {
        self.messages.iter().map(Message::to_wire).collect()
    }

    /// The whole conversation as human-readable text.
    pub fn conversation(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl From<Vec<Message>> for MessagesContainer {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl FromIterator<Message> for MessagesContainer {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MessagesContainer {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
