//! OpenAI-compatible streaming provider.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, and any endpoint exposing
//! `/chat/completions` with server-sent-event streaming.
//!
//! The provider does not reassemble tool calls. Each SSE chunk is forwarded
//! as a [`StreamChunk`] carrying the raw, index-addressed fragments.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use toolstream_core::error::ProviderError;
use toolstream_core::provider::{ChunkReceiver, ProviderRequest, StreamChunk, Usage};
use toolstream_core::tool_call::ToolCallDelta;
use toolstream_core::Message;
use tracing::{debug, trace, warn};

use crate::sse::{SseDecoder, SseEvent};

/// Buffered chunks between the reader task and the agent loop.
const CHANNEL_CAPACITY: usize = 64;

/// An OpenAI-compatible chat-completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new(
            "openai",
            "https://api.openai.com/v1",
            api_key,
            Duration::from_secs(120),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the JSON body of a streaming completion request.
    ///
    /// `tools` is only present when at least one ability is registered.
    pub fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> =
            request.messages.iter().map(Message::to_wire).collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature.clamp(0.0, 2.0),
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if !request.tools.is_empty() {
            let tools: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        },
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        body
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider streaming error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

/// Convert one decoded SSE payload into a chunk. `None` for empty deltas.
fn parse_chunk(data: &str) -> serde_json::Result<Option<StreamChunk>> {
    let stream_resp: StreamResponse = serde_json::from_str(data)?;

    let mut chunk = StreamChunk {
        usage: stream_resp.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
        ..StreamChunk::default()
    };

    if let Some(choice) = stream_resp.choices.into_iter().next() {
        chunk.content = choice.delta.content.filter(|c| !c.is_empty());
        chunk.tool_calls = choice
            .delta
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let (name, arguments) = match tc.function {
                    Some(f) => (f.name, f.arguments),
                    None => (None, None),
                };
                ToolCallDelta {
                    index: tc.index,
                    id: tc.id,
                    name,
                    arguments,
                }
            })
            .collect();
    }

    let is_empty = chunk.content.is_none() && chunk.tool_calls.is_empty() && chunk.usage.is_none();
    Ok((!is_empty).then_some(chunk))
}

#[async_trait]
impl toolstream_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending streaming request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let response = Self::check_status(response).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);
        let provider_name = self.name.clone();

        // Spawn task to read the SSE byte stream and forward chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for event in decoder.push(&bytes) {
                    let data = match event {
                        SseEvent::Done => return,
                        SseEvent::Data(data) => data,
                    };

                    match parse_chunk(&data) {
                        Ok(Some(chunk)) => {
                            if tx.send(Ok(chunk)).await.is_err() {
                                trace!(provider = %provider_name, "Receiver dropped, stopping stream");
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            trace!(
                                provider = %provider_name,
                                data = %data,
                                error = %e,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }

            // Stream ended without [DONE]: a final unterminated line may remain
            if let Some(SseEvent::Data(data)) = decoder.finish() {
                if let Ok(Some(chunk)) = parse_chunk(&data) {
                    let _ = tx.send(Ok(chunk)).await;
                }
            }
        });

        Ok(rx)
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta; arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolstream_core::provider::ToolDefinition;
    use toolstream_core::Provider;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(tools: Vec<ToolDefinition>) -> ProviderRequest {
        ProviderRequest {
            model: "gpt-4o".into(),
            messages: vec![Message::system("You are helpful"), Message::user("Hello")],
            temperature: 0.5,
            max_tokens: None,
            tools,
        }
    }

    fn weather_tool() -> ToolDefinition {
        ToolDefinition {
            name: "get_weather".into(),
            description: "Current weather".into(),
            parameters: json!({"type": "object", "properties": {}, "required": []}),
        }
    }

    async fn mock_sse(body: &str) -> (MockServer, OpenAiCompatProvider) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let provider =
            OpenAiCompatProvider::new("test", server.uri(), "sk-test", Duration::from_secs(5))
                .unwrap();
        (server, provider)
    }

    async fn drain(mut rx: ChunkReceiver) -> Vec<Result<StreamChunk, ProviderError>> {
        let mut items = Vec::new();
        while let Some(item) = rx.recv().await {
            items.push(item);
        }
        items
    }

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test").unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn body_without_abilities_has_no_tools_field() {
        let body = OpenAiCompatProvider::build_body(&request(vec![]));
        assert!(body.get("tools").is_none());
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn body_with_abilities_lists_functions() {
        let mut req = request(vec![weather_tool()]);
        req.max_tokens = Some(256);
        let body = OpenAiCompatProvider::build_body(&req);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "get_weather");
        assert_eq!(body["max_tokens"], 256);
    }

    #[test]
    fn body_clamps_temperature() {
        let mut req = request(vec![]);
        req.temperature = 7.0;
        assert_eq!(OpenAiCompatProvider::build_body(&req)["temperature"], 2.0);
    }

    #[test]
    fn parse_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let chunk = parse_chunk(data).unwrap().unwrap();
        assert_eq!(chunk.content.as_deref(), Some("Hello"));
        assert!(chunk.tool_calls.is_empty());
    }

    #[test]
    fn parse_empty_and_finish_deltas_yield_nothing() {
        assert!(parse_chunk(r#"{"choices":[{"delta":{},"finish_reason":null}]}"#)
            .unwrap()
            .is_none());
        assert!(parse_chunk(r#"{"choices":[{"delta":{"content":""},"finish_reason":"stop"}]}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn parse_tool_call_fragments() {
        let data = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"search","arguments":""}},{"index":1,"function":{"arguments":"{\"q\""}}]}}]}"#;
        let chunk = parse_chunk(data).unwrap().unwrap();
        assert_eq!(chunk.tool_calls.len(), 2);
        assert_eq!(chunk.tool_calls[0].id.as_deref(), Some("call_a"));
        assert_eq!(chunk.tool_calls[0].name.as_deref(), Some("search"));
        assert_eq!(chunk.tool_calls[1].index, 1);
        assert!(chunk.tool_calls[1].id.is_none());
        assert_eq!(chunk.tool_calls[1].arguments.as_deref(), Some("{\"q\""));
    }

    #[test]
    fn parse_usage_chunk() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let usage = parse_chunk(data).unwrap().unwrap().usage.unwrap();
        assert_eq!(usage.total_tokens, 15);
    }

    #[tokio::test]
    async fn streams_text_and_tool_fragments() {
        let body = concat!(
            ": keep-alive\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: not-json\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c1\",\"function\":{\"name\":\"get_weather\",\"arguments\":\"{\\\"city\\\":\\\"Pa\"}}]}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"ris\\\"}\"}}]}}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":4,\"total_tokens\":7}}\n\n",
            "data: [DONE]\n\n",
        );
        let (_server, provider) = mock_sse(body).await;

        let rx = provider.stream(request(vec![weather_tool()])).await.unwrap();
        let chunks: Vec<StreamChunk> = drain(rx).await.into_iter().map(Result::unwrap).collect();

        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[0].content.as_deref(), Some("Hel"));
        assert_eq!(chunks[1].content.as_deref(), Some("lo"));
        assert_eq!(chunks[2].tool_calls[0].arguments.as_deref(), Some("{\"city\":\"Pa"));
        assert_eq!(chunks[3].tool_calls[0].arguments.as_deref(), Some("ris\"}"));
        assert_eq!(chunks[4].usage.unwrap().total_tokens, 7);
    }

    #[tokio::test]
    async fn request_without_abilities_is_sent_without_tools() {
        let (server, provider) = mock_sse("data: [DONE]\n\n").await;
        let rx = provider.stream(request(vec![])).await.unwrap();
        assert!(drain(rx).await.is_empty());

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        let sent: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert!(sent.get("tools").is_none());
        assert_eq!(sent["model"], "gpt-4o");
    }

    #[tokio::test]
    async fn maps_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let provider =
            OpenAiCompatProvider::new("test", server.uri(), "bad", Duration::from_secs(5)).unwrap();

        let err = provider.stream(request(vec![])).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn maps_server_error_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;
        let provider =
            OpenAiCompatProvider::new("test", server.uri(), "k", Duration::from_secs(5)).unwrap();

        match provider.stream(request(vec![])).await.unwrap_err() {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 500);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn maps_rate_limit_with_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
            .mount(&server)
            .await;
        let provider =
            OpenAiCompatProvider::new("test", server.uri(), "k", Duration::from_secs(5)).unwrap();

        let err = provider.stream(request(vec![])).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { retry_after_secs: 12 }));
    }
}
