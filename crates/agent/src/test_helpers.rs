//! Shared test helpers for agent tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use toolstream_core::error::ProviderError;
use toolstream_core::provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk, Usage};
use toolstream_core::tool_call::ToolCallDelta;

type Script = Vec<Result<StreamChunk, ProviderError>>;

/// A mock provider that streams a sequence of scripted rounds.
///
/// Each call to `stream` replays the next script and records the request.
/// Once the scripts run out, `stream` fails with an `ApiError`.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);

        let script = self.scripts.lock().unwrap().pop_front().ok_or_else(|| {
            ProviderError::ApiError {
                status_code: 500,
                message: "no more scripted responses".into(),
            }
        })?;

        let (tx, rx) = tokio::sync::mpsc::channel(script.len().max(1));
        for item in script {
            tx.send(item).await.unwrap();
        }
        Ok(rx)
    }
}

/// A round that streams plain text fragments.
pub fn text_round(fragments: &[&str]) -> Script {
    fragments
        .iter()
        .map(|f| Ok(StreamChunk::text(*f)))
        .chain(std::iter::once(Ok(usage_chunk())))
        .collect()
}

/// A round that streams one chunk per tool-call delta.
pub fn tool_round(deltas: Vec<ToolCallDelta>) -> Script {
    deltas
        .into_iter()
        .map(|d| Ok(StreamChunk::tool_calls(vec![d])))
        .chain(std::iter::once(Ok(usage_chunk())))
        .collect()
}

/// A complete single-chunk call at `index`.
pub fn call(index: u32, id: &str, name: &str, arguments: &str) -> ToolCallDelta {
    ToolCallDelta::new(index)
        .with_id(id)
        .with_name(name)
        .with_arguments(arguments)
}

fn usage_chunk() -> StreamChunk {
    StreamChunk {
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        ..StreamChunk::default()
    }
}
