//! Shared mocks for Agora tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};

use agora_core::config::ModelConfig;
use agora_core::error::{AgoraError, Result};
use agora_core::traits::{Generator, LlmClient};
use agora_core::types::{ChatMessage, GenerationRequest, StopReason, StreamDelta};

/// Scripted `Generator`, keyed by system instruction.
///
/// Unscripted instructions answer `"<instruction> output"`. Every request is
/// logged, and the number of calls in flight at once is tracked so tests can
/// check that a rank runs concurrently and that ranks do not overlap.
#[derive(Default)]
pub struct MockGenerator {
    replies: HashMap<String, String>,
    failures: HashSet<String>,
    delays: HashMap<String, Duration>,
    default_delay: Option<Duration>,
    calls: Mutex<Vec<GenerationRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, instruction: &str, text: &str) -> Self {
        self.replies.insert(instruction.to_string(), text.to_string());
        self
    }

    /// Calls with this instruction fail with an HTTP 500.
    pub fn fail(mut self, instruction: &str) -> Self {
        self.failures.insert(instruction.to_string());
        self
    }

    /// Delay every call by `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// Delay calls with this instruction by `delay`.
    pub fn delay(mut self, instruction: &str, delay: Duration) -> Self {
        self.delays.insert(instruction.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The request issued for `instruction`, if any.
    pub fn request_for(&self, instruction: &str) -> Option<GenerationRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.system_instruction == instruction)
            .cloned()
    }

    pub fn was_called(&self, instruction: &str) -> bool {
        self.request_for(instruction).is_some()
    }

    /// Highest number of calls observed in flight at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Generator for MockGenerator {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let instruction = request.system_instruction.clone();
            self.calls.lock().unwrap().push(request);

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays.get(&instruction).copied().or(self.default_delay);
            match delay {
                Some(d) => tokio::time::sleep(d).await,
                None => tokio::task::yield_now().await,
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failures.contains(&instruction) {
                return Err(AgoraError::LlmRequest("HTTP 500: mock failure".into()));
            }
            Ok(self
                .replies
                .get(&instruction)
                .cloned()
                .unwrap_or_else(|| format!("{} output", instruction)))
        })
    }
}

/// `LlmClient` that streams a fixed reply in small chunks.
pub struct MockLlmClient {
    reply: String,
    fail: bool,
    received: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockLlmClient {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail: false,
            received: Mutex::new(vec![]),
        }
    }

    /// A client whose stream yields an error after the first chunk.
    pub fn failing() -> Self {
        Self {
            reply: "partial".to_string(),
            fail: true,
            received: Mutex::new(vec![]),
        }
    }

    /// Message lists passed to `chat_stream`, in call order.
    pub fn received(&self) -> Vec<Vec<ChatMessage>> {
        self.received.lock().unwrap().clone()
    }
}

impl LlmClient for MockLlmClient {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        self.received.lock().unwrap().push(messages);

        let mut deltas: Vec<Result<StreamDelta>> = self
            .reply
            .chars()
            .collect::<Vec<_>>()
            .chunks(4)
            .map(|c| Ok(StreamDelta::TextDelta(c.iter().collect())))
            .collect();
        if self.fail {
            deltas.truncate(1);
            deltas.push(Err(AgoraError::LlmStream("connection reset".into())));
        } else {
            deltas.push(Ok(StreamDelta::Stop(StopReason::EndTurn)));
        }

        Box::pin(async move {
            let stream: BoxStream<'_, Result<StreamDelta>> = Box::pin(stream::iter(deltas));
            Ok(stream)
        })
    }
}
