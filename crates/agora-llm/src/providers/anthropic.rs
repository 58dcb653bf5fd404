use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use agora_core::config::ModelConfig;
use agora_core::error::{AgoraError, Result};
use agora_core::traits::LlmClient;
use agora_core::types::*;

use super::{open_event_stream, temperature};
use crate::streaming::SseEvent;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: Client,
}

impl AnthropicClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for AnthropicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Turn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize, Debug)]
struct Turn {
    role: &'static str,
    content: String,
}

/// Streaming events we act on. Everything else (pings, block boundaries,
/// `message_stop`) falls into `Ignored`.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Event {
    MessageStart {
        message: StartedMessage,
    },
    ContentBlockDelta {
        delta: BlockDelta,
    },
    MessageDelta {
        delta: FinalDelta,
        #[serde(default)]
        usage: Option<Usage>,
    },
    Error {
        error: ApiError,
    },
    #[serde(other)]
    Ignored,
}

#[derive(Deserialize, Debug)]
struct StartedMessage {
    id: String,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
struct FinalDelta {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

impl Event {
    fn into_deltas(self) -> Vec<Result<StreamDelta>> {
        match self {
            Event::MessageStart { message } => {
                let mut out = vec![Ok(StreamDelta::MessageId(message.id))];
                if let Some(usage) = message.usage {
                    out.push(Ok(StreamDelta::Usage {
                        input_tokens: usage.input_tokens,
                        output_tokens: usage.output_tokens,
                    }));
                }
                out
            }
            Event::ContentBlockDelta {
                delta: BlockDelta::TextDelta { text },
            } => vec![Ok(StreamDelta::TextDelta(text))],
            Event::ContentBlockDelta { .. } | Event::Ignored => vec![],
            Event::MessageDelta { delta, usage } => {
                let mut out = Vec::new();
                if let Some(usage) = usage {
                    out.push(Ok(StreamDelta::Usage {
                        input_tokens: usage.input_tokens,
                        output_tokens: usage.output_tokens,
                    }));
                }
                let stop = match delta.stop_reason.as_deref() {
                    Some("end_turn") => Some(StopReason::EndTurn),
                    Some("max_tokens") => Some(StopReason::MaxTokens),
                    Some("stop_sequence") => Some(StopReason::StopSequence),
                    _ => None,
                };
                out.extend(stop.map(|s| Ok(StreamDelta::Stop(s))));
                out
            }
            Event::Error { error } => vec![Err(AgoraError::LlmStream(error.message))],
        }
    }
}

/// Lift system turns into the top-level `system` field.
fn split_system(messages: Vec<ChatMessage>) -> (Option<String>, Vec<Turn>) {
    let (system, rest): (Vec<ChatMessage>, Vec<ChatMessage>) = messages
        .into_iter()
        .partition(|m| m.role == Role::System);

    let system = (!system.is_empty()).then(|| {
        system
            .into_iter()
            .map(|m| m.text)
            .collect::<Vec<_>>()
            .join("\n\n")
    });

    let turns = rest
        .into_iter()
        .map(|m| Turn {
            role: if m.role == Role::Assistant {
                "assistant"
            } else {
                "user"
            },
            content: m.text,
        })
        .collect();

    (system, turns)
}

fn decode(event: SseEvent) -> Vec<Result<StreamDelta>> {
    match serde_json::from_str::<Event>(&event.data) {
        Ok(event) => event.into_deltas(),
        Err(e) => {
            warn!(data = %event.data, error = %e, "Skipping unparseable Anthropic event");
            vec![]
        }
    }
}

impl LlmClient for AnthropicClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();

        Box::pin(async move {
            let api_key = config
                .api_key
                .as_deref()
                .ok_or_else(|| AgoraError::Config("Anthropic API key not set".into()))?;
            let url = config.base_url.as_deref().unwrap_or(ANTHROPIC_API_URL);

            let (system, turns) = split_system(messages);
            let body = MessagesRequest {
                model: &config.model_id,
                max_tokens: config.max_tokens,
                system,
                messages: turns,
                temperature: temperature(&config),
                stream: true,
            };

            let request = self
                .http
                .post(url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body);

            let events = open_event_stream(request, &config).await?;
            let deltas = events.flat_map(|event| {
                stream::iter(match event {
                    Ok(event) => decode(event),
                    Err(e) => vec![Err(e)],
                })
            });

            Ok(Box::pin(deltas) as BoxStream<'_, Result<StreamDelta>>)
        })
    }
}
