use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use agora_core::config::ModelConfig;
use agora_core::error::Result;
use agora_core::traits::LlmClient;
use agora_core::types::*;

use super::{open_event_stream, temperature};
use crate::streaming::SseEvent;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Chat Completions client. Also serves every OpenAI-compatible endpoint
/// (Ollama, Groq, OpenRouter, vLLM and the rest of the provider presets).
pub struct OpenAiClient {
    http: Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
    stream_options: StreamOptions,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize, Debug, PartialEq)]
struct WireMessage {
    role: &'static str,
    content: String,
}

impl From<ChatMessage> for WireMessage {
    fn from(msg: ChatMessage) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self {
            role,
            content: msg.text,
        }
    }
}

#[derive(Deserialize, Debug)]
struct Chunk {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    #[serde(default)]
    delta: ChoiceDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ChoiceDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl Chunk {
    fn into_deltas(self) -> Vec<Result<StreamDelta>> {
        let mut out = Vec::new();

        if let Some(usage) = self.usage {
            out.push(Ok(StreamDelta::Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            }));
        }

        // Only the first choice is requested.
        if let Some(choice) = self.choices.into_iter().next() {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                out.push(Ok(StreamDelta::TextDelta(text)));
            }
            if let Some(reason) = choice.finish_reason {
                let stop = if reason == "length" {
                    StopReason::MaxTokens
                } else {
                    StopReason::EndTurn
                };
                out.push(Ok(StreamDelta::Stop(stop)));
            }
        }

        out
    }
}

fn decode(event: SseEvent) -> Vec<Result<StreamDelta>> {
    if event.is_done() {
        return vec![];
    }
    match serde_json::from_str::<Chunk>(&event.data) {
        Ok(chunk) => chunk.into_deltas(),
        Err(e) => {
            warn!(data = %event.data, error = %e, "Skipping unparseable completion chunk");
            vec![]
        }
    }
}

impl LlmClient for OpenAiClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();

        Box::pin(async move {
            let url = config.base_url.as_deref().unwrap_or(OPENAI_API_URL);

            let body = CompletionRequest {
                model: &config.model_id,
                messages: messages.into_iter().map(WireMessage::from).collect(),
                max_tokens: config.max_tokens,
                temperature: temperature(&config),
                stream: true,
                stream_options: StreamOptions {
                    include_usage: true,
                },
            };

            let mut request = self.http.post(url).json(&body);
            if let Some(key) = &config.api_key {
                request = request.bearer_auth(key);
            }

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

#[cfg(test)]
mod tests {
    use super::*;

    fn event(data: &str) -> SseEvent {
        SseEvent {
            event_type: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn test_messages_keep_roles() {
        let wire: Vec<WireMessage> = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
        ]
        .into_iter()
        .map(WireMessage::from)
        .collect();
        let roles: Vec<&str> = wire.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
        assert_eq!(wire[1].content, "hi");
    }

    #[test]
    fn test_decode_text_chunk() {
        let deltas = decode(event(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#));
        assert!(matches!(&deltas[..], [Ok(StreamDelta::TextDelta(t))] if t == "Hel"));
    }

    #[test]
    fn test_decode_finish_reason() {
        let deltas = decode(event(r#"{"choices":[{"delta":{},"finish_reason":"length"}]}"#));
        assert!(matches!(
            &deltas[..],
            [Ok(StreamDelta::Stop(StopReason::MaxTokens))]
        ));
    }

    #[test]
    fn test_decode_usage_only_chunk() {
        let deltas = decode(event(
            r#"{"choices":[],"usage":{"prompt_tokens":12,"completion_tokens":3}}"#,
        ));
        assert!(matches!(
            &deltas[..],
            [Ok(StreamDelta::Usage {
                input_tokens: 12,
                output_tokens: 3
            })]
        ));
    }

    #[test]
    fn test_done_and_garbage_are_skipped() {
        assert!(decode(event("[DONE]")).is_empty());
        assert!(decode(event("not json")).is_empty());
    }
}
