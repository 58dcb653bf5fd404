pub mod anthropic;
pub mod openai;
pub mod presets;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;

use agora_core::config::ModelConfig;
use agora_core::error::{AgoraError, Result};

use crate::streaming::SseStream;

/// Send a streaming request and return its event stream.
///
/// `extra_headers` from the model config are applied last. Non-2xx responses
/// become `LlmRequest("HTTP <status>: <body>")`, the shape `RetryingClient`
/// inspects.
pub(crate) async fn open_event_stream(
    mut request: reqwest::RequestBuilder,
    config: &ModelConfig,
) -> Result<SseStream> {
    for (name, value) in &config.extra_headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = request
        .send()
        .await
        .map_err(|e| AgoraError::LlmRequest(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(AgoraError::LlmRequest(format!("HTTP {}: {}", status, body)));
    }

    Ok(SseStream::new(response.bytes_stream()))
}

/// Temperature is omitted at 0 so provider defaults apply.
pub(crate) fn temperature(config: &ModelConfig) -> Option<f32> {
    (config.temperature > 0.0).then_some(config.temperature)
}
