pub mod generator;
pub mod providers;
pub mod retry;
pub mod streaming;

use agora_core::config::ModelConfig;
use agora_core::traits::LlmClient;

pub use generator::{complete_text, TieredGenerator};
pub use providers::anthropic::AnthropicClient;
pub use providers::openai::OpenAiClient;
pub use providers::presets::apply_preset_defaults;
pub use retry::RetryingClient;

/// Create an LLM client based on the provider name.
///
/// Wrapped in a `RetryingClient` when the model config has a `retry` section.
pub fn create_client(config: &ModelConfig) -> Box<dyn LlmClient> {
    let client: Box<dyn LlmClient> = match config.provider.as_str() {
        "anthropic" | "claude" => Box::new(AnthropicClient::new()),
        // Everything else uses the OpenAI-compatible client
        _ => Box::new(OpenAiClient::new()),
    };

    match &config.retry {
        Some(retry) => Box::new(RetryingClient::new(client, retry.clone())),
        None => client,
    }
}
