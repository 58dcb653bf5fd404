use std::sync::Arc;

use futures::future::BoxFuture;
use futures::StreamExt;
use tracing::{debug, warn};

use agora_core::config::{ModelConfig, ModelsConfig};
use agora_core::error::Result;
use agora_core::traits::{Generator, LlmClient};
use agora_core::types::{ChatMessage, GenerationRequest, ModelTier, StreamDelta};

use crate::create_client;
use crate::providers::presets::apply_preset_defaults;

/// Collect a streamed response into one string.
///
/// Any error delta fails the whole call; partial text is discarded.
pub async fn complete_text(
    llm: &dyn LlmClient,
    config: &ModelConfig,
    messages: Vec<ChatMessage>,
) -> Result<String> {
    let mut stream = llm.chat_stream(config, messages).await?;
    let mut text = String::new();

    while let Some(delta) = stream.next().await {
        match delta? {
            StreamDelta::TextDelta(chunk) => text.push_str(&chunk),
            StreamDelta::Usage {
                input_tokens,
                output_tokens,
            } => debug!(model = %config.model_id, input_tokens, output_tokens, "Token usage"),
            StreamDelta::Stop(_) | StreamDelta::MessageId(_) => {}
        }
    }

    Ok(text)
}

/// Build the message list for one generation call:
/// system instruction, prior turns, then the new user turn.
pub fn build_messages(request: GenerationRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.prior_turns.len() + 2);
    if !request.system_instruction.trim().is_empty() {
        messages.push(ChatMessage::system(request.system_instruction));
    }
    messages.extend(request.prior_turns);
    messages.push(ChatMessage::user(request.new_turn));
    messages
}

/// `Generator` backed by real LLM clients, one per model tier.
pub struct TieredGenerator {
    fast: (ModelConfig, Arc<dyn LlmClient>),
    pro: (ModelConfig, Arc<dyn LlmClient>),
}

impl TieredGenerator {
    /// Create clients for both tiers from the `[models]` config.
    pub fn from_config(models: &ModelsConfig) -> Self {
        let build = |tier: ModelTier| {
            let mut config = models.for_tier(tier).clone();
            apply_preset_defaults(&mut config);
            let client: Arc<dyn LlmClient> = Arc::from(create_client(&config));
            (config, client)
        };
        Self {
            fast: build(ModelTier::Fast),
            pro: build(ModelTier::Pro),
        }
    }

    /// Use the given clients directly (no provider lookup).
    pub fn with_clients(
        fast: (ModelConfig, Arc<dyn LlmClient>),
        pro: (ModelConfig, Arc<dyn LlmClient>),
    ) -> Self {
        Self { fast, pro }
    }

    fn resolve(&self, tier: ModelTier) -> (&ModelConfig, &Arc<dyn LlmClient>) {
        let (config, client) = match tier {
            ModelTier::Fast => &self.fast,
            ModelTier::Pro => &self.pro,
        };
        (config, client)
    }
}

impl Generator for TieredGenerator {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let (config, client) = self.resolve(request.tier);
            let tier = request.tier;
            let messages = build_messages(request);

            let text = complete_text(client.as_ref(), config, messages).await?;
            if text.is_empty() {
                warn!(tier = %tier, model = %config.model_id, "Model returned an empty response");
            }
            Ok(text)
        })
    }
}
