use std::sync::Arc;

use tracing::{info, warn};

use agora_core::config::ChatConfig;
use agora_core::error::Result;
use agora_core::event::EventBus;
use agora_core::traits::Generator;
use agora_core::types::{ChatMessage, ChatMode, GenerationRequest, ModelTier};

use crate::aggregate::AgentResponse;
use crate::compose::history_window;
use crate::coordinator::HeavyCoordinator;
use crate::preset::PresetLibrary;

/// Answer to one user message.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub mode: ChatMode,
    /// Per-agent responses; empty in normal mode.
    pub agent_responses: Vec<AgentResponse>,
}

/// A conversation with the model, in normal or heavy mode.
///
/// The history only grows on success. A failed send leaves it exactly as it
/// was so the same message can be sent again.
pub struct ChatSession {
    generator: Arc<dyn Generator>,
    coordinator: HeavyCoordinator,
    presets: PresetLibrary,
    config: ChatConfig,
    mode: ChatMode,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(generator: Arc<dyn Generator>, config: ChatConfig) -> Self {
        Self {
            coordinator: HeavyCoordinator::new(generator.clone()),
            generator,
            presets: PresetLibrary::new(),
            mode: config.mode,
            config,
            history: Vec::new(),
        }
    }

    /// Use `presets` as the agent graph source.
    pub fn with_presets(mut self, presets: PresetLibrary) -> Self {
        self.presets = presets;
        self
    }

    /// Publish heavy-mode progress on `bus`.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.coordinator = HeavyCoordinator::new(self.generator.clone()).with_events(bus);
        self
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ChatMode) {
        if self.mode != mode {
            info!(?mode, "Chat mode changed");
        }
        self.mode = mode;
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn presets(&self) -> &PresetLibrary {
        &self.presets
    }

    pub fn presets_mut(&mut self) -> &mut PresetLibrary {
        &mut self.presets
    }

    /// Send a user message and record the exchange.
    pub async fn send(&mut self, text: &str) -> Result<ChatReply> {
        let reply = match self.mode {
            ChatMode::Normal => self.send_normal(text).await,
            ChatMode::Heavy => self.send_heavy(text).await,
        };

        match reply {
            Ok(reply) => {
                self.history.push(ChatMessage::user(text));
                self.history.push(ChatMessage::assistant(reply.text.clone()));
                Ok(reply)
            }
            Err(e) => {
                warn!(mode = ?self.mode, error = %e, "Message failed, history unchanged");
                Err(e)
            }
        }
    }

    async fn send_normal(&self, text: &str) -> Result<ChatReply> {
        let request = GenerationRequest {
            tier: ModelTier::Fast,
            system_instruction: self.config.system_prompt.clone().unwrap_or_default(),
            prior_turns: history_window(&self.history, self.config.context_messages).to_vec(),
            new_turn: text.to_string(),
        };
        let text = self.generator.generate(request).await?;
        Ok(ChatReply {
            text,
            mode: ChatMode::Normal,
            agent_responses: vec![],
        })
    }

    async fn send_heavy(&self, text: &str) -> Result<ChatReply> {
        let response = self
            .coordinator
            .run(text, &self.history, self.presets.active())
            .await?;
        Ok(ChatReply {
            text: response.final_text,
            mode: ChatMode::Heavy,
            agent_responses: response.agent_responses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AgentNode;
    use agora_core::types::Role;
    use agora_test_utils::MockGenerator;

    fn chat_config(prompt: &str, window: usize) -> ChatConfig {
        ChatConfig {
            system_prompt: Some(prompt.to_string()),
            context_messages: window,
            mode: ChatMode::Normal,
        }
    }

    #[tokio::test]
    async fn test_normal_mode_single_call() {
        let mock = Arc::new(MockGenerator::new().reply("be brief", "hello!"));
        let mut session = ChatSession::new(mock.clone(), chat_config("be brief", 0));

        let reply = session.send("hi").await.unwrap();
        assert_eq!(reply.text, "hello!");
        assert!(reply.agent_responses.is_empty());
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.calls()[0].tier, ModelTier::Fast);

        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].text, "hello!");
    }

    #[tokio::test]
    async fn test_normal_mode_respects_context_window() {
        let mock = Arc::new(MockGenerator::new());
        let mut session = ChatSession::new(mock.clone(), chat_config("p", 2));

        session.send("one").await.unwrap();
        session.send("two").await.unwrap();
        session.send("three").await.unwrap();

        let last = mock.calls().pop().unwrap();
        assert_eq!(last.prior_turns.len(), 2);
        assert_eq!(last.prior_turns[0].text, "two");
        assert_eq!(last.new_turn, "three");
    }

    #[tokio::test]
    async fn test_heavy_mode_uses_active_graph() {
        let mock = Arc::new(MockGenerator::new());
        let mut presets = PresetLibrary::new();
        presets
            .import(
                r#"[
                    {"id": "a", "name": "A", "systemInstruction": "left", "connections": ["s"]},
                    {"id": "s", "name": "S", "systemInstruction": "merge", "order": 2}
                ]"#,
            )
            .unwrap();
        let mut session =
            ChatSession::new(mock.clone(), ChatConfig::default()).with_presets(presets);
        session.set_mode(ChatMode::Heavy);

        let reply = session.send("q").await.unwrap();
        assert_eq!(reply.text, "merge output");
        assert_eq!(reply.agent_responses.len(), 2);
        assert_eq!(session.history()[1].text, "merge output");
    }

    #[tokio::test]
    async fn test_failure_leaves_history_untouched() {
        let mock = Arc::new(MockGenerator::new().fail("p"));
        let mut session = ChatSession::new(mock, chat_config("p", 0));

        assert!(session.send("hi").await.is_err());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_heavy_failure_leaves_history_untouched() {
        let mock = Arc::new(MockGenerator::new().fail("left"));
        let presets = PresetLibrary::with_agents(vec![AgentNode::new("a", "A", "left")]);
        let mut session = ChatSession::new(mock, ChatConfig::default()).with_presets(presets);
        session.set_mode(ChatMode::Heavy);

        assert!(session.send("q").await.is_err());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_clear_resets_history() {
        let mock = Arc::new(MockGenerator::new());
        let mut session = ChatSession::new(mock, ChatConfig::default());
        session.send("hi").await.unwrap();
        session.clear();
        assert!(session.history().is_empty());
    }
}
