use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one heavy-mode run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single turn in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
            timestamp: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: Some(Utc::now()),
        }
    }
}

/// Capability level of the model an agent runs on.
///
/// The concrete provider and model id for each tier come from `[models.*]`
/// in the config file.
#[derive(Debug, Clone, Copy, Default, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Fast, inexpensive model. Default for new agents.
    #[default]
    Fast,
    /// High-capability model.
    Pro,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Pro => "pro",
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stop reason from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
}

/// A streaming delta from the LLM.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    /// A chunk of text content.
    TextDelta(String),

    /// The response is complete.
    Stop(StopReason),

    /// Usage information.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },

    /// Message ID from the API.
    MessageId(String),
}

/// One generation call as seen by the orchestration engine.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub tier: ModelTier,
    pub system_instruction: String,
    /// Prior conversation turns, already truncated to the agent's window.
    pub prior_turns: Vec<ChatMessage>,
    /// Text of the new user turn.
    pub new_turn: String,
}

/// Chat mode of the client.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// One generation call per message.
    #[default]
    Normal,
    /// Route each message through the agent graph.
    Heavy,
}

/// Progress events published while a heavy-mode run executes.
#[derive(Debug, Clone)]
pub enum HeavyEvent {
    /// Run started with the given number of ranks.
    RunStarted { run_id: RunId, ranks: usize },
    /// A rank's generation calls were issued.
    RankStarted { run_id: RunId, order: u32, agents: Vec<String> },
    /// An agent produced its output.
    AgentFinished { run_id: RunId, agent_id: String, name: String, elapsed_ms: u64 },
    /// An agent's generation call failed.
    AgentFailed { run_id: RunId, agent_id: String, name: String, error: String },
    /// All ranks completed.
    RunCompleted { run_id: RunId, elapsed_ms: u64 },
    /// The run was aborted.
    RunFailed { run_id: RunId, error: String },
}
