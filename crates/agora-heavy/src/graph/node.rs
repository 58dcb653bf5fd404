use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use agora_core::types::ModelTier;

/// Editor-only canvas coordinate. Carried through import/export, never read
/// by the engine. Missing axes default to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One agent in the heavy-mode graph.
///
/// Each node is a single generation call with its own system instruction,
/// model tier and context window. `connections` are outgoing edges by target
/// id; an edge is only honoured when the target has a strictly greater
/// `order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentNode {
    /// Unique identifier, stable across edits.
    pub id: String,
    /// Display label; need not be unique.
    pub name: String,
    /// Passed verbatim as the system instruction of the generation call.
    pub system_instruction: String,
    /// Prior conversation turns this agent sees (0 = all of them).
    #[serde(default)]
    pub context_messages: usize,
    #[serde(default)]
    pub model: ModelTier,
    /// Execution rank, starting at 1.
    #[serde(default = "default_order")]
    pub order: u32,
    #[serde(default)]
    pub connections: Vec<String>,
    #[serde(
        default,
        deserialize_with = "lenient_position",
        skip_serializing_if = "Option::is_none"
    )]
    pub position: Option<Position>,
}

/// A malformed position is dropped instead of failing the whole node.
fn lenient_position<'de, D>(deserializer: D) -> Result<Option<Position>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

pub(crate) fn default_order() -> u32 {
    1
}

impl AgentNode {
    /// Create a new order-1, fast-tier node with no connections.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        system_instruction: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            system_instruction: system_instruction.into(),
            context_messages: 0,
            model: ModelTier::Fast,
            order: default_order(),
            connections: vec![],
            position: None,
        }
    }

    /// Set the execution rank.
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    /// Set the model tier.
    pub fn with_model(mut self, model: ModelTier) -> Self {
        self.model = model;
        self
    }

    /// Set the context window (0 = full history).
    pub fn with_context(mut self, messages: usize) -> Self {
        self.context_messages = messages;
        self
    }

    /// Add an outgoing connection.
    pub fn connect_to(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        if !self.connections.contains(&target) {
            self.connections.push(target);
        }
        self
    }

    /// Set the editor position.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position { x, y });
        self
    }
}
