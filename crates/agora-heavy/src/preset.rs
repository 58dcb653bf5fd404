//! Agent presets: the JSON import/export format for agent graphs.
//!
//! A preset is a JSON array of agent objects:
//!
//! ```json
//! [
//!   {
//!     "id": "analyst",
//!     "name": "Analyst",
//!     "systemInstruction": "Break the problem down.",
//!     "contextMessages": 0,
//!     "model": "fast",
//!     "order": 1,
//!     "connections": ["synth"],
//!     "position": { "x": 40, "y": 120 }
//!   }
//! ]
//! ```
//!
//! Only `id`, `name` and `systemInstruction` are required. Imports are all
//! or nothing: one bad element rejects the whole file.

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use agora_core::error::{AgoraError, Result};
use agora_core::types::ModelTier;

use crate::graph::{AgentGraph, AgentNode};

/// Parse and validate a preset document.
pub fn parse_preset(json: &str) -> Result<Vec<AgentNode>> {
    let doc: Value = serde_json::from_str(json)
        .map_err(|e| AgoraError::InvalidPreset(format!("not valid JSON: {}", e)))?;

    let items = doc
        .as_array()
        .ok_or_else(|| AgoraError::InvalidPreset("expected a JSON array of agents".into()))?;

    let mut nodes = Vec::with_capacity(items.len());
    let mut seen = HashSet::new();

    for (i, item) in items.iter().enumerate() {
        let node = parse_agent(i, item)?;
        if !seen.insert(node.id.clone()) {
            return Err(AgoraError::InvalidPreset(format!(
                "agent #{}: duplicate id '{}'",
                i + 1,
                node.id
            )));
        }
        nodes.push(node);
    }

    Ok(nodes)
}

fn parse_agent(i: usize, item: &Value) -> Result<AgentNode> {
    let reject = |msg: &str| AgoraError::InvalidPreset(format!("agent #{}: {}", i + 1, msg));

    let obj = item.as_object().ok_or_else(|| reject("expected an object"))?;

    for key in ["id", "name"] {
        match obj.get(key).and_then(Value::as_str) {
            Some(s) if !s.is_empty() => {}
            _ => return Err(reject(&format!("missing non-empty `{}`", key))),
        }
    }
    if !obj.get("systemInstruction").is_some_and(Value::is_string) {
        return Err(reject("missing `systemInstruction`"));
    }

    let node: AgentNode =
        serde_json::from_value(item.clone()).map_err(|e| reject(&e.to_string()))?;

    if node.order == 0 {
        return Err(reject("`order` must be at least 1"));
    }
    Ok(node)
}

/// Read and validate a preset file.
pub fn load_preset(path: &Path) -> Result<Vec<AgentNode>> {
    let content = std::fs::read_to_string(path)?;
    parse_preset(&content)
}

/// Serialize agents in the preset format.
pub fn export_preset(nodes: &[AgentNode]) -> Result<String> {
    Ok(serde_json::to_string_pretty(nodes)?)
}

/// The built-in heavy-mode graph: three specialists feeding one synthesizer.
pub fn default_agents() -> Vec<AgentNode> {
    vec![
        AgentNode::new(
            "analyst",
            "Analyst",
            "You are an analytical thinker. Break the user's request into its core \
             components, identify what is really being asked, and reason through it \
             step by step. Be precise and structured.",
        )
        .connect_to("synthesizer")
        .at(60.0, 60.0),
        AgentNode::new(
            "researcher",
            "Researcher",
            "You are a thorough researcher. Gather the facts, background, examples and \
             relevant details needed to answer the user's request. Note any uncertainty \
             explicitly.",
        )
        .connect_to("synthesizer")
        .at(60.0, 220.0),
        AgentNode::new(
            "critic",
            "Critic",
            "You are a critical reviewer. Identify pitfalls, edge cases, common \
             misconceptions and alternative viewpoints relevant to the user's request.",
        )
        .connect_to("synthesizer")
        .at(60.0, 380.0),
        AgentNode::new(
            "synthesizer",
            "Synthesizer",
            "You are the final responder. Combine the other agents' work into one clear, \
             accurate, well-organized answer addressed directly to the user. Resolve \
             disagreements between the inputs and do not mention the other agents.",
        )
        .with_order(2)
        .with_model(ModelTier::Pro)
        .at(360.0, 220.0),
    ]
}

pub fn default_graph() -> AgentGraph {
    AgentGraph::new(default_agents())
}

/// Holds the active agent graph and swaps it atomically on import.
#[derive(Debug, Clone)]
pub struct PresetLibrary {
    active: AgentGraph,
}

impl PresetLibrary {
    /// Start from the built-in graph.
    pub fn new() -> Self {
        Self {
            active: default_graph(),
        }
    }

    pub fn with_agents(nodes: Vec<AgentNode>) -> Self {
        Self {
            active: AgentGraph::new(nodes),
        }
    }

    pub fn active(&self) -> &AgentGraph {
        &self.active
    }

    /// Replace the active graph with a preset document.
    ///
    /// On any validation error the active graph is left as it was.
    pub fn import(&mut self, json: &str) -> Result<&AgentGraph> {
        let nodes = parse_preset(json).map_err(|e| {
            warn!(error = %e, "Rejected agent preset import");
            e
        })?;
        let graph = AgentGraph::new(nodes);
        info!(
            agents = graph.len(),
            dropped_edges = graph.dropped_edges().len(),
            "Imported agent preset"
        );
        self.active = graph;
        Ok(&self.active)
    }

    pub fn import_file(&mut self, path: &Path) -> Result<&AgentGraph> {
        let content = std::fs::read_to_string(path)?;
        self.import(&content)
    }

    pub fn export(&self) -> Result<String> {
        export_preset(self.active.nodes())
    }

    /// Restore the built-in graph.
    pub fn reset(&mut self) {
        self.active = default_graph();
    }
}

impl Default for PresetLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_agent_gets_defaults() {
        let nodes = parse_preset(r#"[{"id": "a", "name": "A", "systemInstruction": ""}]"#).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].order, 1);
        assert_eq!(nodes[0].model, ModelTier::Fast);
        assert_eq!(nodes[0].context_messages, 0);
        assert!(nodes[0].connections.is_empty());
    }

    #[test]
    fn test_full_agent_parses() {
        let nodes = parse_preset(
            r#"[{
                "id": "s", "name": "Synth", "systemInstruction": "merge",
                "contextMessages": 4, "model": "pro", "order": 3,
                "connections": ["x"], "position": {"x": 1.5, "y": 2}
            }]"#,
        )
        .unwrap();
        let node = &nodes[0];
        assert_eq!(node.context_messages, 4);
        assert_eq!(node.model, ModelTier::Pro);
        assert_eq!(node.order, 3);
        assert_eq!(node.connections, vec!["x"]);
        assert_eq!(node.position.unwrap().x, 1.5);
    }

    #[test]
    fn test_rejects_missing_required_fields() {
        let cases = [
            r#"[{"name": "A", "systemInstruction": ""}]"#,
            r#"[{"id": "", "name": "A", "systemInstruction": ""}]"#,
            r#"[{"id": "a", "systemInstruction": ""}]"#,
            r#"[{"id": "a", "name": "", "systemInstruction": ""}]"#,
            r#"[{"id": "a", "name": "A"}]"#,
            r#"[{"id": "a", "name": "A", "systemInstruction": null}]"#,
        ];
        for case in cases {
            assert!(
                matches!(parse_preset(case), Err(AgoraError::InvalidPreset(_))),
                "accepted: {}",
                case
            );
        }
    }

    #[test]
    fn test_whitespace_name_is_kept() {
        let preset = r#"[{"id": "a", "name": "  ", "systemInstruction": ""}]"#;
        let nodes = parse_preset(preset).unwrap();
        assert_eq!(nodes[0].name, "  ");
    }

    #[test]
    fn test_position_never_fails_import() {
        let nodes = parse_preset(
            r#"[
                {"id": "a", "name": "A", "systemInstruction": "", "position": {"x": 1}},
                {"id": "b", "name": "B", "systemInstruction": "", "position": "left"}
            ]"#,
        )
        .unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].position.map(|p| (p.x, p.y)), Some((1.0, 0.0)));
        assert!(nodes[1].position.is_none());
    }

    #[test]
    fn test_rejects_malformed_documents() {
        assert!(parse_preset("{not json").is_err());
        assert!(parse_preset(r#"{"id": "a"}"#).is_err());
        assert!(parse_preset(r#"["a"]"#).is_err());
        assert!(parse_preset(
            r#"[{"id": "a", "name": "A", "systemInstruction": "", "model": "huge"}]"#
        )
        .is_err());
        assert!(parse_preset(
            r#"[{"id": "a", "name": "A", "systemInstruction": "", "contextMessages": -1}]"#
        )
        .is_err());
        assert!(parse_preset(
            r#"[{"id": "a", "name": "A", "systemInstruction": "", "order": 0}]"#
        )
        .is_err());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let err = parse_preset(
            r#"[
                {"id": "a", "name": "A", "systemInstruction": ""},
                {"id": "a", "name": "B", "systemInstruction": ""}
            ]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate id 'a'"));
    }

    #[test]
    fn test_empty_array_is_valid() {
        assert!(parse_preset("[]").unwrap().is_empty());
    }

    #[test]
    fn test_export_then_import_preserves_agents() {
        let json = export_preset(&default_agents()).unwrap();
        assert_eq!(parse_preset(&json).unwrap(), default_agents());
    }

    #[test]
    fn test_default_graph_shape() {
        let graph = default_graph();
        assert_eq!(graph.len(), 4);
        assert!(graph.dropped_edges().is_empty());
        assert_eq!(graph.parents("synthesizer").len(), 3);
        let terminals: Vec<&str> = graph.terminals().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(terminals, vec!["synthesizer"]);
    }

    #[test]
    fn test_failed_import_keeps_active_graph() {
        let mut library = PresetLibrary::new();
        let before = library.export().unwrap();

        let bad = r#"[
            {"id": "ok", "name": "Ok", "systemInstruction": ""},
            {"id": "broken", "systemInstruction": ""}
        ]"#;
        assert!(library.import(bad).is_err());
        assert_eq!(library.export().unwrap(), before);
    }

    #[test]
    fn test_import_replaces_and_reset_restores() {
        let mut library = PresetLibrary::new();
        library
            .import(r#"[{"id": "solo", "name": "Solo", "systemInstruction": "answer"}]"#)
            .unwrap();
        assert_eq!(library.active().len(), 1);
        assert!(library.active().node("solo").is_some());

        library.reset();
        assert_eq!(library.active().len(), 4);
    }
}
