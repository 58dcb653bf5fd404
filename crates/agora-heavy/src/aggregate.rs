use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use agora_core::types::ModelTier;

use crate::graph::AgentGraph;

/// Final text when no terminal agent produced output. Not an error: the
/// graph may have no terminals, or be empty.
pub const NO_FINAL_OUTPUT: &str = "Heavy mode finished, but no agent produced a final output.";

/// One agent's response, kept for display and audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_id: String,
    pub name: String,
    pub order: u32,
    pub model: ModelTier,
    pub text: String,
    pub elapsed_ms: u64,
}

/// Merge terminal agents' outputs into the final answer.
///
/// One terminal output is returned verbatim; several become labeled sections
/// in terminal discovery order.
pub fn aggregate(graph: &AgentGraph, outputs: &HashMap<String, String>) -> String {
    let finals: Vec<(&str, &str)> = graph
        .terminals()
        .into_iter()
        .filter_map(|node| {
            outputs
                .get(&node.id)
                .map(|text| (node.name.as_str(), text.as_str()))
        })
        .collect();

    match finals.as_slice() {
        [] => NO_FINAL_OUTPUT.to_string(),
        [(_, text)] => text.to_string(),
        many => many
            .iter()
            .map(|(name, text)| format!("### {}\n\n{}", name, text))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}
