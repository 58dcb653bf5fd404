use std::collections::HashMap;

use agora_core::types::ChatMessage;

use crate::graph::{AgentGraph, AgentNode};

/// Build the new user turn for `node`.
///
/// Agents with no upstream output get the raw query. Otherwise the turn
/// restates the query, lists every parent's output under the parent's name
/// (parent order as reported by the graph), and closes with an instruction
/// to act on the agent's role. Pure: the same query and outputs always give
/// the same text.
pub fn compose_input(
    query: &str,
    node: &AgentNode,
    graph: &AgentGraph,
    outputs: &HashMap<String, String>,
) -> String {
    let inputs: Vec<(&str, &str)> = graph
        .parents(&node.id)
        .into_iter()
        .filter_map(|parent| {
            outputs
                .get(&parent.id)
                .map(|text| (parent.name.as_str(), text.as_str()))
        })
        .collect();

    if inputs.is_empty() {
        return query.to_string();
    }

    let mut prompt = String::new();
    prompt.push_str("## Original Request\n\n");
    prompt.push_str(query);
    prompt.push_str("\n\n## Inputs From Other Agents\n\n");
    for (name, text) in inputs {
        prompt.push_str(&format!("### {}\n\n{}\n\n", name, text));
    }
    prompt.push_str("---\n\n");
    prompt.push_str(
        "Using the inputs above, carry out your role and respond to the original request.",
    );
    prompt
}

/// The slice of prior conversation an agent may see.
///
/// `context_messages == 0` means the whole history; otherwise the last
/// `context_messages` turns.
pub fn history_window(history: &[ChatMessage], context_messages: usize) -> &[ChatMessage] {
    if context_messages == 0 || context_messages >= history.len() {
        history
    } else {
        &history[history.len() - context_messages..]
    }
}
