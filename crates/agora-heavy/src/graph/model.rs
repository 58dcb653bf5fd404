use std::collections::HashMap;

use tracing::warn;

use agora_core::error::{AgoraError, Result};

use super::node::AgentNode;

/// Why an edge was left out of the effective graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeRejection {
    /// Target rank is not strictly greater than the source rank.
    NotForward { from_order: u32, to_order: u32 },
    /// Target id does not name a node in the snapshot.
    UnknownTarget,
}

impl std::fmt::Display for EdgeRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotForward {
                from_order,
                to_order,
            } => write!(
                f,
                "target order {} is not greater than source order {}",
                to_order, from_order
            ),
            Self::UnknownTarget => f.write_str("target agent does not exist"),
        }
    }
}

/// An edge removed while validating a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedEdge {
    pub from: String,
    pub to: String,
    pub reason: EdgeRejection,
}

/// Check the order-monotonic edge invariant for `from -> to`.
pub fn check_edge(
    from: &AgentNode,
    to: Option<&AgentNode>,
) -> std::result::Result<(), EdgeRejection> {
    let to = to.ok_or(EdgeRejection::UnknownTarget)?;
    if from.order < to.order {
        Ok(())
    } else {
        Err(EdgeRejection::NotForward {
            from_order: from.order,
            to_order: to.order,
        })
    }
}

/// Immutable snapshot of the agent graph used for one run.
///
/// Construction re-validates every edge: connections that point backward or
/// sideways in rank, or at unknown ids, are dropped. Because every surviving
/// edge goes strictly up in `order`, ascending-rank execution is a valid
/// topological order and no cycle check is needed.
///
/// Node iteration order is the configuration order and drives parent and
/// terminal ordering.
#[derive(Debug, Clone, Default)]
pub struct AgentGraph {
    nodes: Vec<AgentNode>,
    index: HashMap<String, usize>,
    dropped: Vec<DroppedEdge>,
}

impl AgentGraph {
    pub fn new(nodes: Vec<AgentNode>) -> Self {
        let mut kept: Vec<AgentNode> = Vec::with_capacity(nodes.len());
        let mut index = HashMap::with_capacity(nodes.len());

        for node in nodes {
            if index.contains_key(&node.id) {
                warn!(agent_id = %node.id, "Duplicate agent id, keeping the first definition");
                continue;
            }
            index.insert(node.id.clone(), kept.len());
            kept.push(node);
        }

        let mut dropped = Vec::new();
        let mut effective: Vec<Vec<String>> = Vec::with_capacity(kept.len());

        for node in &kept {
            let mut targets: Vec<String> = Vec::with_capacity(node.connections.len());
            for target in &node.connections {
                if targets.contains(target) {
                    continue;
                }
                let target_node = index.get(target).map(|&i| &kept[i]);
                match check_edge(node, target_node) {
                    Ok(()) => targets.push(target.clone()),
                    Err(reason) => {
                        warn!(
                            from = %node.id,
                            to = %target,
                            reason = %reason,
                            "Dropping invalid agent connection"
                        );
                        dropped.push(DroppedEdge {
                            from: node.id.clone(),
                            to: target.clone(),
                            reason,
                        });
                    }
                }
            }
            effective.push(targets);
        }

        for (node, targets) in kept.iter_mut().zip(effective) {
            node.connections = targets;
        }

        Self {
            nodes: kept,
            index,
            dropped,
        }
    }

    /// All nodes in configuration order, with only effective connections.
    pub fn nodes(&self) -> &[AgentNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&AgentNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct parents of `id`: nodes whose effective connections contain it.
    pub fn parents(&self, id: &str) -> Vec<&AgentNode> {
        self.nodes
            .iter()
            .filter(|n| n.connections.iter().any(|c| c == id))
            .collect()
    }

    /// Nodes without outgoing connections. Their outputs form the final answer.
    pub fn terminals(&self) -> Vec<&AgentNode> {
        self.nodes
            .iter()
            .filter(|n| n.connections.is_empty())
            .collect()
    }

    /// Edges removed when this snapshot was built.
    pub fn dropped_edges(&self) -> &[DroppedEdge] {
        &self.dropped
    }

    /// New snapshot with an extra `from -> to` edge.
    ///
    /// Fails with `InvalidGraphEdge` when the edge would break the ordering
    /// invariant; `self` is never modified.
    pub fn connect(&self, from: &str, to: &str) -> Result<AgentGraph> {
        let source = self.node(from).ok_or_else(|| AgoraError::InvalidGraphEdge {
            from: from.to_string(),
            to: to.to_string(),
            reason: "source agent does not exist".into(),
        })?;

        check_edge(source, self.node(to)).map_err(|reason| AgoraError::InvalidGraphEdge {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
        })?;

        let mut nodes = self.nodes.clone();
        let i = self.index[from];
        if !nodes[i].connections.iter().any(|c| c == to) {
            nodes[i].connections.push(to.to_string());
        }
        Ok(AgentGraph::new(nodes))
    }

    /// New snapshot without the `from -> to` edge.
    pub fn disconnect(&self, from: &str, to: &str) -> AgentGraph {
        let mut nodes = self.nodes.clone();
        if let Some(&i) = self.index.get(from) {
            nodes[i].connections.retain(|c| c != to);
        }
        AgentGraph::new(nodes)
    }

    pub fn into_nodes(self) -> Vec<AgentNode> {
        self.nodes
    }
}

impl From<Vec<AgentNode>> for AgentGraph {
    fn from(nodes: Vec<AgentNode>) -> Self {
        Self::new(nodes)
    }
}
