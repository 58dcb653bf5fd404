use std::collections::BTreeMap;

use crate::graph::{AgentGraph, AgentNode};

/// All agents sharing one `order` value. They run concurrently.
#[derive(Debug, Clone)]
pub struct Rank<'g> {
    pub order: u32,
    pub nodes: Vec<&'g AgentNode>,
}

impl Rank<'_> {
    pub fn ids(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }
}

/// Partition the graph into ranks, ascending by `order`.
///
/// Orders need not be contiguous (1, 3, 7 is fine). Within a rank nodes keep
/// configuration order. An empty graph yields no ranks.
pub fn ranks(graph: &AgentGraph) -> Vec<Rank<'_>> {
    let mut groups: BTreeMap<u32, Vec<&AgentNode>> = BTreeMap::new();
    for node in graph.nodes() {
        groups.entry(node.order).or_default().push(node);
    }

    groups
        .into_iter()
        .map(|(order, nodes)| Rank { order, nodes })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_by_order_ascending() {
        let graph = AgentGraph::new(vec![
            AgentNode::new("late", "Late", "").with_order(3),
            AgentNode::new("a", "A", ""),
            AgentNode::new("b", "B", ""),
            AgentNode::new("mid", "Mid", "").with_order(2),
        ]);

        let ranks = ranks(&graph);
        let orders: Vec<u32> = ranks.iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(ranks[0].ids(), vec!["a", "b"]);
        assert_eq!(ranks[2].ids(), vec!["late"]);
    }

    #[test]
    fn test_sparse_orders() {
        let graph = AgentGraph::new(vec![
            AgentNode::new("x", "X", "").with_order(7),
            AgentNode::new("y", "Y", ""),
            AgentNode::new("z", "Z", "").with_order(3),
        ]);
        let orders: Vec<u32> = ranks(&graph).iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![1, 3, 7]);
    }

    #[test]
    fn test_every_rank_is_homogeneous_and_increasing() {
        let graph = AgentGraph::new(
            (0..20)
                .map(|i| AgentNode::new(format!("n{}", i), "N", "").with_order((i * 7 % 5) + 1))
                .collect(),
        );
        let ranks = ranks(&graph);
        assert_eq!(ranks.iter().map(|r| r.nodes.len()).sum::<usize>(), 20);
        for pair in ranks.windows(2) {
            assert!(pair[0].order < pair[1].order);
        }
        for rank in &ranks {
            assert!(rank.nodes.iter().all(|n| n.order == rank.order));
        }
    }

    #[test]
    fn test_empty_graph_has_no_ranks() {
        assert!(ranks(&AgentGraph::default()).is_empty());
    }
}
