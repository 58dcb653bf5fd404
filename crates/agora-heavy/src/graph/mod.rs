//! Agent graph: the declarative description of a heavy-mode run.
//!
//! A graph is a list of `AgentNode`s. Each node names the nodes it feeds via
//! `connections`, and every connection must go from a lower `order` to a
//! strictly higher one. `AgentGraph` is the validated, immutable snapshot the
//! engine executes; edits produce new snapshots.

pub mod model;
pub mod node;

pub use model::{check_edge, AgentGraph, DroppedEdge, EdgeRejection};
pub use node::{AgentNode, Position};
