//! Heavy mode: a graph of model-backed agents answering one query together.
//!
//! Agents are grouped into ranks by their `order`. Ranks run one after
//! another; agents within a rank run concurrently and see the outputs of
//! their parents from earlier ranks. The outputs of terminal agents become
//! the final answer.

pub mod aggregate;
pub mod chat;
pub mod compose;
pub mod coordinator;
pub mod graph;
pub mod preset;
pub mod schedule;

pub use aggregate::{aggregate, AgentResponse, NO_FINAL_OUTPUT};
pub use chat::{ChatReply, ChatSession};
pub use compose::{compose_input, history_window};
pub use coordinator::{run_heavy_mode, HeavyCoordinator, HeavyResponse, RunState};
pub use graph::{AgentGraph, AgentNode, DroppedEdge, EdgeRejection, Position};
pub use preset::{
    default_agents, default_graph, export_preset, load_preset, parse_preset, PresetLibrary,
};
pub use schedule::{ranks, Rank};
