use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, error, info};

use agora_core::error::{AgoraError, Result};
use agora_core::event::EventBus;
use agora_core::traits::Generator;
use agora_core::types::{ChatMessage, GenerationRequest, HeavyEvent, RunId};

use crate::aggregate::{aggregate, AgentResponse};
use crate::compose::{compose_input, history_window};
use crate::graph::{AgentGraph, AgentNode};
use crate::schedule::{ranks, Rank};

/// Where a run is in its rank-by-rank progression.
///
/// `Failed` is absorbing: once entered, no further rank starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    RunningRank(u32),
    Completed,
    Failed,
}

/// Successful result of a heavy-mode run.
#[derive(Debug, Clone)]
pub struct HeavyResponse {
    pub run_id: RunId,
    /// Merged output of the terminal agents.
    pub final_text: String,
    /// Every executed agent's response, in rank order then configuration order.
    pub agent_responses: Vec<AgentResponse>,
    pub elapsed_ms: u64,
}

/// Drives a heavy-mode run over an `AgentGraph`.
///
/// Ranks run strictly one after another. All agents in a rank are issued
/// together and the coordinator waits for every call to settle before
/// looking at the results. Any failure aborts the run: outputs from the
/// failing rank are discarded and no later rank starts. Nothing is retried.
pub struct HeavyCoordinator {
    generator: Arc<dyn Generator>,
    event_bus: Option<Arc<EventBus>>,
}

impl HeavyCoordinator {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            event_bus: None,
        }
    }

    /// Publish progress events on `bus` during runs.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Run `query` through `graph`.
    ///
    /// `history` is the conversation before this query; each agent sees the
    /// window its `context_messages` allows. Each call owns its own run
    /// state, so runs never share outputs.
    pub async fn run(
        &self,
        query: &str,
        history: &[ChatMessage],
        graph: &AgentGraph,
    ) -> Result<HeavyResponse> {
        let mut run = Run::new(self.generator.as_ref(), self.event_bus.as_deref());
        run.execute(query, history, graph).await
    }
}

/// Run `query` through `graph` without progress events.
pub async fn run_heavy_mode(
    generator: Arc<dyn Generator>,
    query: &str,
    history: &[ChatMessage],
    graph: &AgentGraph,
) -> Result<HeavyResponse> {
    HeavyCoordinator::new(generator).run(query, history, graph).await
}

/// State owned by a single run.
struct Run<'a> {
    id: RunId,
    generator: &'a dyn Generator,
    events: Option<&'a EventBus>,
    state: RunState,
    outputs: HashMap<String, String>,
    responses: Vec<AgentResponse>,
}

struct Settled<'g> {
    node: &'g AgentNode,
    result: Result<String>,
    elapsed_ms: u64,
}

impl<'a> Run<'a> {
    fn new(generator: &'a dyn Generator, events: Option<&'a EventBus>) -> Self {
        Self {
            id: RunId::new(),
            generator,
            events,
            state: RunState::Pending,
            outputs: HashMap::new(),
            responses: Vec::new(),
        }
    }

    fn publish(&self, event: HeavyEvent) {
        if let Some(bus) = self.events {
            bus.publish(event);
        }
    }

    fn transition(&mut self, next: RunState) {
        debug!(run_id = %self.id, from = ?self.state, to = ?next, "Run state change");
        self.state = next;
    }

    async fn execute(
        &mut self,
        query: &str,
        history: &[ChatMessage],
        graph: &AgentGraph,
    ) -> Result<HeavyResponse> {
        let start = Instant::now();
        let ranks = ranks(graph);

        info!(
            run_id = %self.id,
            agents = graph.len(),
            ranks = ranks.len(),
            dropped_edges = graph.dropped_edges().len(),
            "Starting heavy mode run"
        );
        self.publish(HeavyEvent::RunStarted {
            run_id: self.id.clone(),
            ranks: ranks.len(),
        });

        for rank in &ranks {
            if let Err(e) = self.run_rank(query, history, graph, rank).await {
                self.transition(RunState::Failed);
                self.publish(HeavyEvent::RunFailed {
                    run_id: self.id.clone(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        }

        self.transition(RunState::Completed);
        let final_text = aggregate(graph, &self.outputs);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            run_id = %self.id,
            responses = self.responses.len(),
            elapsed_ms,
            "Heavy mode run complete"
        );
        self.publish(HeavyEvent::RunCompleted {
            run_id: self.id.clone(),
            elapsed_ms,
        });

        Ok(HeavyResponse {
            run_id: self.id.clone(),
            final_text,
            agent_responses: std::mem::take(&mut self.responses),
            elapsed_ms,
        })
    }

    /// Execute one rank behind a join barrier.
    ///
    /// Inputs are composed before any call is issued, from outputs of lower
    /// ranks only. Outputs are recorded only if every call in the rank
    /// succeeded.
    async fn run_rank<'g>(
        &mut self,
        query: &str,
        history: &[ChatMessage],
        graph: &'g AgentGraph,
        rank: &Rank<'g>,
    ) -> Result<()> {
        self.transition(RunState::RunningRank(rank.order));
        info!(run_id = %self.id, order = rank.order, agents = rank.nodes.len(), "Running rank");
        self.publish(HeavyEvent::RankStarted {
            run_id: self.id.clone(),
            order: rank.order,
            agents: rank.ids(),
        });

        let requests: Vec<(&'g AgentNode, GenerationRequest)> = rank
            .nodes
            .iter()
            .map(|&node| {
                let request = GenerationRequest {
                    tier: node.model,
                    system_instruction: node.system_instruction.clone(),
                    prior_turns: history_window(history, node.context_messages).to_vec(),
                    new_turn: compose_input(query, node, graph, &self.outputs),
                };
                (node, request)
            })
            .collect();

        let generator = self.generator;
        let calls = requests.into_iter().map(|(node, request)| async move {
            let started = Instant::now();
            let result = generator.generate(request).await;
            Settled {
                node,
                result,
                elapsed_ms: started.elapsed().as_millis() as u64,
            }
        });
        let settled: Vec<Settled<'g>> = join_all(calls).await;

        let mut first_failure: Option<AgoraError> = None;
        let mut succeeded = Vec::with_capacity(settled.len());

        for Settled {
            node,
            result,
            elapsed_ms,
        } in settled
        {
            match result {
                Ok(text) => {
                    debug!(run_id = %self.id, agent_id = %node.id, elapsed_ms, "Agent finished");
                    self.publish(HeavyEvent::AgentFinished {
                        run_id: self.id.clone(),
                        agent_id: node.id.clone(),
                        name: node.name.clone(),
                        elapsed_ms,
                    });
                    succeeded.push(AgentResponse {
                        agent_id: node.id.clone(),
                        name: node.name.clone(),
                        order: node.order,
                        model: node.model,
                        text,
                        elapsed_ms,
                    });
                }
                Err(e) => {
                    error!(run_id = %self.id, agent_id = %node.id, error = %e, "Agent failed");
                    self.publish(HeavyEvent::AgentFailed {
                        run_id: self.id.clone(),
                        agent_id: node.id.clone(),
                        name: node.name.clone(),
                        error: e.to_string(),
                    });
                    if first_failure.is_none() {
                        first_failure = Some(AgoraError::HeavyRun {
                            agent_id: node.id.clone(),
                            agent_name: node.name.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        if let Some(failure) = first_failure {
            return Err(failure);
        }

        for response in succeeded {
            self.outputs
                .insert(response.agent_id.clone(), response.text.clone());
            self.responses.push(response);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::Mutex;

    /// Answers `"<id> done"`, using the system instruction as the agent id.
    /// Fails for instructions listed in `fail`.
    struct Scripted {
        fail: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(fail: Vec<&'static str>) -> Self {
            Self {
                fail,
                calls: Mutex::new(vec![]),
            }
        }
    }

    impl Generator for Scripted {
        fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
            Box::pin(async move {
                let id = request.system_instruction.clone();
                self.calls.lock().unwrap().push(id.clone());
                if self.fail.contains(&id.as_str()) {
                    Err(AgoraError::LlmRequest("HTTP 500".into()))
                } else {
                    Ok(format!("{} done", id))
                }
            })
        }
    }

    fn node(id: &str, order: u32) -> AgentNode {
        AgentNode::new(id, id.to_uppercase(), id).with_order(order)
    }

    #[tokio::test]
    async fn test_run_state_reaches_completed() {
        let generator = Scripted::new(vec![]);
        let graph = AgentGraph::new(vec![node("a", 1)]);
        let mut run = Run::new(&generator, None);
        assert_eq!(run.state, RunState::Pending);

        let response = run.execute("q", &[], &graph).await.unwrap();
        assert_eq!(run.state, RunState::Completed);
        assert_eq!(response.final_text, "a done");
    }

    #[tokio::test]
    async fn test_failure_is_absorbing() {
        let generator = Scripted::new(vec!["a"]);
        let graph = AgentGraph::new(vec![node("a", 1).connect_to("b"), node("b", 2)]);
        let mut run = Run::new(&generator, None);

        let err = run.execute("q", &[], &graph).await.unwrap_err();
        assert_eq!(run.state, RunState::Failed);
        assert!(run.outputs.is_empty());
        assert!(matches!(err, AgoraError::HeavyRun { ref agent_id, .. } if agent_id == "a"));
        assert_eq!(*generator.calls.lock().unwrap(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_first_failure_in_rank_order_is_reported() {
        let generator = Scripted::new(vec!["c", "b"]);
        let graph = AgentGraph::new(vec![node("a", 1), node("b", 1), node("c", 1)]);
        let mut run = Run::new(&generator, None);

        let err = run.execute("q", &[], &graph).await.unwrap_err();
        assert!(matches!(err, AgoraError::HeavyRun { ref agent_id, .. } if agent_id == "b"));
        // All three settled before the rank was judged.
        assert_eq!(generator.calls.lock().unwrap().len(), 3);
        assert!(run.responses.is_empty());
    }

    #[tokio::test]
    async fn test_empty_graph_completes_with_fallback() {
        let generator = Scripted::new(vec![]);
        let mut run = Run::new(&generator, None);
        let response = run.execute("q", &[], &AgentGraph::default()).await.unwrap();
        assert_eq!(run.state, RunState::Completed);
        assert_eq!(response.final_text, crate::aggregate::NO_FINAL_OUTPUT);
        assert!(response.agent_responses.is_empty());
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let coordinator =
            HeavyCoordinator::new(Arc::new(Scripted::new(vec![]))).with_events(bus.clone());
        let graph = AgentGraph::new(vec![node("a", 1).connect_to("b"), node("b", 2)]);

        coordinator.run("q", &[], &graph).await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event {
                HeavyEvent::RunStarted { .. } => "run_started",
                HeavyEvent::RankStarted { .. } => "rank_started",
                HeavyEvent::AgentFinished { .. } => "agent_finished",
                HeavyEvent::AgentFailed { .. } => "agent_failed",
                HeavyEvent::RunCompleted { .. } => "run_completed",
                HeavyEvent::RunFailed { .. } => "run_failed",
            });
        }
        assert_eq!(
            kinds,
            vec![
                "run_started",
                "rank_started",
                "agent_finished",
                "rank_started",
                "agent_finished",
                "run_completed"
            ]
        );
    }
}
