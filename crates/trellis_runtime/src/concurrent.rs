//! Concurrent execution engine.
//!
//! A single coordinator owns the store and the per-node counters of
//! outstanding dependencies. Every node whose counter reaches zero becomes
//! ready; ready nodes are launched in plan order onto a tokio `JoinSet`, up to
//! the configured in-flight limit. After the first failure nothing new is
//! launched, calls already in flight run to completion, and the failure is
//! reported.

use crate::aggregate::OutputRecord;
use crate::engine::{planned_nodes, EngineConfig, Execution};
use crate::monitor::ExecutionMonitor;
use crate::provider::AsyncProvider;
use crate::store::RealizedStore;
use futures::FutureExt;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use trellis_core::{GraphError, GraphResult, ProviderError};
use trellis_plan::{Graph, Plan};

/// Concurrent execution engine
#[derive(Debug, Clone, Default)]
pub struct ConcurrentEngine {
    config: EngineConfig,
}

impl ConcurrentEngine {
    /// Create a new concurrent engine
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply a plan and report what happened
    ///
    /// `invoked` in the report lists nodes in launch order, which is plan
    /// order restricted to the nodes that became ready.
    #[instrument(skip_all, fields(stack = graph.name(), nodes = plan.len(), limit = self.config.max_concurrency()))]
    pub async fn run<P>(&self, graph: &Graph, plan: &Plan, provider: Arc<P>) -> Execution
    where
        P: AsyncProvider + 'static,
    {
        let limit = self.config.max_concurrency();
        let mut monitor = ExecutionMonitor::new();
        let mut store = RealizedStore::new();
        let mut invoked = Vec::with_capacity(plan.len());

        let nodes = match planned_nodes(graph, plan) {
            Ok(nodes) => nodes,
            Err(err) => {
                monitor.not_started(plan.len());
                return Execution::finish(monitor, store, invoked, Some(err));
            }
        };

        // Outstanding dependencies per plan position
        let mut pending: Vec<usize> = nodes.iter().map(|n| n.dependencies.len()).collect();
        let mut ready: BTreeSet<usize> = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(position, _)| position)
            .collect();

        let mut tasks = JoinSet::new();
        let mut in_flight: BTreeSet<usize> = BTreeSet::new();
        let mut failure: Option<GraphError> = None;

        loop {
            while failure.is_none() && in_flight.len() < limit {
                let Some(position) = ready.pop_first() else {
                    break;
                };
                let node = nodes[position];
                let config = match store.resolve(node) {
                    Ok(config) => config,
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                };

                debug!(node = %node.name, kind = %node.kind, position, in_flight = in_flight.len(), "launching");
                monitor.started(&node.name, node.kind);
                invoked.push(node.name.clone());
                in_flight.insert(position);

                let provider = Arc::clone(&provider);
                let kind = node.kind;
                tasks.spawn(async move {
                    let result = AssertUnwindSafe(provider.materialize(kind, &config))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| Err(ProviderError::new("provider panicked")));
                    (position, result)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (position, result) = match joined {
                Ok(done) => done,
                Err(err) => {
                    error!(error = %err, "materialization task did not complete");
                    continue;
                }
            };
            in_flight.remove(&position);
            let node = nodes[position];

            match result {
                Ok(value) => {
                    monitor.materialized(&node.name, value.len());
                    if store.insert(node.name.clone(), value).is_err() {
                        warn!(node = %node.name, "node realized twice; keeping the first value");
                    }
                    for dependent in graph.dependents(node.name.as_str()).into_iter().flatten() {
                        let Some(j) = plan.position(dependent.as_str()) else {
                            continue;
                        };
                        pending[j] = pending[j].saturating_sub(1);
                        if pending[j] == 0 {
                            ready.insert(j);
                        }
                    }
                }
                Err(source) => {
                    warn!(node = %node.name, kind = %node.kind, error = %source, "materialization failed");
                    monitor.failed(&node.name, source.message.clone());
                    if failure.is_none() {
                        failure = Some(GraphError::MaterializationFailed {
                            node: node.name.clone(),
                            kind: node.kind,
                            source,
                        });
                    }
                }
            }
        }

        // Positions still marked in flight belong to tasks that never reported back
        if let Some(&position) = in_flight.first() {
            let node = nodes[position];
            let source = ProviderError::new("materialization task did not complete");
            monitor.failed(&node.name, source.message.clone());
            failure.get_or_insert(GraphError::MaterializationFailed {
                node: node.name.clone(),
                kind: node.kind,
                source,
            });
        }

        // A node whose dependency is not planned never becomes ready
        if failure.is_none() && invoked.len() < nodes.len() {
            if let Some(node) = nodes.iter().find(|node| !invoked.contains(&node.name)) {
                let err = match store.resolve(node) {
                    Err(err) => err,
                    Ok(_) => GraphError::UnresolvedReference {
                        node: node.name.clone(),
                        target: node.dependencies.iter().next().cloned().unwrap_or_else(|| node.name.clone()),
                        attribute: String::new(),
                    },
                };
                warn!(node = %node.name, error = %err, "node never became ready");
                failure = Some(err);
            }
        }

        monitor.not_started(nodes.len() - invoked.len());
        info!(
            realized = store.len(),
            planned = plan.len(),
            peak_in_flight = monitor.metrics().peak_in_flight,
            failed = failure.is_some(),
            "concurrent execution finished"
        );
        Execution::finish(monitor, store, invoked, failure)
    }

    /// Apply a plan and aggregate the graph's declared outputs
    ///
    /// # Errors
    ///
    /// Returns `MaterializationFailed` if the provider fails, and the
    /// aggregation errors of [`aggregate`](crate::aggregate::aggregate)
    pub async fn execute<P>(&self, graph: &Graph, plan: &Plan, provider: Arc<P>) -> GraphResult<OutputRecord>
    where
        P: AsyncProvider + 'static,
    {
        self.run(graph, plan, provider).await.outputs(graph)
    }
}
