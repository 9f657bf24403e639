//! Sequential execution engine.
//!
//! Walks a plan in order, substitutes references from already realized
//! values, and hands each resolved config to the provider. The first failure
//! stops the walk: nothing after it is invoked and nothing before it is
//! undone.

use crate::aggregate::{aggregate_all, OutputRecord};
use crate::monitor::{ExecutionEvent, ExecutionMonitor, Metrics};
use crate::provider::Provider;
use crate::store::RealizedStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use trellis_core::{GraphError, GraphResult, NodeName};
use trellis_plan::{Graph, Node, Plan};

/// Which engine applies a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// One node at a time, in plan order
    #[default]
    Sequential,
    /// Independent nodes in parallel, see [`ConcurrentEngine`](crate::concurrent::ConcurrentEngine)
    Concurrent,
}

/// Execution engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Engine selection
    pub mode: EngineMode,
    /// Most provider calls in flight at once (concurrent mode only)
    pub max_concurrency: usize,
}

impl EngineConfig {
    /// Default in-flight limit
    pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

    /// Effective in-flight limit, never below one
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: EngineMode::Sequential,
            max_concurrency: Self::DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Report of one engine run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Execution {
    /// Values realized before the run ended
    pub store: RealizedStore,
    /// Nodes the provider was called for, in call order
    pub invoked: Vec<NodeName>,
    /// Event log
    pub events: Vec<ExecutionEvent>,
    /// Run metrics
    pub metrics: Metrics,
    /// The error that stopped the run
    #[serde(skip)]
    pub failure: Option<GraphError>,
}

impl Execution {
    pub(crate) fn finish(
        monitor: ExecutionMonitor,
        store: RealizedStore,
        invoked: Vec<NodeName>,
        failure: Option<GraphError>,
    ) -> Self {
        let (metrics, events) = monitor.finish();
        Self {
            store,
            invoked,
            events,
            metrics,
            failure,
        }
    }

    /// Check whether every planned node was realized
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Aggregate the graph's declared outputs
    ///
    /// # Errors
    ///
    /// Returns the run's failure if there was one, otherwise any aggregation
    /// error
    pub fn outputs(&self, graph: &Graph) -> GraphResult<OutputRecord> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        aggregate_all(graph, &self.store)
    }
}

/// Look up every planned node in the graph, before anything runs
pub(crate) fn planned_nodes<'g>(graph: &'g Graph, plan: &Plan) -> GraphResult<Vec<&'g Node>> {
    plan.iter()
        .map(|name| {
            graph
                .node(name.as_str())
                .ok_or_else(|| GraphError::UnknownReference {
                    referrer: format!("plan for stack '{}'", graph.name()),
                    target: name.clone(),
                    attribute: String::new(),
                })
        })
        .collect()
}

/// Sequential execution engine
#[derive(Debug, Clone, Default)]
pub struct ExecutionEngine {
    config: EngineConfig,
}

impl ExecutionEngine {
    /// Create a new execution engine
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
    /// Never panics on provider failure; the failure is returned in the
    /// report together with everything realized before it.
    #[instrument(skip_all, fields(stack = graph.name(), nodes = plan.len()))]
    pub fn run<P: Provider>(&self, graph: &Graph, plan: &Plan, mut provider: P) -> Execution {
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

        let mut failure = None;
        for (position, node) in nodes.iter().enumerate() {
            let config = match store.resolve(node) {
                Ok(config) => config,
                Err(err) => {
                    monitor.not_started(nodes.len() - position);
                    failure = Some(err);
                    break;
                }
            };

            debug!(node = %node.name, kind = %node.kind, position, "materializing");
            monitor.started(&node.name, node.kind);
            invoked.push(node.name.clone());

            match provider.materialize_node(&node.name, node.kind, &config) {
                Ok(value) => {
                    monitor.materialized(&node.name, value.len());
                    if store.insert(node.name.clone(), value).is_err() {
                        warn!(node = %node.name, "node realized twice; keeping the first value");
                    }
                }
                Err(source) => {
                    warn!(node = %node.name, kind = %node.kind, error = %source, "materialization failed");
                    monitor.failed(&node.name, source.message.clone());
                    monitor.not_started(nodes.len() - position - 1);
                    failure = Some(GraphError::MaterializationFailed {
                        node: node.name.clone(),
                        kind: node.kind,
                        source,
                    });
                    break;
                }
            }
        }

        info!(
            realized = store.len(),
            planned = plan.len(),
            failed = failure.is_some(),
            elapsed_ms = monitor.elapsed().as_millis() as u64,
            "execution finished"
        );
        Execution::finish(monitor, store, invoked, failure)
    }

    /// Apply a plan and aggregate the graph's declared outputs
    ///
    /// # Errors
    ///
    /// Returns `MaterializationFailed` if the provider fails, and the
    /// aggregation errors of [`aggregate`](crate::aggregate::aggregate)
    pub fn execute<P: Provider>(&self, graph: &Graph, plan: &Plan, provider: P) -> GraphResult<OutputRecord> {
        self.run(graph, plan, provider).outputs(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedProvider;
    use proptest::prelude::*;
    use trellis_core::{Config, NodeType, ProviderError, RealizedValue, Reference, ResolvedConfig, Value};
    use trellis_plan::{plan, AuthorizedLambdaApi, AuthorizedLambdaApiProps, FunctionSpec, Stack};

    /// Fails on the call with the given index, echoes otherwise
    struct FailAt {
        fail_at: Option<usize>,
        calls: usize,
    }

    impl FailAt {
        fn new(fail_at: Option<usize>) -> Self {
            Self { fail_at, calls: 0 }
        }
    }

    impl Provider for FailAt {
        fn materialize(
            &mut self,
            _kind: NodeType,
            config: &ResolvedConfig,
        ) -> Result<RealizedValue, ProviderError> {
            let call = self.calls;
            self.calls += 1;
            if Some(call) == self.fail_at {
                return Err(ProviderError::new("quota exceeded"));
            }
            Ok(RealizedValue::echo(config).with("id", format!("id-{}", call)))
        }
    }

    fn hello_world() -> Graph {
        let mut stack = Stack::new("cognito-api-lambda");
        let function = FunctionSpec::new(
            "helloWorld",
            "helloworld.handler",
            "nodejs20.x",
            "arn:aws:iam::123456789012:role/helloWorld",
        );
        let api = AuthorizedLambdaApi::declare(
            &mut stack,
            "helloWorld",
            AuthorizedLambdaApiProps::named("helloWorld", function),
        )
        .unwrap();
        api.declare_outputs(&mut stack).unwrap();
        stack.build().unwrap()
    }

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.mode, EngineMode::Sequential);
        assert_eq!(config.max_concurrency(), 4);
    }

    #[test]
    fn test_engine_config_from_json() {
        let config: EngineConfig = serde_json::from_str(r#"{ "mode": "concurrent" }"#).unwrap();
        assert_eq!(config.mode, EngineMode::Concurrent);
        assert_eq!(config.max_concurrency, 4);

        let zero: EngineConfig = serde_json::from_str(r#"{ "max_concurrency": 0 }"#).unwrap();
        assert_eq!(zero.max_concurrency(), 1);

        assert!(serde_json::from_str::<EngineConfig>(r#"{ "workers": 2 }"#).is_err());
    }

    #[test]
    fn test_run_empty_plan() {
        let graph = Stack::new("empty").build().unwrap();
        let plan = plan(&graph).unwrap();
        let execution = ExecutionEngine::default().run(&graph, &plan, FailAt::new(None));
        assert!(execution.is_success());
        assert!(execution.invoked.is_empty());
        assert!(execution.outputs(&graph).unwrap().is_empty());
    }

    #[test]
    fn test_execute_authorized_lambda_api() {
        let graph = hello_world();
        let plan = plan(&graph).unwrap();
        let mut provider = SimulatedProvider::new();
        let outputs = ExecutionEngine::default()
            .execute(&graph, &plan, &mut provider)
            .unwrap();

        let names: Vec<_> = outputs.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec![
                "functionArn",
                "apiGatewayApiArn",
                "cognitoUserPoolArn",
                "apiGatewayAuthorizerId",
                "apiGatewayResourceId",
                "apiGatewayMethodId",
            ]
        );
        let function_arn = outputs["functionArn"].as_str().unwrap();
        assert!(function_arn.starts_with("arn:aws:lambda:"));
        assert_eq!(provider.call_count(), 7);
    }

    #[test]
    fn test_references_are_substituted() {
        let graph = hello_world();
        let plan = plan(&graph).unwrap();
        let execution = ExecutionEngine::default().run(&graph, &plan, SimulatedProvider::new());
        assert!(execution.is_success());

        let store = &execution.store;
        let api = store.get("helloWorldGatewayApi").unwrap();
        let function = store.get("helloWorldLambda").unwrap();
        let integration = store.get("helloWorldGatewayIntegration").unwrap();
        assert_eq!(integration.get("rest_api_id"), api.get("id"));
        assert_eq!(integration.get("uri"), function.get("invoke_arn"));
        assert_eq!(integration.get("http_method"), Some(&Value::from("GET")));
    }

    #[test]
    fn test_failure_stops_the_walk() {
        let graph = hello_world();
        let plan = plan(&graph).unwrap();
        let mut provider = SimulatedProvider::new().fail_on(NodeType::Authorizer);
        let execution = ExecutionEngine::default().run(&graph, &plan, &mut provider);

        let invoked: Vec<_> = execution.invoked.iter().map(NodeName::as_str).collect();
        assert_eq!(
            invoked,
            vec!["helloWorldLambda", "helloWorldGatewayApi", "helloWorldUserPool", "helloWorldAuthorizer"]
        );
        assert_eq!(execution.store.len(), 3);
        assert_eq!(execution.metrics.nodes_not_started, 3);
        assert_eq!(provider.call_count(), 4);

        let Some(GraphError::MaterializationFailed { node, kind, .. }) = &execution.failure else {
            panic!("expected materialization failure");
        };
        assert_eq!(node.as_str(), "helloWorldAuthorizer");
        assert_eq!(*kind, NodeType::Authorizer);
        assert!(matches!(
            execution.outputs(&graph),
            Err(GraphError::MaterializationFailed { .. })
        ));
        // Outputs sourced from nodes realized before the failure still resolve
        let early = crate::aggregate::aggregate(&graph, &execution.store, &["functionArn"]).unwrap();
        assert_eq!(early.len(), 1);
    }

    #[test]
    fn test_missing_attribute_from_provider() {
        struct Bare;
        impl Provider for Bare {
            fn materialize(
                &mut self,
                _kind: NodeType,
                _config: &ResolvedConfig,
            ) -> Result<RealizedValue, ProviderError> {
                Ok(RealizedValue::new())
            }
        }

        let mut stack = Stack::new("demo");
        stack.declare("api", NodeType::RestApi, Config::new()).unwrap();
        stack
            .declare(
                "res",
                NodeType::Resource,
                Config::new().with("rest_api_id", Reference::to("api", "id").unwrap()),
            )
            .unwrap();
        let graph = stack.build().unwrap();
        let plan = plan(&graph).unwrap();

        let execution = ExecutionEngine::default().run(&graph, &plan, Bare);
        assert_eq!(execution.invoked.len(), 1);
        assert!(matches!(
            execution.failure,
            Some(GraphError::MissingAttribute { ref attribute, .. }) if attribute == "id"
        ));
    }

    #[test]
    fn test_plan_from_other_graph_rejected_before_any_call() {
        let graph = hello_world();
        let mut other = Stack::new("other");
        other.declare("stranger", NodeType::Function, Config::new()).unwrap();
        let other = other.build().unwrap();
        let foreign_plan = plan(&other).unwrap();

        let mut provider = SimulatedProvider::new();
        let execution = ExecutionEngine::default().run(&graph, &foreign_plan, &mut provider);
        assert!(execution.invoked.is_empty());
        assert_eq!(provider.call_count(), 0);
        assert!(matches!(execution.failure, Some(GraphError::UnknownReference { .. })));
    }

    /// Random DAG with edges to earlier nodes only; node `n<i>` backs output `out_<i>`
    fn random_graph(n: usize, edges: &[(usize, usize)]) -> Graph {
        let mut stack = Stack::new("prop");
        for i in 0..n {
            let config: Config = edges
                .iter()
                .map(|&(a, b)| (a % n, b % n))
                .filter(|&(a, b)| a == i && b < a)
                .enumerate()
                .map(|(k, (_, b))| {
                    (
                        format!("d{}", k),
                        Value::from(Reference::to(&format!("n{}", b), "id").unwrap()),
                    )
                })
                .collect();
            stack.declare(&format!("n{}", i), NodeType::Resource, config).unwrap();
            stack
                .output(format!("out_{}", i), Reference::to(&format!("n{}", i), "id").unwrap())
                .unwrap();
        }
        stack.build().unwrap()
    }

    proptest! {
        #[test]
        fn prop_failure_at_k_stops_everything_after(
            n in 1usize..16,
            edges in proptest::collection::vec((0usize..16, 0usize..16), 0..40),
            k in 0usize..16,
        ) {
            let k = k % n;
            let graph = random_graph(n, &edges);
            let plan = plan(&graph).unwrap();
            let execution = ExecutionEngine::default().run(&graph, &plan, FailAt::new(Some(k)));

            let expected: Vec<&str> = plan.names()[..=k].to_vec();
            let invoked: Vec<&str> = execution.invoked.iter().map(NodeName::as_str).collect();
            prop_assert_eq!(invoked, expected);
            prop_assert_eq!(execution.store.len(), k);

            let failed = plan.get(k).unwrap();
            let failure_node = execution.failure.as_ref().and_then(GraphError::node);
            prop_assert_eq!(failure_node, Some(failed));

            for (position, name) in plan.iter().enumerate() {
                let output = format!("out_{}", &name.as_str()[1..]);
                let result = crate::aggregate::aggregate(&graph, &execution.store, &[output.as_str()]);
                if position < k {
                    prop_assert!(result.is_ok());
                } else {
                    let unresolved = matches!(result, Err(GraphError::UnresolvedOutput { .. }));
                    prop_assert!(unresolved);
                }
            }
        }

        #[test]
        fn prop_every_node_invoked_once_without_failure(
            n in 1usize..16,
            edges in proptest::collection::vec((0usize..16, 0usize..16), 0..40),
        ) {
            let graph = random_graph(n, &edges);
            let plan = plan(&graph).unwrap();
            let execution = ExecutionEngine::default().run(&graph, &plan, FailAt::new(None));
            prop_assert!(execution.is_success());
            prop_assert_eq!(execution.invoked.len(), n);
            prop_assert_eq!(execution.outputs(&graph).unwrap().len(), n);
        }
    }
}
