//! Subcommand implementations.
//!
//! Each command returns the text to print so that it can be tested without
//! capturing stdout.

use crate::config::{self, EngineOverrides};
use color_eyre::eyre::{bail, Result, WrapErr};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use trellis_core::NodeType;
use trellis_plan::{
    plan, AuthorizedLambdaApi, AuthorizedLambdaApiProps, FunctionSpec, Graph, Plan, Stack,
    StackDocument,
};
use trellis_runtime::{
    ChecksumGuard, ConcurrentEngine, EngineMode, Execution, ExecutionEngine, Ledger,
    SimulatedProvider,
};

/// Settings for `trellis apply`
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Engine config file
    pub config: Option<PathBuf>,
    /// Flag overrides
    pub overrides: EngineOverrides,
    /// Node types the simulated provider should fail on
    pub fail_on: Vec<NodeType>,
    /// Ledger file for skip-if-unchanged
    pub state: Option<PathBuf>,
}

/// Load and build a stack document
pub fn load_graph(path: &Path) -> Result<Graph> {
    let document = StackDocument::from_path(path)?;
    let graph = document
        .into_graph()
        .wrap_err_with(|| format!("stack {} is not valid", path.display()))?;
    Ok(graph)
}

fn load_plan(path: &Path) -> Result<(Graph, Plan)> {
    let graph = load_graph(path)?;
    let plan = plan(&graph).wrap_err("cannot order the stack")?;
    Ok((graph, plan))
}

/// `trellis plan`
pub fn plan_command(path: &Path) -> Result<String> {
    let (graph, plan) = load_plan(path)?;
    let mut out = String::new();
    for (position, name) in plan.iter().enumerate() {
        let Some(node) = graph.node(name.as_str()) else {
            continue;
        };
        let dependencies: Vec<&str> = node.dependencies.iter().map(|d| d.as_str()).collect();
        if dependencies.is_empty() {
            writeln!(out, "{:>3}. {} ({})", position + 1, node.name, node.kind)?;
        } else {
            writeln!(
                out,
                "{:>3}. {} ({}) <- {}",
                position + 1,
                node.name,
                node.kind,
                dependencies.join(", ")
            )?;
        }
    }
    Ok(out)
}

/// `trellis graph`
pub fn graph_command(path: &Path) -> Result<String> {
    let graph = load_graph(path)?;
    let mut out = String::new();
    for edge in graph.edges() {
        writeln!(out, "{} -> {}", edge.dependent, edge.dependency)?;
    }
    for (output, source) in graph.outputs() {
        writeln!(out, "output {} = {}", output, source)?;
    }
    Ok(out)
}

/// `trellis apply`
pub async fn apply_command(path: &Path, options: &ApplyOptions) -> Result<String> {
    let (graph, plan) = load_plan(path)?;
    let config = config::load(options.config.as_deref(), options.overrides)?;

    let mut provider = SimulatedProvider::new();
    for kind in &options.fail_on {
        provider = provider.fail_on(*kind);
    }

    let execution = match (config.mode, &options.state) {
        (EngineMode::Concurrent, Some(_)) => {
            bail!("--state needs the sequential engine; drop --concurrent or --state")
        }
        (EngineMode::Concurrent, None) => {
            ConcurrentEngine::new(config)
                .run(&graph, &plan, Arc::new(provider))
                .await
        }
        (EngineMode::Sequential, Some(state)) => {
            let ledger = Ledger::load_or_default(state)?;
            let mut guard = ChecksumGuard::with_ledger(provider, ledger);
            let execution = ExecutionEngine::new(config).run(&graph, &plan, &mut guard);
            info!(
                reused = guard.hits(),
                materialized = guard.misses(),
                state = %state.display(),
                "saving ledger"
            );
            let (_, mut ledger) = guard.into_parts();
            ledger.retain(|node| graph.node(node.as_str()).is_some());
            ledger.save(state)?;
            execution
        }
        (EngineMode::Sequential, None) => ExecutionEngine::new(config).run(&graph, &plan, provider),
    };

    render_outputs(&graph, &execution)
}

fn render_outputs(graph: &Graph, execution: &Execution) -> Result<String> {
    let outputs = execution
        .outputs(graph)
        .wrap_err_with(|| format!("apply of stack '{}' stopped", graph.name()))?;
    Ok(serde_json::to_string_pretty(&outputs)?)
}

/// `trellis example`
pub fn example_command(prefix: &str) -> Result<String> {
    let mut stack = Stack::new(format!("{}-api", prefix));
    let function = FunctionSpec::new(
        prefix,
        format!("{}.handler", prefix.to_lowercase()),
        "nodejs20.x",
        format!("arn:aws:iam::{}:role/{}", SimulatedProvider::DEFAULT_ACCOUNT, prefix),
    )
    .with_filename(format!("src/{}.zip", prefix));
    let api = AuthorizedLambdaApi::declare(&mut stack, prefix, AuthorizedLambdaApiProps::named(prefix, function))?;
    api.declare_outputs(&mut stack)?;
    let graph = stack.build()?;
    Ok(StackDocument::from_graph(&graph).to_json_pretty()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("stack.json");
        std::fs::write(&path, example_command("helloWorld").unwrap()).unwrap();
        path
    }

    #[test]
    fn test_plan_command_lists_every_node() {
        let dir = tempfile::tempdir().unwrap();
        let out = plan_command(&example_file(&dir)).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[0].ends_with("helloWorldLambda (function)"));
        assert!(lines[3].contains("helloWorldAuthorizer (authorizer) <- helloWorldGatewayApi, helloWorldUserPool"));
    }

    #[test]
    fn test_graph_command_prints_edges_and_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let out = graph_command(&example_file(&dir)).unwrap();
        assert!(out.contains("helloWorldGatewayIntegration -> helloWorldLambda"));
        assert!(out.contains("output functionArn = helloWorldLambda.arn"));
    }

    #[tokio::test]
    async fn test_apply_prints_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let out = apply_command(&example_file(&dir), &ApplyOptions::default()).await.unwrap();
        let outputs: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(outputs.as_object().unwrap().len(), 6);
        assert!(outputs["cognitoUserPoolArn"].as_str().unwrap().starts_with("arn:aws:cognito-idp:"));
    }

    #[tokio::test]
    async fn test_apply_concurrent_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let path = example_file(&dir);
        let sequential = apply_command(&path, &ApplyOptions::default()).await.unwrap();
        let concurrent = apply_command(
            &path,
            &ApplyOptions {
                overrides: EngineOverrides {
                    concurrent: true,
                    max_concurrency: Some(2),
                },
                ..ApplyOptions::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(sequential, concurrent);
    }

    #[tokio::test]
    async fn test_apply_failure_then_resume_with_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = example_file(&dir);
        let state = dir.path().join("ledger.json");

        let failing = ApplyOptions {
            fail_on: vec![NodeType::Method],
            state: Some(state.clone()),
            ..ApplyOptions::default()
        };
        let err = apply_command(&path, &failing).await.unwrap_err();
        assert!(format!("{:?}", err).contains("helloWorldGatewayMethod"));
        assert_eq!(Ledger::load(&state).unwrap().len(), 5);

        let resumed = ApplyOptions {
            state: Some(state.clone()),
            ..ApplyOptions::default()
        };
        apply_command(&path, &resumed).await.unwrap();
        assert_eq!(Ledger::load(&state).unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_apply_drops_ledger_entries_of_removed_nodes() {
        use trellis_core::{ConfigDigest, NodeName, RealizedValue, ResolvedConfig};
        use trellis_runtime::LedgerEntry;

        let dir = tempfile::tempdir().unwrap();
        let path = example_file(&dir);
        let state = dir.path().join("ledger.json");

        let mut ledger = Ledger::new();
        let kind = NodeType::Function;
        ledger.record(
            NodeName::new("retiredLambda").unwrap(),
            LedgerEntry {
                kind,
                digest: ConfigDigest::compute(kind, &ResolvedConfig::default()),
                value: RealizedValue::new(),
            },
        );
        ledger.save(&state).unwrap();

        let options = ApplyOptions {
            state: Some(state.clone()),
            ..ApplyOptions::default()
        };
        apply_command(&path, &options).await.unwrap();
        let saved = Ledger::load(&state).unwrap();
        assert_eq!(saved.len(), 7);
        assert!(saved.get("retiredLambda").is_none());
    }

    #[tokio::test]
    async fn test_apply_rejects_state_with_concurrent() {
        let dir = tempfile::tempdir().unwrap();
        let options = ApplyOptions {
            overrides: EngineOverrides {
                concurrent: true,
                max_concurrency: None,
            },
            state: Some(dir.path().join("ledger.json")),
            ..ApplyOptions::default()
        };
        assert!(apply_command(&example_file(&dir), &options).await.is_err());
    }

    #[test]
    fn test_invalid_stack_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.json");
        std::fs::write(
            &path,
            r#"{ "name": "x", "nodes": [ { "name": "a", "type": "method",
                 "config": { "rest_api_id": { "$ref": "ghost.id" } } } ] }"#,
        )
        .unwrap();
        let err = plan_command(&path).unwrap_err();
        assert!(format!("{:?}", err).contains("ghost"));
    }
}
