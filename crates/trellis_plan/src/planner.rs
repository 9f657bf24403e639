//! Topological planner.
//!
//! Kahn's algorithm with a deterministic tie-break: whenever several nodes
//! are ready, the one declared first is emitted first. Identical graphs
//! therefore always produce identical plans.

use crate::graph::Graph;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};
use trellis_core::{GraphError, GraphResult, NodeName};

/// A dependency-respecting execution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    order: IndexSet<NodeName>,
}

impl Plan {
    /// Position of a node in the plan
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.get_index_of(name)
    }

    /// Iterate node names in execution order
    pub fn iter(&self) -> impl Iterator<Item = &NodeName> {
        self.order.iter()
    }

    /// Node name at a position
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&NodeName> {
        self.order.get_index(position)
    }

    /// Number of planned nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if the plan is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Node names as plain strings, in order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(NodeName::as_str).collect()
    }
}

/// Compute the execution order of a graph
///
/// # Errors
///
/// Returns `CyclicDependency` naming the nodes of one cycle if the graph is
/// not acyclic. A partial plan is never returned.
pub fn plan(graph: &Graph) -> GraphResult<Plan> {
    let count = graph.node_count();
    let mut in_degree: Vec<usize> = graph.nodes().map(|n| n.dependencies.len()).collect();

    // Ready nodes keyed by declaration index
    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| index)
        .collect();

    let mut order = IndexSet::with_capacity(count);
    while let Some(index) = ready.pop_first() {
        let Some(node) = graph.node_at(index) else {
            break;
        };
        order.insert(node.name.clone());

        for dependent in graph.dependents(node.name.as_str()).into_iter().flatten() {
            let Some(j) = graph.index_of(dependent.as_str()) else {
                continue;
            };
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.insert(j);
            }
        }
    }

    if order.len() < count {
        let cycle = find_cycle(graph, &order);
        warn!(
            stack = graph.name(),
            planned = order.len(),
            total = count,
            cycle = ?cycle.iter().map(NodeName::as_str).collect::<Vec<_>>(),
            "dependency cycle detected"
        );
        return Err(GraphError::CyclicDependency { cycle });
    }

    debug!(stack = graph.name(), nodes = count, "planned graph");
    Ok(Plan { order })
}

/// Find one cycle among the nodes Kahn's algorithm could not place
///
/// Every unplaced node has at least one unplaced dependency, so following
/// the first unplaced dependency from any unplaced node must revisit a node.
fn find_cycle(graph: &Graph, placed: &IndexSet<NodeName>) -> Vec<NodeName> {
    let Some(start) = graph.nodes().find(|n| !placed.contains(&n.name)) else {
        return Vec::new();
    };

    let mut path: IndexSet<NodeName> = IndexSet::new();
    let mut current = start.name.clone();
    loop {
        if let Some(pos) = path.get_index_of(&current) {
            return path.into_iter().skip(pos).collect();
        }
        path.insert(current.clone());

        let next = graph
            .dependencies(current.as_str())
            .and_then(|deps| deps.iter().find(|d| !placed.contains(*d)).cloned());
        match next {
            Some(next) => current = next,
            None => return path.into_iter().collect(),
        }
    }
}
