//! Dependency graph of declared resources.
//!
//! The graph is the output of [`GraphBuilder`](crate::builder::GraphBuilder):
//! every node with its direct dependencies, the reverse (dependents) index,
//! and the declared outputs. It is immutable once built.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use trellis_core::{Config, NodeName, NodeType, Reference};

/// A node in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node name
    pub name: NodeName,
    /// Resource type
    pub kind: NodeType,
    /// Declared configuration, references included
    pub config: Config,
    /// Direct dependencies, in first-reference order
    pub dependencies: IndexSet<NodeName>,
}

/// An edge: `dependent` depends on `dependency`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Node holding the reference
    pub dependent: NodeName,
    /// Node being referenced
    pub dependency: NodeName,
}

impl Edge {
    /// Create a new edge
    #[must_use]
    pub fn new(dependent: NodeName, dependency: NodeName) -> Self {
        Self {
            dependent,
            dependency,
        }
    }
}

/// A built dependency graph
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    name: String,
    nodes: IndexMap<NodeName, Node>,
    dependents: IndexMap<NodeName, IndexSet<NodeName>>,
    outputs: IndexMap<String, Reference>,
}

impl Graph {
    /// Assemble a graph from already validated parts
    pub(crate) fn from_parts(
        name: String,
        nodes: IndexMap<NodeName, Node>,
        outputs: IndexMap<String, Reference>,
    ) -> Self {
        let mut dependents: IndexMap<NodeName, IndexSet<NodeName>> = nodes
            .keys()
            .map(|name| (name.clone(), IndexSet::new()))
            .collect();

        for node in nodes.values() {
            for dependency in &node.dependencies {
                if let Some(set) = dependents.get_mut(dependency) {
                    set.insert(node.name.clone());
                }
            }
        }

        Self {
            name,
            nodes,
            dependents,
            outputs,
        }
    }

    /// Stack name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get node by name
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Get node by declaration index
    #[must_use]
    pub fn node_at(&self, index: usize) -> Option<&Node> {
        self.nodes.get_index(index).map(|(_, node)| node)
    }

    /// Declaration index of a node
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.nodes.get_index_of(name)
    }

    /// Iterate nodes in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Direct dependencies of a node
    #[must_use]
    pub fn dependencies(&self, name: &str) -> Option<&IndexSet<NodeName>> {
        self.nodes.get(name).map(|node| &node.dependencies)
    }

    /// Nodes that directly depend on the given node
    #[must_use]
    pub fn dependents(&self, name: &str) -> Option<&IndexSet<NodeName>> {
        self.dependents.get(name)
    }

    /// All edges, grouped by dependent in declaration order
    #[must_use]
    pub fn edges(&self) -> Vec<Edge> {
        self.nodes
            .values()
            .flat_map(|node| {
                node.dependencies
                    .iter()
                    .map(|dep| Edge::new(node.name.clone(), dep.clone()))
            })
            .collect()
    }

    /// Declared outputs
    #[must_use]
    pub fn outputs(&self) -> &IndexMap<String, Reference> {
        &self.outputs
    }

    /// Source of one declared output
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&Reference> {
        self.outputs.get(name)
    }

    /// Get total node count
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get total edge count
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.dependencies.len()).sum()
    }

    /// Check if graph is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
