//! Dependency graph builder.

use crate::declare::Declaration;
use crate::graph::{Graph, Node};
use crate::resolve::resolve_references;
use indexmap::{IndexMap, IndexSet};
use tracing::debug;
use trellis_core::{GraphError, GraphResult, NodeName, Reference};

/// Builds a [`Graph`] from declarations
///
/// Edges are derived from the references in each node's config. Every
/// reference target, including output sources, must be declared.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    name: String,
    outputs: IndexMap<String, Reference>,
}

impl GraphBuilder {
    /// Create a builder for a named stack
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outputs: IndexMap::new(),
        }
    }

    /// Attach declared outputs
    #[must_use]
    pub fn with_outputs(mut self, outputs: IndexMap<String, Reference>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Build the graph
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIdentity` if two declarations share a name and
    /// `UnknownReference` if a reference targets an undeclared node
    pub fn build<I>(self, declarations: I) -> GraphResult<Graph>
    where
        I: IntoIterator<Item = Declaration>,
    {
        let declarations: Vec<Declaration> = declarations.into_iter().collect();

        let mut declared: IndexSet<NodeName> = IndexSet::with_capacity(declarations.len());
        for decl in &declarations {
            if !declared.insert(decl.name.clone()) {
                return Err(GraphError::DuplicateIdentity {
                    name: decl.name.clone(),
                });
            }
        }

        let mut nodes = IndexMap::with_capacity(declarations.len());
        for decl in declarations {
            let mut dependencies = IndexSet::new();
            for reference in resolve_references(&decl.config) {
                if !declared.contains(&reference.node) {
                    return Err(GraphError::UnknownReference {
                        referrer: format!("node '{}'", decl.name),
                        target: reference.node,
                        attribute: reference.attribute,
                    });
                }
                dependencies.insert(reference.node);
            }

            nodes.insert(
                decl.name.clone(),
                Node {
                    name: decl.name,
                    kind: decl.kind,
                    config: decl.config,
                    dependencies,
                },
            );
        }

        for (output, source) in &self.outputs {
            if !declared.contains(&source.node) {
                return Err(GraphError::UnknownReference {
                    referrer: format!("output '{}'", output),
                    target: source.node.clone(),
                    attribute: source.attribute.clone(),
                });
            }
        }

        let graph = Graph::from_parts(self.name, nodes, self.outputs);
        debug!(
            stack = graph.name(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            outputs = graph.outputs().len(),
            "built dependency graph"
        );
        Ok(graph)
    }
}
