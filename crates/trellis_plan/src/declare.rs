//! Declaration surface.
//!
//! A [`Stack`] collects node declarations and named outputs. References may
//! point forward at nodes declared later; they are checked when the stack is
//! built into a [`Graph`].

use crate::builder::GraphBuilder;
use crate::graph::Graph;
use crate::resource::ResourceSpec;
use indexmap::IndexMap;
use tracing::debug;
use trellis_core::{Config, GraphError, GraphResult, NodeName, NodeType, Reference, Value};

/// One declared node, before graph construction
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Node name
    pub name: NodeName,
    /// Resource type
    pub kind: NodeType,
    /// Configuration, possibly holding references
    pub config: Config,
}

/// Handle to a declared node, used to reference its future attributes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    name: NodeName,
    kind: NodeType,
}

impl NodeHandle {
    /// Node name
    #[must_use]
    pub fn name(&self) -> &NodeName {
        &self.name
    }

    /// Node type
    #[must_use]
    pub fn kind(&self) -> NodeType {
        self.kind
    }

    /// Reference to one of this node's future attributes
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the attribute name is invalid
    pub fn reference(&self, attribute: &str) -> GraphResult<Reference> {
        Reference::new(self.name.clone(), attribute)
    }

    /// Reference as an attribute value
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the attribute name is invalid
    pub fn attr(&self, attribute: &str) -> GraphResult<Value> {
        self.reference(attribute).map(Value::Ref)
    }
}

/// A set of declarations awaiting graph construction
#[derive(Debug, Clone, Default)]
pub struct Stack {
    name: String,
    nodes: IndexMap<NodeName, Declaration>,
    outputs: IndexMap<String, Reference>,
}

impl Stack {
    /// Create an empty stack
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    /// Declare a node
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for a malformed name and `DuplicateIdentity` if
    /// the name is taken. On error the stack is unchanged.
    pub fn declare(&mut self, name: &str, kind: NodeType, config: Config) -> GraphResult<NodeHandle> {
        let name = NodeName::new(name)?;
        if self.nodes.contains_key(&name) {
            return Err(GraphError::DuplicateIdentity { name });
        }

        debug!(node = %name, kind = %kind, attributes = config.len(), "declared node");
        self.nodes.insert(
            name.clone(),
            Declaration {
                name: name.clone(),
                kind,
                config,
            },
        );
        Ok(NodeHandle { name, kind })
    }

    /// Declare a node from a typed resource spec
    ///
    /// # Errors
    ///
    /// Same as [`Stack::declare`]
    pub fn resource<S: ResourceSpec>(&mut self, name: &str, spec: S) -> GraphResult<NodeHandle> {
        self.declare(name, S::KIND, spec.into_config())
    }

    /// Declare a named output sourced from one node attribute
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for an empty output name and `DuplicateOutput`
    /// if the name is taken
    pub fn output(&mut self, output: impl Into<String>, source: Reference) -> GraphResult<()> {
        let output = output.into();
        if output.is_empty() {
            return Err(GraphError::InvalidName {
                name: output,
                reason: "output name is empty".to_string(),
            });
        }
        if self.outputs.contains_key(&output) {
            return Err(GraphError::DuplicateOutput { output });
        }
        self.outputs.insert(output, source);
        Ok(())
    }

    /// Stack name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a declaration
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.nodes.get(name)
    }

    /// Number of declared nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if nothing is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Build the dependency graph
    ///
    /// # Errors
    ///
    /// Returns `UnknownReference` if a node or output references an
    /// undeclared node
    pub fn build(self) -> GraphResult<Graph> {
        GraphBuilder::new(self.name)
            .with_outputs(self.outputs)
            .build(self.nodes.into_values())
    }
}
