//! JSON stack documents.
//!
//! A document lists nodes in declaration order plus named outputs. It is
//! replayed through [`Stack`] so every declaration rule applies to it.

use crate::declare::Stack;
use crate::graph::Graph;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use trellis_core::{Config, GraphError, NodeType, Value};

/// Errors loading or replaying a stack document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The document could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Document path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid JSON of the expected shape
    #[error("invalid stack document: {0}")]
    Parse(#[from] serde_json::Error),

    /// An output is a literal instead of a `$ref`
    #[error("output '{output}' must be a {{\"$ref\": \"node.attribute\"}} object")]
    OutputNotReference {
        /// Offending output name
        output: String,
    },

    /// A declaration rule was violated
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// One node entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    /// Node name
    pub name: String,
    /// Node type
    #[serde(rename = "type")]
    pub kind: NodeType,
    /// Attributes, with references as `$ref` objects
    #[serde(default)]
    pub config: Config,
}

/// A whole stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackDocument {
    /// Stack name
    pub name: String,
    /// Nodes in declaration order
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    /// Output name to `$ref`
    #[serde(default)]
    pub outputs: IndexMap<String, Value>,
}

impl StackDocument {
    /// Parse from a JSON string
    ///
    /// # Errors
    ///
    /// Returns `Parse` if the JSON is malformed
    pub fn from_json_str(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `Parse` if it is malformed
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Render as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns `Parse` if serialization fails
    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Replay the document into a stack
    ///
    /// # Errors
    ///
    /// Returns `Graph` for any declaration error and `OutputNotReference`
    /// for literal outputs
    pub fn into_stack(self) -> Result<Stack, DocumentError> {
        let mut stack = Stack::new(self.name);
        for node in self.nodes {
            stack.declare(&node.name, node.kind, node.config)?;
        }
        for (output, source) in self.outputs {
            match source {
                Value::Ref(reference) => stack.output(output, reference)?,
                _ => return Err(DocumentError::OutputNotReference { output }),
            }
        }
        Ok(stack)
    }

    /// Replay and build in one step
    ///
    /// # Errors
    ///
    /// Same as [`StackDocument::into_stack`] plus build errors
    pub fn into_graph(self) -> Result<Graph, DocumentError> {
        Ok(self.into_stack()?.build()?)
    }

    /// Export a built graph
    #[must_use]
    pub fn from_graph(graph: &Graph) -> Self {
        Self {
            name: graph.name().to_string(),
            nodes: graph
                .nodes()
                .map(|node| NodeDocument {
                    name: node.name.to_string(),
                    kind: node.kind,
                    config: node.config.clone(),
                })
                .collect(),
            outputs: graph
                .outputs()
                .iter()
                .map(|(name, source)| (name.clone(), Value::Ref(source.clone())))
                .collect(),
        }
    }
}
