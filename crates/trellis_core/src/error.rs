//! Error types for TRELLIS.
//!
//! Declaration-time errors (`InvalidName`, `DuplicateIdentity`,
//! `DuplicateOutput`, `UnknownReference`, `CyclicDependency`) are raised
//! before any provider is invoked. `MaterializationFailed` is the only error
//! that can follow side effects.

use crate::kind::NodeType;
use crate::name::NodeName;

/// Graph result type
pub type GraphResult<T> = Result<T, GraphError>;

/// Error reported by a capability provider
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    /// Provider-supplied detail
    pub message: String,
}

impl ProviderError {
    /// Create a provider error
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Graph error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A node name or reference path is malformed
    #[error("invalid name '{name}': {reason}")]
    InvalidName {
        /// The rejected text
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// A node identity was declared twice
    #[error("node '{name}' is already declared")]
    DuplicateIdentity {
        /// The repeated identity
        name: NodeName,
    },

    /// An output name was declared twice
    #[error("output '{output}' is already declared")]
    DuplicateOutput {
        /// The repeated output name
        output: String,
    },

    /// A reference targets a node that was never declared
    #[error("{referrer} references undeclared node '{target}' (attribute '{attribute}')")]
    UnknownReference {
        /// Node or output holding the reference
        referrer: String,
        /// Missing target node
        target: NodeName,
        /// Referenced attribute
        attribute: String,
    },

    /// The dependency edges contain a cycle
    #[error("cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency {
        /// Nodes on the cycle, in dependency-walk order
        cycle: Vec<NodeName>,
    },

    /// A reference's target had not been realized when it was needed.
    /// The planner's ordering rules this out, so this indicates a bug.
    #[error("internal error: node '{node}' needs '{target}.{attribute}' before '{target}' was realized")]
    UnresolvedReference {
        /// Node whose config holds the reference
        node: NodeName,
        /// Node that was not realized yet
        target: NodeName,
        /// Referenced attribute
        attribute: String,
    },

    /// A realized node lacks the attribute something asked for
    #[error("node '{node}' was realized without attribute '{attribute}'")]
    MissingAttribute {
        /// Realized node
        node: NodeName,
        /// Attribute it does not have
        attribute: String,
    },

    /// The provider failed to materialize a node
    #[error("materializing {kind} '{node}' failed: {source}")]
    MaterializationFailed {
        /// Failed node
        node: NodeName,
        /// Its type
        kind: NodeType,
        /// What the provider reported
        #[source]
        source: ProviderError,
    },

    /// An output's source node never executed
    #[error("output '{output}' is unresolved: node '{node}' was not realized")]
    UnresolvedOutput {
        /// Requested output
        output: String,
        /// Its source node
        node: NodeName,
    },

    /// An output name the graph does not declare was requested
    #[error("output '{output}' is not declared")]
    UnknownOutput {
        /// Requested output
        output: String,
    },
}

impl GraphError {
    /// The node this error is about, when there is one
    #[must_use]
    pub fn node(&self) -> Option<&NodeName> {
        match self {
            Self::DuplicateIdentity { name } => Some(name),
            Self::UnknownReference { target, .. } => Some(target),
            Self::CyclicDependency { cycle } => cycle.first(),
            Self::UnresolvedReference { node, .. }
            | Self::MissingAttribute { node, .. }
            | Self::MaterializationFailed { node, .. }
            | Self::UnresolvedOutput { node, .. } => Some(node),
            Self::InvalidName { .. } | Self::DuplicateOutput { .. } | Self::UnknownOutput { .. } => {
                None
            }
        }
    }

    /// Whether this error was raised before any side effect could happen
    #[must_use]
    pub fn is_declaration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidName { .. }
                | Self::DuplicateIdentity { .. }
                | Self::DuplicateOutput { .. }
                | Self::UnknownReference { .. }
                | Self::CyclicDependency { .. }
        )
    }
}

fn format_cycle(cycle: &[NodeName]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(NodeName::as_str).collect();
    if let Some(first) = cycle.first() {
        parts.push(first.as_str());
    }
    parts.join(" -> ")
}
