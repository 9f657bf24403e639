//! Capability provider traits.
//!
//! A provider turns a resolved node configuration into a real artifact and
//! reports the attributes of what it created. The engines never inspect the
//! config beyond substituting references into it.

use async_trait::async_trait;
use std::sync::Arc;
use trellis_core::{NodeName, NodeType, ProviderError, RealizedValue, ResolvedConfig};

/// Synchronous provider used by [`ExecutionEngine`](crate::engine::ExecutionEngine)
pub trait Provider {
    /// Create the artifact for one node
    ///
    /// # Errors
    ///
    /// Returns a `ProviderError` describing why the artifact could not be
    /// created. The engine stops at the first error.
    fn materialize(
        &mut self,
        kind: NodeType,
        config: &ResolvedConfig,
    ) -> Result<RealizedValue, ProviderError>;

    /// Create the artifact for the named node
    ///
    /// The engine calls this once per planned node. The default ignores the
    /// name; wrappers that track artifacts per node override it.
    ///
    /// # Errors
    ///
    /// Same as [`Provider::materialize`]
    fn materialize_node(
        &mut self,
        _node: &NodeName,
        kind: NodeType,
        config: &ResolvedConfig,
    ) -> Result<RealizedValue, ProviderError> {
        self.materialize(kind, config)
    }
}

impl<P: Provider + ?Sized> Provider for &mut P {
    fn materialize(
        &mut self,
        kind: NodeType,
        config: &ResolvedConfig,
    ) -> Result<RealizedValue, ProviderError> {
        (**self).materialize(kind, config)
    }

    fn materialize_node(
        &mut self,
        node: &NodeName,
        kind: NodeType,
        config: &ResolvedConfig,
    ) -> Result<RealizedValue, ProviderError> {
        (**self).materialize_node(node, kind, config)
    }
}

/// Provider shared across concurrent materialization tasks
#[async_trait]
pub trait AsyncProvider: Send + Sync {
    /// Create the artifact for one node
    ///
    /// # Errors
    ///
    /// Returns a `ProviderError` describing why the artifact could not be
    /// created
    async fn materialize(
        &self,
        kind: NodeType,
        config: &ResolvedConfig,
    ) -> Result<RealizedValue, ProviderError>;
}

#[async_trait]
impl<P: AsyncProvider + ?Sized> AsyncProvider for Arc<P> {
    async fn materialize(
        &self,
        kind: NodeType,
        config: &ResolvedConfig,
    ) -> Result<RealizedValue, ProviderError> {
        (**self).materialize(kind, config).await
    }
}
