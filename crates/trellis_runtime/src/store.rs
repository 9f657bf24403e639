//! Write-once store of realized values.
//!
//! Reference substitution reads from here: every reference in a node's config
//! is replaced with the named attribute of an already realized node.

use indexmap::IndexMap;
use serde::Serialize;
use trellis_core::{
    Config, GraphError, GraphResult, NodeName, RealizedValue, Reference, ResolvedConfig, Value,
};
use trellis_plan::Node;

/// Realized values keyed by node, in realization order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RealizedStore {
    values: IndexMap<NodeName, RealizedValue>,
}

impl RealizedStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node's realized value
    ///
    /// # Errors
    ///
    /// Hands the value back if the node was already realized
    pub fn insert(&mut self, node: NodeName, value: RealizedValue) -> Result<(), RealizedValue> {
        if self.values.contains_key(&node) {
            return Err(value);
        }
        self.values.insert(node, value);
        Ok(())
    }

    /// Get a node's realized value
    #[must_use]
    pub fn get(&self, node: &str) -> Option<&RealizedValue> {
        self.values.get(node)
    }

    /// Check whether a node was realized
    #[must_use]
    pub fn contains(&self, node: &str) -> bool {
        self.values.contains_key(node)
    }

    /// Iterate in realization order
    pub fn iter(&self) -> impl Iterator<Item = (&NodeName, &RealizedValue)> {
        self.values.iter()
    }

    /// Number of realized nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if nothing was realized
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up the value a reference points at
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedReference` if the target was not realized and
    /// `MissingAttribute` if it was realized without the attribute
    pub fn lookup(&self, holder: &NodeName, reference: &Reference) -> GraphResult<&Value> {
        let realized = self
            .values
            .get(&reference.node)
            .ok_or_else(|| GraphError::UnresolvedReference {
                node: holder.clone(),
                target: reference.node.clone(),
                attribute: reference.attribute.clone(),
            })?;
        realized
            .get(&reference.attribute)
            .ok_or_else(|| GraphError::MissingAttribute {
                node: reference.node.clone(),
                attribute: reference.attribute.clone(),
            })
    }

    /// Substitute every reference in a node's config
    ///
    /// # Errors
    ///
    /// See [`RealizedStore::lookup`]
    pub fn resolve(&self, node: &Node) -> GraphResult<ResolvedConfig> {
        let mut resolved = Config::new();
        for (attribute, value) in &node.config {
            resolved.insert(attribute.clone(), self.substitute(&node.name, value)?);
        }
        // Realized values are reference-free, so substitution leaves none behind.
        ResolvedConfig::try_new(resolved).ok_or_else(|| {
            let reference = first_reference(&node.config);
            GraphError::UnresolvedReference {
                node: node.name.clone(),
                target: reference.map_or_else(|| node.name.clone(), |r| r.node.clone()),
                attribute: reference.map(|r| r.attribute.clone()).unwrap_or_default(),
            }
        })
    }

    fn substitute(&self, holder: &NodeName, value: &Value) -> GraphResult<Value> {
        Ok(match value {
            Value::Ref(reference) => self.lookup(holder, reference)?.clone(),
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.substitute(holder, item))
                    .collect::<GraphResult<_>>()?,
            ),
            Value::Map(entries) => {
                let mut out = IndexMap::with_capacity(entries.len());
                for (key, item) in entries {
                    out.insert(key.clone(), self.substitute(holder, item)?);
                }
                Value::Map(out)
            }
            literal => literal.clone(),
        })
    }
}

fn first_reference(config: &Config) -> Option<&Reference> {
    fn walk(value: &Value) -> Option<&Reference> {
        match value {
            Value::Ref(reference) => Some(reference),
            Value::List(items) => items.iter().find_map(walk),
            Value::Map(entries) => entries.values().find_map(walk),
            _ => None,
        }
    }
    config.iter().find_map(|(_, value)| walk(value))
}
