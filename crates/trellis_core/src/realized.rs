//! Resolved configs and realized values.
//!
//! A [`ResolvedConfig`] is what a provider receives: a node's config with
//! every reference replaced by a concrete value. A [`RealizedValue`] is what
//! a provider returns: the attributes of the artifact it created.

use crate::value::{Config, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A config guaranteed to hold no references
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedConfig(Config);

impl ResolvedConfig {
    /// Wrap a config, returning `None` if any reference remains in it
    #[must_use]
    pub fn try_new(config: Config) -> Option<Self> {
        if config.iter().any(|(_, v)| v.contains_ref()) {
            None
        } else {
            Some(Self(config))
        }
    }

    /// Get an attribute
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.0.get(attribute)
    }

    /// Get a string attribute
    #[must_use]
    pub fn get_str(&self, attribute: &str) -> Option<&str> {
        self.0.get(attribute).and_then(Value::as_str)
    }

    /// Iterate attributes in declaration order
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Borrow the underlying config
    #[must_use]
    pub fn as_config(&self) -> &Config {
        &self.0
    }
}

/// Attributes produced when a node is materialized
///
/// Written once per node by the execution engine and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RealizedValue(IndexMap<String, Value>);

impl RealizedValue {
    /// Create an empty realized value
    #[must_use]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Start from the literal attributes a node was materialized with
    #[must_use]
    pub fn echo(config: &ResolvedConfig) -> Self {
        Self(config.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Set an attribute
    pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(attribute.into(), value.into());
    }

    /// Builder-style attribute setter
    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(attribute, value);
        self
    }

    /// Get an attribute
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.0.get(attribute)
    }

    /// Iterate attributes
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Number of attributes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
