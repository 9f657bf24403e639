//! Node identities.
//!
//! A node name is the stable, graph-unique identity of a declared resource.
//! Names are plain ASCII so they can appear unescaped in `node.attribute`
//! reference paths and in log lines.

use crate::error::{GraphError, GraphResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Maximum length of a node name in bytes
pub const MAX_NAME_LEN: usize = 128;

/// Node identifier - identifies a declared resource within one graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeName(String);

impl NodeName {
    /// Create a validated node name
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the name is empty, too long, or contains
    /// characters other than ASCII alphanumerics, `_` and `-`
    pub fn new(name: impl Into<String>) -> GraphResult<Self> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    /// Get the name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

fn validate(name: &str) -> GraphResult<()> {
    let reason = if name.is_empty() {
        Some("name is empty".to_string())
    } else if name.len() > MAX_NAME_LEN {
        Some(format!("name exceeds {} bytes", MAX_NAME_LEN))
    } else {
        name.chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
            .map(|c| format!("character {:?} is not allowed", c))
    };

    match reason {
        Some(reason) => Err(GraphError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for NodeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for NodeName {
    type Error = GraphError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for NodeName {
    type Error = GraphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for NodeName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}
