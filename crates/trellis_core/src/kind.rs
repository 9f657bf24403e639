//! Node type tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of resource types a graph can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Serverless compute function
    Function,
    /// HTTP API gateway
    RestApi,
    /// Identity user pool
    UserPool,
    /// User-pool-backed request authorizer
    Authorizer,
    /// Path resource under an API
    Resource,
    /// HTTP method on a path resource
    Method,
    /// Backend integration for a method
    Integration,
}

impl NodeType {
    /// Every node type, in declaration order of the enum
    pub const ALL: [NodeType; 7] = [
        Self::Function,
        Self::RestApi,
        Self::UserPool,
        Self::Authorizer,
        Self::Resource,
        Self::Method,
        Self::Integration,
    ];

    /// Get the stable snake_case tag for this type
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::RestApi => "rest_api",
            Self::UserPool => "user_pool",
            Self::Authorizer => "authorizer",
            Self::Resource => "resource",
            Self::Method => "method",
            Self::Integration => "integration",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown node type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip_through_from_str() {
        for kind in NodeType::ALL {
            assert_eq!(kind.as_str().parse::<NodeType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&NodeType::RestApi).unwrap();
        assert_eq!(json, "\"rest_api\"");
        let kind: NodeType = serde_json::from_str("\"user_pool\"").unwrap();
        assert_eq!(kind, NodeType::UserPool);
    }

    #[test]
    fn test_unknown_tag() {
        assert!("bucket".parse::<NodeType>().is_err());
    }
}
