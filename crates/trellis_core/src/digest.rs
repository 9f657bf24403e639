//! Content digests of resolved configs.
//!
//! Uses BLAKE3 over the node type tag and the canonical JSON encoding of a
//! resolved config. Attribute order is part of the encoding, so identical
//! declarations always digest identically.

use crate::kind::NodeType;
use crate::realized::ResolvedConfig;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A BLAKE3 digest (256 bits / 32 bytes) of one materialization request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigDigest([u8; 32]);

impl ConfigDigest {
    /// The number of bytes in a digest
    pub const LEN: usize = 32;

    /// Digest a materialization request
    #[must_use]
    pub fn compute(kind: NodeType, config: &ResolvedConfig) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(kind.as_str().as_bytes());
        hasher.update(&[0]);
        // Serializing a map of strings to plain JSON values cannot fail.
        let encoded = serde_json::to_vec(config).unwrap_or_default();
        hasher.update(&encoded);
        Self(*hasher.finalize().as_bytes())
    }

    /// Get as bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex prefix, handy for generated identifiers
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }

    /// Parse from hex string
    ///
    /// # Errors
    ///
    /// Returns error if hex is invalid or not 32 bytes
    pub fn from_hex(hex: &str) -> Result<Self, DigestError> {
        let bytes = hex::decode(hex).map_err(|_| DigestError::InvalidHex)?;
        if bytes.len() != Self::LEN {
            return Err(DigestError::InvalidLength(bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for ConfigDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ConfigDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ConfigDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Digest parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    /// Invalid hex encoding
    #[error("Invalid hex encoding")]
    InvalidHex,
    /// Invalid length (not 32 bytes)
    #[error("Invalid digest length: {0} (expected 32)")]
    InvalidLength(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Config;

    fn resolved(config: Config) -> ResolvedConfig {
        ResolvedConfig::try_new(config).unwrap()
    }

    #[test]
    fn test_digest_stable() {
        let a = resolved(Config::new().with("name", "hello"));
        let b = resolved(Config::new().with("name", "hello"));
        assert_eq!(
            ConfigDigest::compute(NodeType::RestApi, &a),
            ConfigDigest::compute(NodeType::RestApi, &b)
        );
    }

    #[test]
    fn test_digest_depends_on_kind_and_config() {
        let config = resolved(Config::new().with("name", "hello"));
        let other = resolved(Config::new().with("name", "world"));
        let base = ConfigDigest::compute(NodeType::RestApi, &config);
        assert_ne!(base, ConfigDigest::compute(NodeType::UserPool, &config));
        assert_ne!(base, ConfigDigest::compute(NodeType::RestApi, &other));
    }

    #[test]
    fn test_hex_roundtrip_and_errors() {
        let digest = ConfigDigest::compute(NodeType::Function, &ResolvedConfig::default());
        assert_eq!(ConfigDigest::from_hex(&digest.to_hex()).unwrap(), digest);
        assert_eq!(digest.short().len(), 12);
        assert_eq!(ConfigDigest::from_hex("zz"), Err(DigestError::InvalidHex));
        assert_eq!(
            ConfigDigest::from_hex("abcd"),
            Err(DigestError::InvalidLength(2))
        );
    }

    #[test]
    fn test_serde_as_hex_string() {
        let digest = ConfigDigest::compute(NodeType::Method, &ResolvedConfig::default());
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest.to_hex()));
        let back: ConfigDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }
}
