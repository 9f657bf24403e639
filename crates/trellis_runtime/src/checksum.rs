//! Skip-if-unchanged provider wrapper.
//!
//! [`ChecksumGuard`] keeps a [`Ledger`] with one entry per node: the digest of
//! the request that last succeeded for it and what the provider returned. A
//! node whose request digest matches its entry is answered from the ledger
//! without calling the wrapped provider, which makes re-applying a partially
//! applied stack safe. Two nodes with identical configs are still two
//! artifacts. A changed config replaces the node's entry.

use crate::provider::Provider;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use trellis_core::{ConfigDigest, NodeName, NodeType, ProviderError, RealizedValue, ResolvedConfig};

/// Errors loading or saving a ledger
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The ledger file could not be read or written
    #[error("ledger I/O on {path}: {source}")]
    Io {
        /// Ledger path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The ledger file is not valid JSON
    #[error("invalid ledger: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The last successful materialization of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Node type of the request
    pub kind: NodeType,
    /// Digest of the type and resolved config
    pub digest: ConfigDigest,
    /// What the provider returned
    pub value: RealizedValue,
}

impl LedgerEntry {
    /// Check whether this entry answers the given request
    #[must_use]
    pub fn matches(&self, kind: NodeType, digest: &ConfigDigest) -> bool {
        self.kind == kind && &self.digest == digest
    }
}

/// Per-node record of successful materializations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    entries: IndexMap<NodeName, LedgerEntry>,
}

impl Ledger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a node
    #[must_use]
    pub fn get(&self, node: &str) -> Option<&LedgerEntry> {
        self.entries.get(node)
    }

    /// Record a node's successful request, returning the entry it replaces
    pub fn record(&mut self, node: NodeName, entry: LedgerEntry) -> Option<LedgerEntry> {
        self.entries.insert(node, entry)
    }

    /// Drop the entries of nodes `keep` rejects
    pub fn retain(&mut self, mut keep: impl FnMut(&NodeName) -> bool) {
        self.entries.retain(|node, _| keep(node));
    }

    /// Recorded nodes, in first-recorded order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeName> {
        self.entries.keys()
    }

    /// Number of recorded nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read a ledger file
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `Parse` if it is malformed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Read a ledger file, starting empty if it does not exist yet
    ///
    /// # Errors
    ///
    /// Same as [`Ledger::load`] for files that exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Write the ledger as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be written
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LedgerError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Provider wrapper that skips nodes whose request is unchanged
///
/// Only [`Provider::materialize_node`] consults the ledger. A bare
/// [`Provider::materialize`] call carries no node identity and always
/// reaches the wrapped provider.
#[derive(Debug)]
pub struct ChecksumGuard<P> {
    inner: P,
    ledger: Ledger,
    hits: u64,
    misses: u64,
}

impl<P: Provider> ChecksumGuard<P> {
    /// Wrap a provider with an empty ledger
    #[must_use]
    pub fn new(inner: P) -> Self {
        Self::with_ledger(inner, Ledger::new())
    }

    /// Wrap a provider with an existing ledger
    #[must_use]
    pub fn with_ledger(inner: P, ledger: Ledger) -> Self {
        Self {
            inner,
            ledger,
            hits: 0,
            misses: 0,
        }
    }

    /// Requests answered from the ledger
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Requests passed to the wrapped provider
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Borrow the ledger
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Borrow the wrapped provider
    #[must_use]
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Take the provider and ledger back
    #[must_use]
    pub fn into_parts(self) -> (P, Ledger) {
        (self.inner, self.ledger)
    }
}

impl<P: Provider> Provider for ChecksumGuard<P> {
    fn materialize(
        &mut self,
        kind: NodeType,
        config: &ResolvedConfig,
    ) -> Result<RealizedValue, ProviderError> {
        self.misses += 1;
        self.inner.materialize(kind, config)
    }

    fn materialize_node(
        &mut self,
        node: &NodeName,
        kind: NodeType,
        config: &ResolvedConfig,
    ) -> Result<RealizedValue, ProviderError> {
        let digest = ConfigDigest::compute(kind, config);
        if let Some(entry) = self.ledger.get(node.as_str()).filter(|entry| entry.matches(kind, &digest)) {
            debug!(node = %node, kind = %kind, digest = %digest.short(), "unchanged; reusing recorded value");
            self.hits += 1;
            return Ok(entry.value.clone());
        }

        self.misses += 1;
        let value = self.inner.materialize_node(node, kind, config)?;
        let replaced = self.ledger.record(
            node.clone(),
            LedgerEntry {
                kind,
                digest,
                value: value.clone(),
            },
        );
        if let Some(old) = replaced {
            debug!(node = %node, previous = %old.digest.short(), digest = %digest.short(), "request changed; entry replaced");
        }
        Ok(value)
    }
}
