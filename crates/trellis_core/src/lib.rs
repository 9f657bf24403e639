//! TRELLIS Core Types
//!
//! This crate contains pure types and logic with no I/O: node names and
//! types, attribute values with deferred references, realized values,
//! config digests, and the shared error taxonomy.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod digest;
pub mod error;
pub mod kind;
pub mod name;
pub mod realized;
pub mod value;

// Re-exports
pub use digest::{ConfigDigest, DigestError};
pub use error::{GraphError, GraphResult, ProviderError};
pub use kind::NodeType;
pub use name::NodeName;
pub use realized::{RealizedValue, ResolvedConfig};
pub use value::{Config, Reference, Value, LITERAL_KEY, REF_KEY};
