//! TRELLIS Runtime
//!
//! Applies planned resource graphs through a capability provider. The
//! sequential engine is the reference behavior; the concurrent engine runs
//! independent nodes in parallel with the same stop-on-first-failure rule.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod checksum;
pub mod concurrent;
pub mod engine;
pub mod monitor;
pub mod provider;
pub mod sim;
pub mod store;

pub use aggregate::{aggregate, aggregate_all, OutputRecord};
pub use checksum::{ChecksumGuard, Ledger, LedgerEntry, LedgerError};
pub use concurrent::ConcurrentEngine;
pub use engine::{EngineConfig, EngineMode, Execution, ExecutionEngine};
pub use monitor::{ExecutionEvent, ExecutionMonitor, Metrics};
pub use provider::{AsyncProvider, Provider};
pub use sim::{SimulatedCall, SimulatedProvider};
pub use store::RealizedStore;
