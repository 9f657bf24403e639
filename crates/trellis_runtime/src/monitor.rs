//! Execution monitor for metrics and events.
//!
//! Records what an engine did to each node so that a run can be inspected
//! after the fact, whether it succeeded or stopped early.

use serde::Serialize;
use std::time::{Duration, Instant};
use trellis_core::{NodeName, NodeType};

/// Execution metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    /// Provider calls started
    pub nodes_invoked: u64,
    /// Nodes realized successfully
    pub nodes_materialized: u64,
    /// Provider calls that failed
    pub nodes_failed: u64,
    /// Planned nodes never started because the run stopped
    pub nodes_not_started: u64,
    /// Most provider calls in flight at once
    pub peak_in_flight: u64,
}

impl Metrics {
    /// Create new metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get success rate (0.0 - 1.0)
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.nodes_invoked == 0 {
            return 1.0;
        }
        self.nodes_materialized as f64 / self.nodes_invoked as f64
    }
}

/// One step of an execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// A provider call was started
    Started {
        /// Node being materialized
        node: NodeName,
        /// Its type
        kind: NodeType,
    },
    /// A node was realized
    Materialized {
        /// Realized node
        node: NodeName,
        /// Number of attributes the provider returned
        attributes: usize,
    },
    /// A provider call failed
    Failed {
        /// Failing node
        node: NodeName,
        /// Provider message
        message: String,
    },
}

impl ExecutionEvent {
    /// The node this event is about
    #[must_use]
    pub fn node(&self) -> &NodeName {
        match self {
            Self::Started { node, .. }
            | Self::Materialized { node, .. }
            | Self::Failed { node, .. } => node,
        }
    }
}

/// Execution monitor
///
/// Collects metrics and the ordered event log for one run.
#[derive(Debug)]
pub struct ExecutionMonitor {
    metrics: Metrics,
    events: Vec<ExecutionEvent>,
    in_flight: u64,
    start_time: Instant,
}

impl ExecutionMonitor {
    /// Create a new monitor
    #[must_use]
    pub fn new() -> Self {
        Self {
            metrics: Metrics::new(),
            events: Vec::new(),
            in_flight: 0,
            start_time: Instant::now(),
        }
    }

    /// Record the start of a provider call
    pub fn started(&mut self, node: &NodeName, kind: NodeType) {
        self.metrics.nodes_invoked += 1;
        self.in_flight += 1;
        self.metrics.peak_in_flight = self.metrics.peak_in_flight.max(self.in_flight);
        self.events.push(ExecutionEvent::Started {
            node: node.clone(),
            kind,
        });
    }

    /// Record a successful provider call
    pub fn materialized(&mut self, node: &NodeName, attributes: usize) {
        self.metrics.nodes_materialized += 1;
        self.in_flight = self.in_flight.saturating_sub(1);
        self.events.push(ExecutionEvent::Materialized {
            node: node.clone(),
            attributes,
        });
    }

    /// Record a failed provider call
    pub fn failed(&mut self, node: &NodeName, message: impl Into<String>) {
        self.metrics.nodes_failed += 1;
        self.in_flight = self.in_flight.saturating_sub(1);
        self.events.push(ExecutionEvent::Failed {
            node: node.clone(),
            message: message.into(),
        });
    }

    /// Record planned nodes that were never started
    pub fn not_started(&mut self, count: usize) {
        self.metrics.nodes_not_started += count as u64;
    }

    /// Get current metrics
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Get the event log
    #[must_use]
    pub fn events(&self) -> &[ExecutionEvent] {
        &self.events
    }

    /// Time since the monitor was created
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Consume the monitor
    #[must_use]
    pub fn finish(self) -> (Metrics, Vec<ExecutionEvent>) {
        (self.metrics, self.events)
    }
}

impl Default for ExecutionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> NodeName {
        NodeName::new(s).unwrap()
    }

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.nodes_invoked, 0);
        assert_eq!(metrics.success_rate(), 1.0);
    }

    #[test]
    fn test_monitor_records_events_in_order() {
        let mut monitor = ExecutionMonitor::new();
        monitor.started(&name("a"), NodeType::Function);
        monitor.materialized(&name("a"), 3);
        monitor.started(&name("b"), NodeType::RestApi);
        monitor.failed(&name("b"), "boom");
        monitor.not_started(2);

        let (metrics, events) = monitor.finish();
        assert_eq!(metrics.nodes_invoked, 2);
        assert_eq!(metrics.nodes_materialized, 1);
        assert_eq!(metrics.nodes_failed, 1);
        assert_eq!(metrics.nodes_not_started, 2);
        assert_eq!(metrics.success_rate(), 0.5);

        let nodes: Vec<_> = events.iter().map(|e| e.node().as_str()).collect();
        assert_eq!(nodes, vec!["a", "a", "b", "b"]);
        assert!(matches!(events[3], ExecutionEvent::Failed { ref message, .. } if message == "boom"));
    }

    #[test]
    fn test_peak_in_flight() {
        let mut monitor = ExecutionMonitor::new();
        monitor.started(&name("a"), NodeType::Function);
        monitor.started(&name("b"), NodeType::Function);
        monitor.materialized(&name("a"), 0);
        monitor.started(&name("c"), NodeType::Function);
        assert_eq!(monitor.metrics().peak_in_flight, 2);
    }

    #[test]
    fn test_event_serializes_tagged() {
        let event = ExecutionEvent::Started {
            node: name("a"),
            kind: NodeType::UserPool,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "started");
        assert_eq!(json["kind"], "user_pool");
    }
}
