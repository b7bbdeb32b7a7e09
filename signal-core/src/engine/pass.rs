//! Pass bookkeeping: engine phases, per-node failures, pass reports.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::graph::{BoxError, NodeId};

/// The evaluation engine's state machine.
///
/// A pass moves `Idle → Evaluating → Notifying → Idle`. Triggers that
/// arrive while the engine is not idle are queued, never nested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No pass in flight.
    #[default]
    Idle,

    /// Recomputing dirty nodes in dependency order.
    Evaluating,

    /// Invoking subscriber callbacks for nodes that changed.
    Notifying,
}

/// A compute function failed during a pass.
///
/// The node keeps its last-known-good output; the failure is recorded
/// here instead of aborting the pass.
#[derive(Debug, Clone)]
pub struct ComputeFailure {
    node: NodeId,
    error: Arc<dyn Error + Send + Sync>,
}

impl ComputeFailure {
    pub(crate) fn new(node: NodeId, error: BoxError) -> Self {
        Self {
            node,
            error: Arc::from(error),
        }
    }

    /// The node whose compute failed.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The captured error.
    pub fn error(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.error.as_ref()
    }
}

impl fmt::Display for ComputeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal {:?} failed to compute: {}", self.node, self.error)
    }
}

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub(crate) changed: Vec<NodeId>,
    pub(crate) failures: Vec<ComputeFailure>,
}

impl PassReport {
    /// Nodes whose output changed this pass, in evaluation order.
    pub fn changed(&self) -> &[NodeId] {
        &self.changed
    }

    /// Per-node compute failures captured this pass.
    pub fn failures(&self) -> &[ComputeFailure] {
        &self.failures
    }

    /// True when nothing changed and nothing failed.
    pub fn is_quiet(&self) -> bool {
        self.changed.is_empty() && self.failures.is_empty()
    }
}
