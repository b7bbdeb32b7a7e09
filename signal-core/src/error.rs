//! Error Types

use thiserror::Error;

use crate::graph::SignalHandle;

/// Errors surfaced by the public graph API.
///
/// Compute-function failures are not errors at this level: they are
/// captured per node in the pass report so one bad signal cannot poison
/// an entire pass.
#[derive(Debug, Error)]
pub enum SignalError {
    /// A registration batch contained a dependency cycle; the index is
    /// the offending batch member. Nothing was registered.
    #[error("batch member {0} participates in a dependency cycle")]
    Cycle(usize),

    /// The handle was issued by a different graph or names no node.
    #[error("unknown signal handle {0:?}")]
    UnknownHandle(SignalHandle),

    /// A registration input was structurally invalid.
    #[error("malformed inputs: {0}")]
    MalformedInputs(String),

    /// The operation needs a store and none is attached.
    #[error("no store attached to this graph")]
    NotAttached,

    /// `attach` was called on a graph that already has a store.
    #[error("a store is already attached to this graph")]
    AlreadyAttached,

    /// The signal has never completed a successful compute.
    #[error("signal {0:?} has no settled value")]
    Unsettled(SignalHandle),
}
