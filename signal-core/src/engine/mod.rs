//! Evaluation Engine
//!
//! Drives re-evaluation when the store changes: collect the dirty
//! closure, recompute in dependency order, and report which nodes
//! actually changed. The facade in [`crate::runtime`] owns the phase
//! machine and the queueing of re-entrant triggers; this module owns the
//! semantics of a single pass.

mod evaluator;
mod pass;

pub use pass::{ComputeFailure, PassReport, Phase};

pub(crate) use evaluator::run_pass;
