//! Dependency Graph
//!
//! The set of signal nodes and the edges connecting them.
//!
//! # Overview
//!
//! The graph is a DAG where nodes are derivations (signals) and an edge
//! from B to A means A declared B as an input. We keep both directions:
//! forward edges (a node's inputs) drive evaluation, reverse edges (a
//! node's dependents) drive dirtiness propagation.
//!
//! # Design Decisions
//!
//! 1. A centralized node table rather than per-node linked structures:
//!    it makes topological ordering and cycle detection straightforward
//!    and keeps all mutation under one lock during a pass.
//!
//! 2. Nodes are stored in an `IndexMap` keyed by sequentially-assigned
//!    ids, so registration order is both the iteration order and the
//!    deterministic tie-break for evaluation order.
//!
//! 3. The graph is append-only. There is no node-removal contract, so
//!    nothing here guesses at disposal semantics.

mod node;
mod scheduler;

pub use node::{BoxError, ComputeFn, GraphId, Input, NodeId, SignalHandle, SignalSpec, StateSelector};

pub(crate) use node::{ResolvedInput, SignalNode, INPUT_ARITY};
pub(crate) use scheduler::DependencyGraph;
