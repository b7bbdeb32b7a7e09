//! Signal Core
//!
//! A dependency-tracked memoization graph over an external, immutable
//! application store. Signals are pure derivations of store state and/or
//! other signals; the engine recomputes only what a store change could
//! have affected, and notifies only the subscribers whose derived value
//! actually changed.
//!
//! # Architecture
//!
//! - `value` / `equality`: the type-erased value currency and the
//!   pluggable equality policy that gates every memoization decision
//! - `graph`: signal nodes, handles, and the append-only dependency DAG
//!   with cycle-rejecting registration and topological ordering
//! - `engine`: the evaluation pass (dirty closure, input gating,
//!   recompute-at-most-once, per-node failure capture)
//! - `subscription`: subscriber bookkeeping in subscribe order
//! - `store`: the seam to the external store, plus a small in-memory
//!   reference store
//! - `runtime`: the [`SignalGraph`] facade wiring it all together
//!
//! # Example
//!
//! ```rust
//! use signal_core::{value, read, Input, MemoryStore, SignalGraph, Value};
//!
//! #[derive(Clone)]
//! struct State { a: i64, b: i64 }
//!
//! let graph: SignalGraph<State> = SignalGraph::new();
//! let sum = graph.create_signal(
//!     vec![
//!         Input::state(|s: &State| value(s.a)),
//!         Input::state(|s: &State| value(s.b)),
//!     ],
//!     |vals: &[Value]| {
//!         let a = read::<i64>(&vals[0]).copied().unwrap_or(0);
//!         let b = read::<i64>(&vals[1]).copied().unwrap_or(0);
//!         Ok(value(a + b))
//!     },
//! ).unwrap();
//!
//! let store = MemoryStore::new(State { a: 1, b: 2 });
//! graph.attach(store.clone()).unwrap();
//!
//! store.set_state(State { a: 1, b: 5 });
//! let total = graph.get_value(sum).unwrap();
//! assert_eq!(read::<i64>(&total), Some(&6));
//! ```

pub mod engine;
pub mod equality;
pub mod error;
pub mod graph;
pub mod runtime;
pub mod store;
pub mod subscription;
pub mod value;

pub use engine::{ComputeFailure, PassReport, Phase};
pub use equality::{by_identity, by_value, default_equals, default_equality, EqualityFn};
pub use error::SignalError;
pub use graph::{BoxError, ComputeFn, Input, NodeId, SignalHandle, SignalSpec, StateSelector};
pub use runtime::{EvaluationMode, GraphOptions, SignalGraph};
pub use store::{MemoryStore, Store, Unsubscribe};
pub use subscription::SubscriptionId;
pub use value::{read, read_arc, value, Value};
