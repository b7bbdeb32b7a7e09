//! Pass Evaluation
//!
//! One pass walks the dirty closure in dependency order and, for each
//! node:
//!
//! 1. Resolves the declared inputs: state selectors run against the
//!    borrowed snapshot, node inputs take the dependency's freshly
//!    settled output.
//! 2. Gates on the cached input tuple. Node inputs short-circuit on the
//!    producer's version counter; state inputs compare values with the
//!    node's equality policy. All unchanged means clean: no compute, no
//!    version bump, dependents observe nothing.
//! 3. Otherwise recomputes. An output equal to the cached one keeps the
//!    old `Arc` identity (dependents and subscribers stay quiet); a
//!    different output replaces the cache and bumps the version.
//!
//! A failing compute keeps the node's last-known-good output and is
//! recorded in the pass report; the rest of the pass proceeds. Because
//! the order is topological and each node appears in it once, diamond
//! dependencies recompute their shared upstream exactly once.

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::pass::{ComputeFailure, PassReport};
use crate::graph::{ComputeFn, DependencyGraph, NodeId, ResolvedInput, SignalNode, INPUT_ARITY};
use crate::value::Value;

/// What the gate decided for one node.
enum Plan {
    Clean,
    Missing(NodeId),
    Recompute {
        compute: ComputeFn,
        resolved: SmallVec<[Value; INPUT_ARITY]>,
        versions: SmallVec<[u64; INPUT_ARITY]>,
    },
}

/// Run one evaluation pass over `graph` against `state`.
///
/// Returns the report plus the changed nodes' new outputs, in evaluation
/// order, ready for notification.
pub(crate) fn run_pass<S: 'static>(
    graph: &mut DependencyGraph<S>,
    state: &S,
) -> (PassReport, Vec<(NodeId, Value)>) {
    let order = graph.dirty_pass_order();
    let _span = tracing::debug_span!("signal_pass", nodes = order.len()).entered();

    let mut report = PassReport::default();
    let mut changed_values: Vec<(NodeId, Value)> = Vec::new();

    for id in order {
        let plan = {
            let node = graph.get(id).expect("node in pass order");
            let mut resolved: SmallVec<[Value; INPUT_ARITY]> = SmallVec::new();
            let mut versions: SmallVec<[u64; INPUT_ARITY]> = SmallVec::new();
            let mut missing: Option<NodeId> = None;

            for input in node.inputs() {
                match input {
                    ResolvedInput::State(selector) => {
                        resolved.push(selector(state));
                        versions.push(0);
                    }
                    ResolvedInput::Node(dep) => {
                        let producer = graph.get(*dep).expect("registered dependency");
                        match producer.output() {
                            Some(output) => {
                                resolved.push(output.clone());
                                versions.push(producer.version());
                            }
                            None => {
                                missing = Some(*dep);
                                break;
                            }
                        }
                    }
                }
            }

            if let Some(dep) = missing {
                Plan::Missing(dep)
            } else if inputs_unchanged(node, &resolved, &versions) {
                Plan::Clean
            } else {
                Plan::Recompute {
                    compute: node.compute_fn(),
                    resolved,
                    versions,
                }
            }
        };

        match plan {
            Plan::Clean => {
                trace!(node = id.raw(), "inputs unchanged, skipping");
            }
            Plan::Missing(dep) => {
                warn!(
                    node = id.raw(),
                    input = dep.raw(),
                    "input signal has no settled value"
                );
                report.failures.push(ComputeFailure::new(
                    id,
                    format!("input signal {dep:?} has no settled value").into(),
                ));
            }
            Plan::Recompute {
                compute,
                resolved,
                versions,
            } => {
                let result = compute(&resolved);
                let node = graph.get_mut(id).expect("node in pass order");
                match result {
                    Ok(output) => {
                        let changed = match node.output() {
                            Some(previous) => !(node.equals())(previous, &output),
                            None => true,
                        };
                        node.settle_inputs(resolved, versions);
                        if changed {
                            node.settle_output(output);
                            trace!(node = id.raw(), version = node.version(), "output changed");
                            report.changed.push(id);
                            changed_values
                                .push((id, node.output().cloned().expect("just settled")));
                        } else {
                            trace!(node = id.raw(), "recomputed equal, keeping identity");
                        }
                    }
                    Err(error) => {
                        warn!(node = id.raw(), %error, "compute failed, keeping last value");
                        report.failures.push(ComputeFailure::new(id, error));
                    }
                }
            }
        }
    }

    debug!(
        changed = report.changed.len(),
        failures = report.failures.len(),
        "pass complete"
    );
    (report, changed_values)
}

/// Element-wise gate against the cached input tuple.
fn inputs_unchanged<S: 'static>(node: &SignalNode<S>, resolved: &[Value], versions: &[u64]) -> bool {
    let cached = match node.cached_inputs() {
        Some(cached) => cached,
        None => return false,
    };
    if cached.len() != resolved.len() {
        return false;
    }
    node.inputs().iter().enumerate().all(|(i, input)| match input {
        ResolvedInput::Node(_) => versions[i] == node.input_versions()[i],
        ResolvedInput::State(_) => (node.equals())(&cached[i], &resolved[i]),
    })
}
