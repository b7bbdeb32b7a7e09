//! Graph Nodes
//!
//! This module defines the entities that live in the dependency graph:
//! identifiers, handles, input descriptors, registration specs, and the
//! signal node itself with its memoization state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::equality::EqualityFn;
use crate::value::Value;

/// Unique identifier for a graph instance.
///
/// Baked into every [`SignalHandle`] so that a handle from one graph is
/// rejected by another instead of silently addressing the wrong node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphId(u64);

impl GraphId {
    /// Generate a new unique graph ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identifier of a node within one graph.
///
/// Assigned sequentially at registration and stable for the node's
/// lifetime, so ascending `NodeId` order *is* registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    /// Get the raw ID value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Opaque public handle to a registered signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalHandle {
    pub(crate) graph: GraphId,
    pub(crate) node: NodeId,
}

impl SignalHandle {
    /// The node this handle refers to.
    pub fn node_id(self) -> NodeId {
        self.node
    }
}

/// Errors produced by a user compute function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A selector over the external store state.
pub type StateSelector<S> = Arc<dyn Fn(&S) -> Value + Send + Sync>;

/// A pure derivation over resolved input values.
pub type ComputeFn = Arc<dyn Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync>;

/// One declared input of a signal.
///
/// Inputs are a tagged variant rather than a trait object so the evaluator
/// can resolve all of them uniformly in one loop.
pub enum Input<S: 'static> {
    /// A raw selector over the current store state.
    State(StateSelector<S>),

    /// The settled output of an already-registered signal.
    Node(SignalHandle),

    /// The output of another member of the same registration batch,
    /// by index. This is the only way two signals can reference each
    /// other at construction time, which is where cycle detection bites.
    Member(usize),
}

impl<S: 'static> Input<S> {
    /// Declare a raw-state input.
    pub fn state<F>(selector: F) -> Self
    where
        F: Fn(&S) -> Value + Send + Sync + 'static,
    {
        Self::State(Arc::new(selector))
    }

    /// Declare a dependency on a registered signal.
    pub fn node(handle: SignalHandle) -> Self {
        Self::Node(handle)
    }

    /// Declare a dependency on batch member `index`.
    pub fn member(index: usize) -> Self {
        Self::Member(index)
    }
}

impl<S: 'static> fmt::Debug for Input<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(_) => f.write_str("State(<selector>)"),
            Self::Node(handle) => f.debug_tuple("Node").field(handle).finish(),
            Self::Member(index) => f.debug_tuple("Member").field(index).finish(),
        }
    }
}

/// Everything needed to register one signal.
pub struct SignalSpec<S: 'static> {
    pub(crate) inputs: Vec<Input<S>>,
    pub(crate) compute: ComputeFn,
    pub(crate) equals: Option<EqualityFn>,
}

impl<S: 'static> SignalSpec<S> {
    /// Build a spec from an input list and a compute function.
    pub fn new<F>(inputs: Vec<Input<S>>, compute: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self {
            inputs,
            compute: Arc::new(compute),
            equals: None,
        }
    }

    /// Override the equality policy for this node.
    pub fn with_equality(mut self, equals: EqualityFn) -> Self {
        self.equals = Some(equals);
        self
    }
}

/// An input after registration: batch members collapse into node refs.
pub(crate) enum ResolvedInput<S: 'static> {
    State(StateSelector<S>),
    Node(NodeId),
}

/// Inline capacity for per-node input tuples; most signals combine a
/// handful of inputs.
pub(crate) const INPUT_ARITY: usize = 4;

/// A signal node with its memoization state.
///
/// All mutation happens inside the evaluation engine, during a pass, under
/// the graph's exclusive lock.
pub(crate) struct SignalNode<S: 'static> {
    id: NodeId,
    inputs: SmallVec<[ResolvedInput<S>; INPUT_ARITY]>,
    compute: ComputeFn,
    equals: EqualityFn,

    /// Last-seen resolved input tuple; `None` until the node first settles.
    cached_inputs: Option<SmallVec<[Value; INPUT_ARITY]>>,

    /// Producer versions observed at the last settle, aligned with
    /// `inputs`. Slots for `State` inputs are unused.
    input_versions: SmallVec<[u64; INPUT_ARITY]>,

    /// Last-computed output; `None` before the first successful compute.
    cached_output: Option<Value>,

    /// Bumped whenever `cached_output` is replaced. Lets dependents detect
    /// change without re-comparing values.
    version: u64,

    /// Nodes that declared this node as an input, in registration order.
    dependents: Vec<NodeId>,

    has_state_input: bool,
}

impl<S: 'static> SignalNode<S> {
    pub(crate) fn new(
        id: NodeId,
        inputs: SmallVec<[ResolvedInput<S>; INPUT_ARITY]>,
        compute: ComputeFn,
        equals: EqualityFn,
    ) -> Self {
        let has_state_input = inputs
            .iter()
            .any(|input| matches!(input, ResolvedInput::State(_)));
        Self {
            id,
            inputs,
            compute,
            equals,
            cached_inputs: None,
            input_versions: SmallVec::new(),
            cached_output: None,
            version: 0,
            dependents: Vec::new(),
            has_state_input,
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn inputs(&self) -> &[ResolvedInput<S>] {
        &self.inputs
    }

    /// Ids of the node inputs (no state selectors).
    pub(crate) fn dependency_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs.iter().filter_map(|input| match input {
            ResolvedInput::Node(id) => Some(*id),
            ResolvedInput::State(_) => None,
        })
    }

    pub(crate) fn dependents(&self) -> &[NodeId] {
        &self.dependents
    }

    pub(crate) fn add_dependent(&mut self, id: NodeId) {
        self.dependents.push(id);
    }

    pub(crate) fn has_state_input(&self) -> bool {
        self.has_state_input
    }

    /// Whether the node has completed at least one successful compute.
    pub(crate) fn is_settled(&self) -> bool {
        self.cached_output.is_some()
    }

    pub(crate) fn output(&self) -> Option<&Value> {
        self.cached_output.as_ref()
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn compute_fn(&self) -> ComputeFn {
        Arc::clone(&self.compute)
    }

    pub(crate) fn equals(&self) -> &EqualityFn {
        &self.equals
    }

    pub(crate) fn cached_inputs(&self) -> Option<&[Value]> {
        self.cached_inputs.as_deref()
    }

    pub(crate) fn input_versions(&self) -> &[u64] {
        &self.input_versions
    }

    /// Record a freshly resolved input tuple without touching the output.
    /// Used when a recompute produced an equal value.
    pub(crate) fn settle_inputs(
        &mut self,
        inputs: SmallVec<[Value; INPUT_ARITY]>,
        versions: SmallVec<[u64; INPUT_ARITY]>,
    ) {
        self.cached_inputs = Some(inputs);
        self.input_versions = versions;
    }

    /// Replace the cached output and bump the version.
    pub(crate) fn settle_output(&mut self, output: Value) {
        self.cached_output = Some(output);
        self.version += 1;
    }
}

impl<S: 'static> fmt::Debug for SignalNode<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalNode")
            .field("id", &self.id)
            .field("arity", &self.inputs.len())
            .field("settled", &self.is_settled())
            .field("version", &self.version)
            .field("dependents", &self.dependents)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equality::default_equality;
    use crate::value::value;

    fn constant(id: u64) -> SignalNode<()> {
        SignalNode::new(
            NodeId(id),
            SmallVec::new(),
            Arc::new(|_: &[Value]| Ok(value(0_i64))),
            default_equality(),
        )
    }

    #[test]
    fn graph_ids_are_unique() {
        assert_ne!(GraphId::new(), GraphId::new());
    }

    #[test]
    fn fresh_node_is_unsettled_at_version_zero() {
        let node = constant(0);
        assert!(!node.is_settled());
        assert!(node.output().is_none());
        assert!(node.cached_inputs().is_none());
        assert_eq!(node.version(), 0);
    }

    #[test]
    fn settling_output_bumps_version() {
        let mut node = constant(0);
        node.settle_output(value(1_i64));
        assert_eq!(node.version(), 1);
        assert!(node.is_settled());
        node.settle_output(value(2_i64));
        assert_eq!(node.version(), 2);
    }

    #[test]
    fn settling_inputs_leaves_output_alone() {
        let mut node = constant(0);
        let mut inputs: SmallVec<[Value; INPUT_ARITY]> = SmallVec::new();
        inputs.push(value(1_i64));
        let mut versions: SmallVec<[u64; INPUT_ARITY]> = SmallVec::new();
        versions.push(0);
        node.settle_inputs(inputs, versions);
        assert!(node.cached_inputs().is_some());
        assert!(!node.is_settled());
        assert_eq!(node.version(), 0);
    }

    #[test]
    fn state_input_flag_reflects_declared_inputs() {
        let node = constant(0);
        assert!(!node.has_state_input());

        let mut inputs: SmallVec<[ResolvedInput<()>; INPUT_ARITY]> = SmallVec::new();
        inputs.push(ResolvedInput::State(Arc::new(|_: &()| value(0_i64))));
        let node = SignalNode::new(
            NodeId(1),
            inputs,
            Arc::new(|vals: &[Value]| Ok(vals[0].clone())),
            default_equality(),
        );
        assert!(node.has_state_input());
        assert_eq!(node.dependency_ids().count(), 0);
    }
}
