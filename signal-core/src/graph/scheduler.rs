//! Dependency Graph
//!
//! Storage for signal nodes and the edges connecting them, plus the
//! ordering queries the evaluation engine runs each pass.
//!
//! # Registration
//!
//! The graph is append-only: nodes are registered in batches and never
//! removed. Node ids are handed out sequentially, so an input can only
//! reference a node that already exists, except *within* a batch, where
//! members may reference each other by index. That is the one place a
//! dependency cycle could sneak in, so registration runs a reachability
//! check over the batch and rejects the whole batch on a cycle, leaving
//! the graph untouched.
//!
//! # Ordering
//!
//! A pass processes the dependents-closure of the dirty candidates in
//! topological order (Kahn's algorithm restricted to the closure), with
//! ties broken by ascending registration order so passes are
//! deterministic.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::node::{
    GraphId, Input, NodeId, ResolvedInput, SignalHandle, SignalNode, SignalSpec, INPUT_ARITY,
};
use crate::equality::default_equality;
use crate::error::SignalError;

/// The set of signal nodes and their dependency edges.
pub(crate) struct DependencyGraph<S: 'static> {
    id: GraphId,
    nodes: IndexMap<NodeId, SignalNode<S>>,
    next_id: u64,
}

impl<S: 'static> DependencyGraph<S> {
    pub(crate) fn new() -> Self {
        Self {
            id: GraphId::new(),
            nodes: IndexMap::new(),
            next_id: 0,
        }
    }

    pub(crate) fn graph_id(&self) -> GraphId {
        self.id
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&SignalNode<S>> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut SignalNode<S>> {
        self.nodes.get_mut(&id)
    }

    /// Turn a node id into a public handle for this graph.
    pub(crate) fn handle(&self, id: NodeId) -> SignalHandle {
        SignalHandle {
            graph: self.id,
            node: id,
        }
    }

    /// Whether the handle was issued by this graph and names a live node.
    pub(crate) fn contains(&self, handle: SignalHandle) -> bool {
        handle.graph == self.id && self.nodes.contains_key(&handle.node)
    }

    /// Register a batch of signals.
    ///
    /// Validation happens up front; on any error nothing is registered.
    pub(crate) fn insert(
        &mut self,
        specs: Vec<SignalSpec<S>>,
    ) -> Result<Vec<NodeId>, SignalError> {
        let ids: Vec<NodeId> = (0..specs.len())
            .map(|offset| NodeId(self.next_id + offset as u64))
            .collect();

        for (index, spec) in specs.iter().enumerate() {
            for input in &spec.inputs {
                match input {
                    Input::State(_) => {}
                    Input::Node(handle) => {
                        if !self.contains(*handle) {
                            return Err(SignalError::UnknownHandle(*handle));
                        }
                    }
                    Input::Member(member) => {
                        if *member >= specs.len() {
                            return Err(SignalError::MalformedInputs(format!(
                                "batch member index {member} out of range for batch of {}",
                                specs.len()
                            )));
                        }
                        if *member == index {
                            return Err(SignalError::Cycle(index));
                        }
                    }
                }
            }
        }

        // Reachability check: from each declared member input back to the
        // declaring member. Edges to pre-existing nodes cannot loop back,
        // so only intra-batch edges matter.
        for (index, spec) in specs.iter().enumerate() {
            for input in &spec.inputs {
                if let Input::Member(member) = input {
                    if Self::batch_reaches(&specs, *member, index) {
                        return Err(SignalError::Cycle(index));
                    }
                }
            }
        }

        for (index, spec) in specs.into_iter().enumerate() {
            let inputs: SmallVec<[ResolvedInput<S>; INPUT_ARITY]> = spec
                .inputs
                .into_iter()
                .map(|input| match input {
                    Input::State(selector) => ResolvedInput::State(selector),
                    Input::Node(handle) => ResolvedInput::Node(handle.node),
                    Input::Member(member) => ResolvedInput::Node(ids[member]),
                })
                .collect();
            let equals = spec.equals.unwrap_or_else(default_equality);
            let node = SignalNode::new(ids[index], inputs, spec.compute, equals);
            self.nodes.insert(ids[index], node);
        }
        self.next_id += ids.len() as u64;

        // Reverse edges, in registration order.
        let mut edges: Vec<(NodeId, NodeId)> = Vec::new();
        for id in &ids {
            let node = self.nodes.get(id).expect("just inserted");
            for dep in node.dependency_ids() {
                edges.push((dep, *id));
            }
        }
        for (dep, dependent) in edges {
            self.nodes
                .get_mut(&dep)
                .expect("validated dependency")
                .add_dependent(dependent);
        }

        Ok(ids)
    }

    /// Can batch member `to` be reached from member `from` along
    /// intra-batch edges?
    fn batch_reaches(specs: &[SignalSpec<S>], from: usize, to: usize) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            for input in &specs[current].inputs {
                if let Input::Member(member) = input {
                    stack.push(*member);
                }
            }
        }
        false
    }

    /// Nodes that are candidates for recomputation on a store change:
    /// every node with a raw-state input, plus every node that has never
    /// settled (covers constants and nodes registered between passes).
    fn dirty_candidates(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|node| node.has_state_input() || !node.is_settled())
            .map(|node| node.id())
            .collect()
    }

    /// The full evaluation order for one pass: the dependents-closure of
    /// the dirty candidates, topologically sorted.
    pub(crate) fn dirty_pass_order(&self) -> Vec<NodeId> {
        let closure = self.closure_of(&self.dirty_candidates());
        self.topological_order(&closure)
    }

    /// Transitive dependents-closure of `seeds` (including the seeds).
    pub(crate) fn closure_of(&self, seeds: &[NodeId]) -> Vec<NodeId> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<NodeId> = seeds.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                queue.extend(node.dependents().iter().copied());
            }
        }
        seen.into_iter().collect()
    }

    /// Topological order of `set`, dependencies before dependents, ties
    /// broken by ascending registration order.
    pub(crate) fn topological_order(&self, set: &[NodeId]) -> Vec<NodeId> {
        let members: HashSet<NodeId> = set.iter().copied().collect();
        let mut in_degree: HashMap<NodeId, usize> = HashMap::with_capacity(set.len());
        let mut ready: BTreeSet<NodeId> = BTreeSet::new();

        for &id in set {
            let node = match self.nodes.get(&id) {
                Some(node) => node,
                None => continue,
            };
            let degree = node
                .dependency_ids()
                .filter(|dep| members.contains(dep))
                .count();
            in_degree.insert(id, degree);
            if degree == 0 {
                ready.insert(id);
            }
        }

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(id) = ready.pop_first() {
            order.push(id);
            let node = self.nodes.get(&id).expect("ordered node exists");
            for &dependent in node.dependents() {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }
        order
    }
}
