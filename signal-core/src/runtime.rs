//! Signal Graph Facade
//!
//! [`SignalGraph`] is the public entry point: it owns the dependency
//! graph, the subscription registry, the engine's phase machine, and the
//! binding to one external store. Each graph is an independent instance;
//! there is no process-wide singleton, so tests and embedders can run
//! many graphs side by side.
//!
//! # Triggering
//!
//! In the default store-driven mode, `attach` registers exactly one
//! listener with the store; every store change runs one synchronous
//! evaluation pass followed by subscriber notification. In lazy mode no
//! listener is registered and `get_value` pulls a pass on demand.
//!
//! # Re-entrancy
//!
//! A subscriber callback may mutate the store (or call `recompute_now`).
//! The resulting trigger is queued, not nested: the engine finishes
//! notifying for the current pass, then drains queued triggers FIFO, one
//! pass per trigger. The call stack never grows with the trigger chain.
//!
//! # Locking
//!
//! The graph lock is held for the whole recompute phase (the exclusive
//! evaluation pass), the subscription and engine locks only for short
//! bookkeeping. No lock is held while user callbacks run, so callbacks
//! are free to read values, register signals, and manage subscriptions.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::engine::{self, PassReport, Phase};
use crate::error::SignalError;
use crate::graph::{BoxError, DependencyGraph, Input, SignalHandle, SignalSpec};
use crate::store::{Store, Unsubscribe};
use crate::subscription::{SubscriptionId, SubscriptionRegistry};
use crate::value::Value;

/// How passes are triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationMode {
    /// `attach` registers a store listener; every store change runs a pass.
    #[default]
    StoreDriven,

    /// No listener; `get_value` runs a pass on demand.
    Lazy,
}

/// Per-graph configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphOptions {
    pub mode: EvaluationMode,
}

struct EngineState {
    phase: Phase,
    /// Triggers that arrived while a pass was in flight.
    pending: usize,
    last_report: PassReport,
}

struct Shared<S: 'static> {
    options: GraphOptions,
    graph: RwLock<DependencyGraph<S>>,
    subs: Mutex<SubscriptionRegistry>,
    engine: Mutex<EngineState>,
    store: RwLock<Option<Arc<dyn Store<S>>>>,
    detach: Mutex<Option<Unsubscribe>>,
}

/// A dependency-tracked, memoized signal graph bound to one store.
///
/// Cloning is cheap and shares the underlying graph.
pub struct SignalGraph<S: 'static> {
    shared: Arc<Shared<S>>,
}

impl<S: 'static> Clone for SignalGraph<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: 'static> Default for SignalGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static> SignalGraph<S> {
    /// Create a store-driven graph.
    pub fn new() -> Self {
        Self::with_options(GraphOptions::default())
    }

    /// Create a graph with explicit options.
    pub fn with_options(options: GraphOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                options,
                graph: RwLock::new(DependencyGraph::new()),
                subs: Mutex::new(SubscriptionRegistry::new()),
                engine: Mutex::new(EngineState {
                    phase: Phase::Idle,
                    pending: 0,
                    last_report: PassReport::default(),
                }),
                store: RwLock::new(None),
                detach: Mutex::new(None),
            }),
        }
    }

    /// Register one signal.
    pub fn create_signal<F>(
        &self,
        inputs: Vec<Input<S>>,
        compute: F,
    ) -> Result<SignalHandle, SignalError>
    where
        F: Fn(&[Value]) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.create_signal_with(SignalSpec::new(inputs, compute))
    }

    /// Register one signal from a full spec (e.g. with an equality override).
    pub fn create_signal_with(&self, spec: SignalSpec<S>) -> Result<SignalHandle, SignalError> {
        let mut handles = self.create_signals(vec![spec])?;
        Ok(handles.remove(0))
    }

    /// Register a batch of signals whose members may reference each other
    /// via [`Input::Member`].
    ///
    /// Registration is atomic: a cycle or invalid input anywhere in the
    /// batch registers nothing.
    pub fn create_signals(
        &self,
        specs: Vec<SignalSpec<S>>,
    ) -> Result<Vec<SignalHandle>, SignalError> {
        let mut graph = self.shared.graph.write();
        let ids = graph.insert(specs)?;
        Ok(ids.into_iter().map(|id| graph.handle(id)).collect())
    }

    /// Bind this graph to its store. Exactly one store per graph.
    pub fn attach(&self, store: Arc<dyn Store<S>>) -> Result<(), SignalError> {
        {
            let mut slot = self.shared.store.write();
            if slot.is_some() {
                return Err(SignalError::AlreadyAttached);
            }
            *slot = Some(Arc::clone(&store));
        }

        if self.shared.options.mode == EvaluationMode::StoreDriven {
            let weak = Arc::downgrade(&self.shared);
            let unsubscribe = store.subscribe(Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_store_change();
                }
            }));
            *self.shared.detach.lock() = Some(unsubscribe);
        }
        debug!(mode = ?self.shared.options.mode, "store attached");
        Ok(())
    }

    /// Subscribe to a signal. The callback fires once per pass in which
    /// the signal's output actually changed, with the new value.
    pub fn subscribe<F>(
        &self,
        handle: SignalHandle,
        callback: F,
    ) -> Result<SubscriptionId, SignalError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        if !self.shared.graph.read().contains(handle) {
            return Err(SignalError::UnknownHandle(handle));
        }
        Ok(self
            .shared
            .subs
            .lock()
            .subscribe(handle.node, Arc::new(callback)))
    }

    /// Remove a subscription. Returns false if the token was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.subs.lock().unsubscribe(id)
    }

    /// Read a signal's latest settled value.
    ///
    /// Runs an on-demand pass when the graph is lazy or the signal has
    /// never settled; both require an attached store.
    pub fn get_value(&self, handle: SignalHandle) -> Result<Value, SignalError> {
        let settled = {
            let graph = self.shared.graph.read();
            if !graph.contains(handle) {
                return Err(SignalError::UnknownHandle(handle));
            }
            graph.get(handle.node).and_then(|node| node.output().cloned())
        };

        if self.shared.options.mode == EvaluationMode::Lazy || settled.is_none() {
            match self.shared.try_pass() {
                Ok(()) => {}
                // A settled value stays readable even with no store.
                Err(SignalError::NotAttached) if settled.is_some() => {}
                Err(err) => return Err(err),
            }
        }

        self.shared
            .graph
            .read()
            .get(handle.node)
            .and_then(|node| node.output().cloned())
            .ok_or(SignalError::Unsettled(handle))
    }

    /// The signal's version counter: bumped once per real output change.
    pub fn version(&self, handle: SignalHandle) -> Result<u64, SignalError> {
        let graph = self.shared.graph.read();
        if !graph.contains(handle) {
            return Err(SignalError::UnknownHandle(handle));
        }
        Ok(graph.get(handle.node).map(|node| node.version()).unwrap_or(0))
    }

    /// Manually trigger an evaluation pass and return its report.
    ///
    /// Called while a pass is already in flight (from a subscriber
    /// callback), this queues a follow-up pass and returns the in-flight
    /// pass's last recorded report.
    pub fn recompute_now(&self) -> Result<PassReport, SignalError> {
        if self.shared.store.read().is_none() {
            return Err(SignalError::NotAttached);
        }
        {
            let mut engine = self.shared.engine.lock();
            if engine.phase != Phase::Idle {
                engine.pending += 1;
                return Ok(engine.last_report.clone());
            }
            engine.phase = Phase::Evaluating;
        }
        self.shared.run_passes();
        Ok(self.shared.engine.lock().last_report.clone())
    }

    /// The report of the most recently completed pass.
    pub fn last_report(&self) -> PassReport {
        self.shared.engine.lock().last_report.clone()
    }

    /// Number of registered signals.
    pub fn node_count(&self) -> usize {
        self.shared.graph.read().node_count()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.shared.subs.lock().len()
    }
}

impl<S: 'static> Shared<S> {
    /// Store listener entry point.
    fn on_store_change(&self) {
        {
            let mut engine = self.engine.lock();
            if engine.phase != Phase::Idle {
                // A pass is running on this very call stack; queue.
                engine.pending += 1;
                return;
            }
            engine.phase = Phase::Evaluating;
        }
        self.run_passes();
    }

    /// On-demand trigger for `get_value`.
    fn try_pass(&self) -> Result<(), SignalError> {
        if self.store.read().is_none() {
            return Err(SignalError::NotAttached);
        }
        {
            let mut engine = self.engine.lock();
            if engine.phase != Phase::Idle {
                // Mid-pass reads see the values settled so far.
                return Ok(());
            }
            engine.phase = Phase::Evaluating;
        }
        self.run_passes();
        Ok(())
    }

    /// Run one pass, notify, then drain queued triggers FIFO.
    ///
    /// Caller must have moved the phase to `Evaluating`.
    fn run_passes(&self) {
        loop {
            let store = self.store.read().clone();
            let Some(store) = store else {
                let mut engine = self.engine.lock();
                engine.phase = Phase::Idle;
                engine.pending = 0;
                return;
            };

            let state = store.get_state();
            let (report, changed) = {
                let mut graph = self.graph.write();
                engine::run_pass(&mut graph, &state)
            };
            {
                let mut engine = self.engine.lock();
                engine.phase = Phase::Notifying;
                engine.last_report = report;
            }
            self.notify_changed(&changed);

            let mut engine = self.engine.lock();
            if engine.pending > 0 {
                engine.pending -= 1;
                engine.phase = Phase::Evaluating;
            } else {
                engine.phase = Phase::Idle;
                return;
            }
        }
    }

    /// Invoke subscriber callbacks for the changed nodes, in pass order,
    /// each node's callbacks in subscribe order.
    fn notify_changed(&self, changed: &[(crate::graph::NodeId, Value)]) {
        for (node, new_value) in changed {
            let snapshot = self.subs.lock().snapshot_for(*node);
            for (sub_id, callback) in snapshot {
                // Re-check: an earlier callback may have unsubscribed it.
                let live = self.subs.lock().is_live(sub_id);
                if live {
                    callback(new_value);
                }
            }
        }
    }
}

impl<S: 'static> Drop for Shared<S> {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.detach.lock().take() {
            unsubscribe();
        }
    }
}
