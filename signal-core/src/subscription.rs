//! Subscription Manager
//!
//! Maps subscriptions (node, callback) to stable tokens. Callbacks on one
//! node fire in subscribe order, which the `IndexMap` storage gives us
//! directly.
//!
//! Notification safety: the engine snapshots a node's subscriptions
//! before invoking any callback, then re-checks liveness right before
//! each call. A callback may therefore unsubscribe anything (including
//! itself or a later entry in the same batch) without crashes or double
//! invocation, and a callback that subscribes adds entries that only join
//! the *next* pass.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::graph::NodeId;
use crate::value::Value;

/// Token identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A subscriber callback, invoked with the node's new output.
pub(crate) type SubscriberFn = Arc<dyn Fn(&Value) + Send + Sync>;

/// Registry of live subscriptions, in subscribe order.
pub(crate) struct SubscriptionRegistry {
    entries: IndexMap<SubscriptionId, (NodeId, SubscriberFn)>,
    next_id: u64,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            next_id: 0,
        }
    }

    pub(crate) fn subscribe(&mut self, node: NodeId, callback: SubscriberFn) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, (node, callback));
        id
    }

    /// Remove a subscription. Returns false if the token was already gone.
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        // shift_remove keeps the remaining entries in subscribe order.
        self.entries.shift_remove(&id).is_some()
    }

    pub(crate) fn is_live(&self, id: SubscriptionId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Snapshot the subscriptions on `node`, in subscribe order.
    pub(crate) fn snapshot_for(&self, node: NodeId) -> Vec<(SubscriptionId, SubscriberFn)> {
        self.entries
            .iter()
            .filter(|(_, (subscribed, _))| *subscribed == node)
            .map(|(id, (_, callback))| (*id, Arc::clone(callback)))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
