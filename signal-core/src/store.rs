//! External Store Seam
//!
//! The core does not own application state; it borrows snapshots from an
//! attached store. The [`Store`] trait is the full extent of what the
//! core needs: read the current snapshot, and register a change listener.
//!
//! [`MemoryStore`] is a minimal reference implementation with the usual
//! single-writer, immutable-snapshot semantics, used by the test suite
//! and small programs. Real deployments adapt their own store behind the
//! trait.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Detaches a listener when invoked.
pub type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

/// The interface the signal core requires from a state store.
pub trait Store<S>: Send + Sync {
    /// The current immutable state snapshot.
    fn get_state(&self) -> S;

    /// Register a change listener; the returned closure removes it.
    fn subscribe(&self, listener: Box<dyn Fn() + Send + Sync>) -> Unsubscribe;
}

type Listener = Arc<dyn Fn() + Send + Sync>;

/// A minimal in-process store holding a cloneable state snapshot.
pub struct MemoryStore<S> {
    state: RwLock<S>,
    listeners: Arc<Mutex<Vec<(u64, Listener)>>>,
    next_listener: AtomicU64,
}

impl<S> MemoryStore<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Create a store with the given initial state.
    pub fn new(initial: S) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(initial),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener: AtomicU64::new(0),
        })
    }

    /// Replace the state snapshot and notify listeners.
    pub fn set_state(&self, next: S) {
        *self.state.write() = next;
        self.notify();
    }

    /// Replace the state with a function of the current snapshot.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&S) -> S,
    {
        let next = f(&self.state.read());
        self.set_state(next);
    }

    fn notify(&self) {
        // Snapshot outside the lock: a listener may re-enter set_state.
        let snapshot: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener();
        }
    }
}

impl<S> Store<S> for MemoryStore<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn get_state(&self) -> S {
        self.state.read().clone()
    }

    fn subscribe(&self, listener: Box<dyn Fn() + Send + Sync>) -> Unsubscribe {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::from(listener)));

        let listeners = Arc::clone(&self.listeners);
        Box::new(move || {
            listeners.lock().retain(|(lid, _)| *lid != id);
        })
    }
}
