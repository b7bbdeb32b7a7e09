//! Type-Erased Values
//!
//! Signals carry heterogeneous outputs through one currency: an
//! atomically reference-counted [`std::any::Any`]. Cloning a [`Value`]
//! is a pointer copy, and two clones of the same settle compare equal by
//! identity, which is what makes referential stability observable to
//! callers.

use std::any::Any;
use std::sync::Arc;

/// The value currency of the graph.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Wrap a concrete value for the graph.
pub fn value<T: Any + Send + Sync>(inner: T) -> Value {
    Arc::new(inner)
}

/// Borrow the concrete value back out, if the type matches.
pub fn read<T: Any>(v: &Value) -> Option<&T> {
    v.downcast_ref::<T>()
}

/// Take a typed, shared handle to the value, if the type matches.
pub fn read_arc<T: Any + Send + Sync>(v: &Value) -> Option<Arc<T>> {
    Arc::clone(v).downcast::<T>().ok()
}
