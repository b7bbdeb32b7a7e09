//! Equality Policies
//!
//! Every memoization decision in the graph runs through an equality
//! policy: state inputs are gated against their cached values and a
//! recomputed output is gated against the previous one. The default
//! policy is reference equality with a value-equality carve-out for
//! primitive scalars, which mirrors how an immutable store behaves:
//! composite values that were not rebuilt keep their identity, while
//! scalars are compared by content.
//!
//! Nodes can override the policy per registration via
//! [`SignalSpec::with_equality`](crate::SignalSpec::with_equality).

use std::any::Any;
use std::sync::Arc;

use crate::value::Value;

/// A pluggable equality predicate over graph values.
pub type EqualityFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

macro_rules! try_scalar {
    ($a:expr, $b:expr, $($ty:ty),+ $(,)?) => {
        $(
            if let (Some(x), Some(y)) = ($a.downcast_ref::<$ty>(), $b.downcast_ref::<$ty>()) {
                return x == y;
            }
        )+
    };
}

/// The default policy: identity first, then value equality for
/// primitive scalar types, otherwise unequal.
pub fn default_equals(a: &Value, b: &Value) -> bool {
    if Arc::ptr_eq(a, b) {
        return true;
    }
    try_scalar!(
        a, b, bool, char, (), i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize,
        f32, f64, String, &'static str,
    );
    false
}

/// The default policy as an [`EqualityFn`].
pub fn default_equality() -> EqualityFn {
    Arc::new(default_equals)
}

/// Strict reference equality, with no scalar carve-out.
pub fn by_identity() -> EqualityFn {
    Arc::new(|a: &Value, b: &Value| Arc::ptr_eq(a, b))
}

/// Structural equality for a known concrete type.
///
/// Values that fail to downcast to `T` are treated as unequal.
pub fn by_value<T: Any + PartialEq>() -> EqualityFn {
    Arc::new(|a: &Value, b: &Value| {
        match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    })
}
