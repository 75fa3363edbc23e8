//! Propagation chain: an immutable, structurally shared value bag threaded
//! through middleware and handlers for the lifetime of one request.
//!
//! Every binding produces a new [`Context`] whose head points at the
//! previous chain, so a clone taken before an update keeps observing the old
//! snapshot. Keys are types, compared by [`TypeId`]; a module that keeps its
//! key type private owns its slot outright, which rules out collisions with
//! other components' bindings.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Per-request carrier of scoped values.
///
/// Cloning is O(1). [`Context::with_value`] never mutates the receiver.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Binding>>,
}

struct Binding {
    key: TypeId,
    value: Box<dyn Any + Send + Sync>,
    parent: Option<Arc<Binding>>,
}

/// Outcome of reading a slot from a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The nearest binding for the key holds a value of the requested type.
    Present(T),
    /// The key is bound, but to a value of another type.
    Mismatched,
    /// The key was never bound on this chain.
    Absent,
}

impl<T> Lookup<T> {
    pub fn present(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Mismatched | Self::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl Context {
    /// The empty chain every request starts from.
    pub fn background() -> Self {
        Self::default()
    }

    /// Bind `value` under the key type `K`, returning the extended chain.
    pub fn with_value<K: 'static, V: Any + Send + Sync>(&self, value: V) -> Self {
        Self {
            head: Some(Arc::new(Binding {
                key: TypeId::of::<K>(),
                value: Box::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Read the nearest binding for `K`, checking that it holds a `V`.
    ///
    /// Newer bindings shadow older ones; a shadowed binding is never
    /// consulted, even when the newer one has the wrong type.
    pub fn lookup<K: 'static, V: 'static>(&self) -> Lookup<&V> {
        let key = TypeId::of::<K>();
        let mut node = self.head.as_deref();
        while let Some(binding) = node {
            if binding.key == key {
                return match (*binding.value).downcast_ref::<V>() {
                    Some(value) => Lookup::Present(value),
                    None => Lookup::Mismatched,
                };
            }
            node = binding.parent.as_deref();
        }
        Lookup::Absent
    }

    /// Shorthand for [`Context::lookup`] when the caller does not care why a
    /// value is missing.
    pub fn value<K: 'static, V: 'static>(&self) -> Option<&V> {
        self.lookup::<K, V>().present()
    }

    /// Number of bindings on the chain, shadowed ones included.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self.head.as_deref();
        while let Some(binding) = node {
            depth += 1;
            node = binding.parent.as_deref();
        }
        depth
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("depth", &self.depth()).finish()
    }
}
