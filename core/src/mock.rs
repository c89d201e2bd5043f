//! Recorded stand-ins and explicit dependency substitution.
//!
//! Substitution is composition-time injection: a test builds a
//! [`SubstitutionRegistry`], registers stand-ins under dependency names, and
//! hands the registry to whatever constructs the unit under test. Nothing
//! global is rewritten, and the completion gate is indifferent to whether a
//! dependency was substituted.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

type Implementation<A, R> = Box<dyn FnMut(&A) -> R + Send>;

/// A recorded mock function.
///
/// Records every call's argument and produced return value, in call order.
/// The implementation can be replaced after construction, and the recording
/// can be cleared between cases.
pub struct MockFn<A, R> {
    implementation: Mutex<Implementation<A, R>>,
    calls: Mutex<Vec<A>>,
    results: Mutex<Vec<R>>,
}

impl<A, R> std::fmt::Debug for MockFn<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let calls = self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("MockFn")
            .field("calls", &calls)
            .finish_non_exhaustive()
    }
}

impl<A, R> MockFn<A, R>
where
    A: Clone,
    R: Clone,
{
    /// A mock whose implementation computes the return value from the argument.
    #[must_use]
    pub fn returning(implementation: impl FnMut(&A) -> R + Send + 'static) -> Self {
        Self {
            implementation: Mutex::new(Box::new(implementation)),
            calls: Mutex::new(Vec::new()),
            results: Mutex::new(Vec::new()),
        }
    }

    /// Replace the implementation. Recorded history is kept.
    pub fn set_implementation(&self, implementation: impl FnMut(&A) -> R + Send + 'static) {
        *self
            .implementation
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Box::new(implementation);
    }

    /// Invoke the mock, recording the argument and the produced value.
    pub fn call(&self, arg: A) -> R {
        let value = (self
            .implementation
            .lock()
            .unwrap_or_else(PoisonError::into_inner))(&arg);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(arg);
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value.clone());
        value
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Argument of the `n`-th call (zero-based).
    #[must_use]
    pub fn nth_call(&self, n: usize) -> Option<A> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(n)
            .cloned()
    }

    /// Return value produced by the `n`-th call (zero-based).
    #[must_use]
    pub fn nth_result(&self, n: usize) -> Option<R> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(n)
            .cloned()
    }

    /// All recorded call arguments, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<A> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any call was made with `expected` as its argument.
    #[must_use]
    pub fn was_called_with(&self, expected: &A) -> bool
    where
        A: PartialEq,
    {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|arg| arg == expected)
    }

    /// Forget all recorded calls and results. The implementation is kept.
    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl<A, R> Default for MockFn<A, R>
where
    A: Clone,
    R: Clone + Default,
{
    fn default() -> Self {
        Self::returning(|_| R::default())
    }
}

impl<A, R> MockFn<A, R>
where
    A: Clone,
    R: Clone + Default,
{
    /// A mock that returns `R::default()` until an implementation is set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Records the instances constructed for a mocked class-like dependency.
///
/// The consumer under test constructs its dependency through
/// [`MockInstances::construct`]; the test then inspects which instances exist
/// and interrogates their recorded methods.
#[derive(Debug)]
pub struct MockInstances<T> {
    instances: Mutex<Vec<Arc<T>>>,
}

impl<T> Default for MockInstances<T> {
    fn default() -> Self {
        Self {
            instances: Mutex::new(Vec::new()),
        }
    }
}

impl<T> MockInstances<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a constructed instance and hand it back for use.
    pub fn construct(&self, instance: T) -> Arc<T> {
        let instance = Arc::new(instance);
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&instance));
        instance
    }

    /// Number of constructions so far; the constructor call count.
    #[must_use]
    pub fn constructed(&self) -> usize {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// The `n`-th constructed instance (zero-based).
    #[must_use]
    pub fn instance(&self, n: usize) -> Option<Arc<T>> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(n)
            .cloned()
    }

    /// Forget all constructed instances.
    pub fn clear(&self) {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Dependency substitution registry, keyed by dependency name.
///
/// Values are type-erased; consumers downcast to the stand-in type they
/// expect. A lookup under the wrong type yields `None`, same as a missing
/// entry.
#[derive(Default)]
pub struct SubstitutionRegistry {
    entries: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl std::fmt::Debug for SubstitutionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SubstitutionRegistry")
            .field("names", &entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SubstitutionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the named dependency with a stand-in. A previous substitution
    /// under the same name is dropped.
    pub fn substitute<T>(&self, name: impl Into<String>, stand_in: Arc<T>)
    where
        T: Send + Sync + 'static,
    {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), stand_in);
    }

    /// Look up the named stand-in at composition time.
    #[must_use]
    pub fn lookup<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .and_then(|entry| entry.downcast::<T>().ok())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Remove a substitution; returns whether one existed.
    pub fn remove(&self, name: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }
}
