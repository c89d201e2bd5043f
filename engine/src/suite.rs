//! Suite construction: nested scopes, hooks, and registered cases.
//!
//! Scoping is an explicit tree, not lexical nesting: each [`Scope`] record
//! carries its own hook lists and an ordered list of items (cases and child
//! scopes). The runner composes per-test hook chains by walking the tree.

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crucible_core::{Done, TestCx};
use crucible_types::Failure;

use crate::gate::TestCase;

/// Hook registered on a scope. `Fn` because per-test hooks run repeatedly;
/// `Arc` because ancestor chains are composed by cloning.
pub(crate) type Hook = Arc<dyn Fn() -> BoxFuture<'static, Result<(), Failure>> + Send + Sync>;

fn sync_hook(hook: impl Fn() + Send + Sync + 'static) -> Hook {
    Arc::new(move || {
        hook();
        futures_util::future::ready(Ok(())).boxed()
    })
}

fn async_hook<F, Fut>(hook: F) -> Hook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Failure>> + Send + 'static,
{
    Arc::new(move || hook().boxed())
}

pub(crate) enum ScopeItem {
    Case(TestCase),
    Child(Scope),
}

/// One setup/teardown scope: hooks plus cases and child scopes, in
/// registration order.
pub struct Scope {
    pub(crate) name: String,
    pub(crate) before_all: Vec<Hook>,
    pub(crate) before_each: Vec<Hook>,
    pub(crate) after_each: Vec<Hook>,
    pub(crate) after_all: Vec<Hook>,
    pub(crate) items: Vec<ScopeItem>,
}

impl Scope {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before_all: Vec::new(),
            before_each: Vec::new(),
            after_each: Vec::new(),
            after_all: Vec::new(),
            items: Vec::new(),
        }
    }

    /// Register a synchronous case.
    pub fn test(
        &mut self,
        name: impl Into<String>,
        body: impl FnOnce(TestCx) -> Result<(), Failure> + Send + 'static,
    ) {
        self.items.push(ScopeItem::Case(TestCase::sync(name, body)));
    }

    /// Register a future-style case.
    pub fn test_async<F, Fut>(&mut self, name: impl Into<String>, body: F)
    where
        F: FnOnce(TestCx) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Failure>> + Send + 'static,
    {
        self.items
            .push(ScopeItem::Case(TestCase::future(name, body)));
    }

    /// Register a callback-style case; the body receives the completion
    /// handle and the case stays pending until it fires.
    pub fn test_with_done(
        &mut self,
        name: impl Into<String>,
        body: impl FnOnce(TestCx, Done) + Send + 'static,
    ) {
        self.items
            .push(ScopeItem::Case(TestCase::callback(name, body)));
    }

    /// Open a nested scope.
    pub fn describe(&mut self, name: impl Into<String>, build: impl FnOnce(&mut Scope)) {
        let mut child = Scope::new(name);
        build(&mut child);
        self.items.push(ScopeItem::Child(child));
    }

    /// Runs once, before the first item in this scope.
    pub fn before_all(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.before_all.push(sync_hook(hook));
    }

    /// Runs once before the first item; the scope waits for the returned work.
    pub fn before_all_async<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Failure>> + Send + 'static,
    {
        self.before_all.push(async_hook(hook));
    }

    /// Runs before every case in this scope and its children.
    pub fn before_each(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.before_each.push(sync_hook(hook));
    }

    pub fn before_each_async<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Failure>> + Send + 'static,
    {
        self.before_each.push(async_hook(hook));
    }

    /// Runs after every case in this scope and its children.
    pub fn after_each(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.after_each.push(sync_hook(hook));
    }

    pub fn after_each_async<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Failure>> + Send + 'static,
    {
        self.after_each.push(async_hook(hook));
    }

    /// Runs once, after the last item in this scope.
    pub fn after_all(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.after_all.push(sync_hook(hook));
    }

    pub fn after_all_async<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Failure>> + Send + 'static,
    {
        self.after_all.push(async_hook(hook));
    }

    pub(crate) fn case_count(&self) -> usize {
        self.items
            .iter()
            .map(|item| match item {
                ScopeItem::Case(_) => 1,
                ScopeItem::Child(child) => child.case_count(),
            })
            .sum()
    }
}

/// A named collection of cases and scopes, created when the suite is loaded
/// and consumed by one run.
pub struct Suite {
    pub(crate) name: String,
    pub(crate) root: Scope,
}

impl Suite {
    /// Build a suite by registering cases and scopes on its root scope.
    #[must_use]
    pub fn build(name: impl Into<String>, build: impl FnOnce(&mut Scope)) -> Self {
        let mut root = Scope::new("");
        build(&mut root);
        Self {
            name: name.into(),
            root,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total registered cases, across all nesting levels.
    #[must_use]
    pub fn case_count(&self) -> usize {
        self.root.case_count()
    }
}
