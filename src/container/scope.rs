//! Container access scope
//!
//! Every store operation and every rebuild runs inside the container's
//! access scope. The scope is a nesting RAII guard: a rebuild triggered from
//! inside an `Insert` re-enters the scope the `Insert` already holds.
//!
//! Writers are serialized by ownership (container mutations take `&mut self`),
//! so the scope records that a caller is inside rather than blocking.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Nesting depth counter owned by a container
#[derive(Debug, Default)]
pub struct ScopeCounter {
    depth: AtomicUsize,
}

impl ScopeCounter {
    /// Create a counter with no active scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a new (possibly nested) scope
    pub fn enter(&self) -> AccessScope<'_> {
        self.depth.fetch_add(1, Ordering::AcqRel);
        AccessScope { counter: self }
    }

    /// Returns true while at least one scope is held
    pub fn is_active(&self) -> bool {
        self.depth() > 0
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}

/// Guard returned by `Container::enter_access_scope`
///
/// The scope is released when the guard is dropped.
#[must_use = "the access scope is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct AccessScope<'a> {
    counter: &'a ScopeCounter,
}

impl AccessScope<'_> {
    /// Nesting depth including this guard
    pub fn depth(&self) -> usize {
        self.counter.depth()
    }
}

impl Drop for AccessScope<'_> {
    fn drop(&mut self) {
        self.counter.depth.fetch_sub(1, Ordering::AcqRel);
    }
}
