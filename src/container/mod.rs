//! Container contract consumed by the metadata index layer
//!
//! The container is the ordered, persisted collection being indexed. It is
//! the source of truth: item count, tombstone traits and reserved slot
//! storage all live here. The index layer only reads these through the
//! `Container` trait and reacts to the notifications it emits.
//!
//! # Notifications
//!
//! - `Mutation` is delivered after the mutation is applied, one per change
//! - `LifecycleEvent` follows load, clear, unload and dispose
//!
//! Observers are invoked synchronously, in registration order, while the
//! container holds its access scope.

mod errors;
mod memory;
mod scope;
mod stream;

use std::fmt;
use std::sync::Arc;

pub use errors::{ContainerError, ContainerResult};
pub use memory::{MemoryContainer, SharedObserver};
pub use scope::{AccessScope, ScopeCounter};
pub use stream::{ReservedSlot, ReservedStream};

use crate::index::IndexResult;

/// Read-only view of a container used by metadata stores
pub trait Container: fmt::Debug {
    /// Number of item positions, reaped positions included
    fn count(&self) -> usize;

    /// Whether the container has been loaded
    fn is_loaded(&self) -> bool;

    /// Enter the container's access scope for the lifetime of the guard
    fn enter_access_scope(&self) -> AccessScope<'_>;

    /// Whether the caller currently holds the access scope
    fn in_access_scope(&self) -> bool;

    /// Whether the position carries the container's tombstone trait
    fn is_reaped(&self, position: usize) -> bool;

    /// Number of reserved slots the container declares
    fn reserved_slot_count(&self) -> usize;

    /// Open the exclusive byte view over a reserved slot
    fn open_reserved_stream(&self, slot: usize, offset: u64) -> ContainerResult<ReservedStream>;
}

/// Shared handle to a container, held by every metadata store
pub type ContainerHandle = Arc<dyn Container + Send + Sync>;

/// Kind of change a mutation notification describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    /// Item was read; no change
    Read,
    /// Item appended at the end
    Add,
    /// Item inserted, later positions shifted right
    Insert,
    /// Item replaced in place
    Update,
    /// Item removed, later positions shifted left
    Remove,
    /// Item tombstoned; position and count unchanged
    Reap,
}

impl OperationType {
    /// Returns the string representation used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Read => "read",
            OperationType::Add => "add",
            OperationType::Insert => "insert",
            OperationType::Update => "update",
            OperationType::Remove => "remove",
            OperationType::Reap => "reap",
        }
    }

    /// Whether the operation changes the container
    pub fn is_mutation(&self) -> bool {
        !matches!(self, OperationType::Read)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Post-mutation notification
#[derive(Debug, Clone, Copy)]
pub struct Mutation<'a, T> {
    /// Position the operation applied to
    pub position: usize,
    /// The item (the removed item for `Remove`)
    pub item: &'a T,
    /// What happened
    pub operation: OperationType,
}

impl<'a, T> Mutation<'a, T> {
    /// Create a notification
    pub fn new(position: usize, item: &'a T, operation: OperationType) -> Self {
        Self {
            position,
            item,
            operation,
        }
    }
}

/// Container lifecycle transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Container finished loading
    Loaded,
    /// Container is about to drop all items and reserved bytes
    Clearing,
    /// Container is empty again and still loaded
    Cleared,
    /// Container is about to unload; persisted bytes survive
    Unloading,
    /// Container is going away for good
    Disposing,
}

impl LifecycleEvent {
    /// Returns the string representation used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Loaded => "loaded",
            LifecycleEvent::Clearing => "clearing",
            LifecycleEvent::Cleared => "cleared",
            LifecycleEvent::Unloading => "unloading",
            LifecycleEvent::Disposing => "disposing",
        }
    }

    /// Whether stream views must be closed before the event proceeds
    pub fn requires_detach(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::Clearing | LifecycleEvent::Unloading | LifecycleEvent::Disposing
        )
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Receiver of container notifications
pub trait ContainerObserver<T> {
    /// Called after each operation on an item
    fn on_mutation(&mut self, mutation: &Mutation<'_, T>) -> IndexResult<()>;

    /// Called on each lifecycle transition
    fn on_lifecycle(&mut self, event: LifecycleEvent) -> IndexResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_is_not_a_mutation() {
        assert!(!OperationType::Read.is_mutation());
        for op in [
            OperationType::Add,
            OperationType::Insert,
            OperationType::Update,
            OperationType::Remove,
            OperationType::Reap,
        ] {
            assert!(op.is_mutation(), "{} should mutate", op);
        }
    }

    #[test]
    fn test_detach_events() {
        assert!(LifecycleEvent::Clearing.requires_detach());
        assert!(LifecycleEvent::Unloading.requires_detach());
        assert!(LifecycleEvent::Disposing.requires_detach());
        assert!(!LifecycleEvent::Loaded.requires_detach());
        assert!(!LifecycleEvent::Cleared.requires_detach());
    }
}
