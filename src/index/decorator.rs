//! Forwarding store decorator
//!
//! Implements the full store contract by delegating to an inner store.
//! Decorators that augment only some operations hold one of these and call
//! through it for everything else.

use super::errors::IndexResult;
use super::store::MetadataStore;
use crate::container::{ContainerHandle, LifecycleEvent};
use crate::storage::StoreEventReceiver;

/// Transparent wrapper around an inner store
#[derive(Debug)]
pub struct StoreDecorator<S> {
    inner: S,
}

impl<S: MetadataStore> StoreDecorator<S> {
    /// Wrap `inner`
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Inner store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Inner store, mutably
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap the inner store
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: MetadataStore> MetadataStore for StoreDecorator<S> {
    type Datum = S::Datum;

    fn container(&self) -> &ContainerHandle {
        self.inner.container()
    }

    fn count(&self) -> IndexResult<usize> {
        self.inner.count()
    }

    fn read(&self, position: usize) -> IndexResult<S::Datum> {
        self.inner.read(position)
    }

    fn read_bytes(&self, position: usize) -> IndexResult<Vec<u8>> {
        self.inner.read_bytes(position)
    }

    fn add(&mut self, position: usize, datum: S::Datum) -> IndexResult<()> {
        self.inner.add(position, datum)
    }

    fn update(&mut self, position: usize, datum: S::Datum) -> IndexResult<()> {
        self.inner.update(position, datum)
    }

    fn insert(&mut self, position: usize, datum: S::Datum) -> IndexResult<()> {
        self.inner.insert(position, datum)
    }

    fn remove(&mut self, position: usize) -> IndexResult<()> {
        self.inner.remove(position)
    }

    fn reap(&mut self, position: usize) -> IndexResult<()> {
        self.inner.reap(position)
    }

    fn clear(&mut self) -> IndexResult<()> {
        self.inner.clear()
    }

    fn requires_load(&self) -> bool {
        self.inner.requires_load()
    }

    fn load(&mut self) -> IndexResult<()> {
        self.inner.load()
    }

    fn on_container_event(&mut self, event: LifecycleEvent) -> IndexResult<()> {
        self.inner.on_container_event(event)
    }

    fn subscribe(&mut self) -> StoreEventReceiver {
        self.inner.subscribe()
    }
}
