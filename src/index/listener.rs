//! Container listener
//!
//! Translates item-level container notifications into key-level store
//! operations. The listener owns the store and a projection function; it
//! keeps no other state.

use std::fmt;

use super::errors::IndexResult;
use super::store::MetadataStore;
use crate::container::{ContainerObserver, LifecycleEvent, Mutation, OperationType};

type Projection<T, D> = Box<dyn Fn(&T) -> IndexResult<D> + Send>;

/// Replays container mutations onto a metadata store
pub struct ContainerListener<T, S: MetadataStore> {
    store: S,
    projection: Projection<T, S::Datum>,
}

impl<T, S: MetadataStore> ContainerListener<T, S> {
    /// Listener with an infallible projection
    pub fn new<F>(store: S, projection: F) -> Self
    where
        F: Fn(&T) -> S::Datum + Send + 'static,
    {
        Self::try_new(store, move |item| Ok(projection(item)))
    }

    /// Listener whose projection may reject an item
    pub fn try_new<F>(store: S, projection: F) -> Self
    where
        F: Fn(&T) -> IndexResult<S::Datum> + Send + 'static,
    {
        Self {
            store,
            projection: Box::new(projection),
        }
    }

    /// Store the listener drives
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Store the listener drives, mutably
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Unwrap the store
    pub fn into_store(self) -> S {
        self.store
    }
}

impl<T, S: MetadataStore> ContainerObserver<T> for ContainerListener<T, S> {
    fn on_mutation(&mut self, mutation: &Mutation<'_, T>) -> IndexResult<()> {
        let position = mutation.position;
        match mutation.operation {
            OperationType::Read => Ok(()),
            OperationType::Add => {
                let key = (self.projection)(mutation.item)?;
                self.store.add(position, key)
            }
            OperationType::Insert => {
                let key = (self.projection)(mutation.item)?;
                self.store.insert(position, key)
            }
            OperationType::Update => {
                let key = (self.projection)(mutation.item)?;
                self.store.update(position, key)
            }
            OperationType::Remove => self.store.remove(position),
            OperationType::Reap => self.store.reap(position),
        }
    }

    fn on_lifecycle(&mut self, event: LifecycleEvent) -> IndexResult<()> {
        self.store.on_container_event(event)
    }
}

impl<T, S: MetadataStore> fmt::Debug for ContainerListener<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerListener")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::container::MemoryContainer;
    use crate::index::{FixedKey, IndexErrorCode, PersistedStore};

    fn contents(store: &PersistedStore<u32>) -> Vec<u32> {
        (0..store.count().unwrap())
            .map(|p| store.read(p).unwrap())
            .collect()
    }

    #[test]
    fn test_replays_mutations() {
        let mut container = MemoryContainer::<String>::new(1);
        let store: PersistedStore<u32> = PersistedStore::new(container.handle(), 0, 0);
        let listener = Arc::new(Mutex::new(ContainerListener::new(store, |s: &String| {
            s.len() as u32
        })));
        container.subscribe(Arc::clone(&listener)).unwrap();
        container.load().unwrap();

        container.add("a".to_string()).unwrap();
        container.add("ccc".to_string()).unwrap();
        container.insert(1, "bb".to_string()).unwrap();
        assert_eq!(contents(listener.lock().unwrap().store()), vec![1, 2, 3]);

        container.update(0, "dddd".to_string()).unwrap();
        container.remove(1).unwrap();
        container.reap(0).unwrap();
        container.read(1).unwrap();
        assert_eq!(contents(listener.lock().unwrap().store()), vec![4, 3]);
    }

    #[test]
    fn test_projection_failure_surfaces_at_container() {
        let mut container = MemoryContainer::<String>::new(1);
        let store: PersistedStore<FixedKey<4>> = PersistedStore::new(container.handle(), 0, 0);
        let listener = Arc::new(Mutex::new(ContainerListener::try_new(store, |s: &String| {
            FixedKey::new(s.as_str())
        })));
        container.subscribe(Arc::clone(&listener)).unwrap();
        container.load().unwrap();

        container.add("ok".to_string()).unwrap();
        let err = container.add("too long".to_string()).unwrap_err();
        let cause = err.observer_error().unwrap();
        assert_eq!(cause.code(), IndexErrorCode::AeroIndexContractViolation);

        assert_eq!(container.len(), 1);
        container.add("next".to_string()).unwrap();
        assert_eq!(listener.lock().unwrap().store().count().unwrap(), 2);
    }

    #[test]
    fn test_subscribe_after_load_attaches() {
        let mut container = MemoryContainer::<u32>::new(1);
        container.load().unwrap();
        let store: PersistedStore<u32> = PersistedStore::new(container.handle(), 0, 0);
        let listener = Arc::new(Mutex::new(ContainerListener::new(store, |v: &u32| *v)));
        container.subscribe(Arc::clone(&listener)).unwrap();

        assert!(listener.lock().unwrap().store().is_attached());
        container.add(5).unwrap();
        assert_eq!(contents(listener.lock().unwrap().store()), vec![5]);
    }
}
