//! In-memory reference container
//!
//! Holds items in memory, records tombstone traits per position and owns a
//! fixed set of reserved slots. Items and reserved bytes survive
//! `unload`/`load`, which is how a reopened persisted container behaves;
//! `clear` wipes both.
//!
//! A mutation an observer rejects is undone: the container restores its
//! items and tombstones, then replays the inverse mutation to the observers
//! that had already accepted it. Reaps are not undone since tombstones are
//! permanent.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::errors::{ContainerError, ContainerResult};
use crate::index::IndexError;
use crate::observability::{log_event_with_fields, Event};
use super::scope::{AccessScope, ScopeCounter};
use super::stream::{ReservedSlot, ReservedStream};
use super::{Container, ContainerHandle, ContainerObserver, LifecycleEvent, Mutation, OperationType};

/// Observer registration shared between the container and its owner
pub type SharedObserver<T> = Arc<Mutex<dyn ContainerObserver<T> + Send>>;

/// Observers that accepted a notification before another one rejected it
struct Rejection {
    accepted: Vec<usize>,
    error: IndexError,
}

/// State visible to metadata stores through `ContainerHandle`
#[derive(Debug)]
struct ContainerCore {
    loaded: AtomicBool,
    scope: ScopeCounter,
    /// One entry per position: true when reaped
    tombstones: RwLock<Vec<bool>>,
    reserved: Vec<Arc<ReservedSlot>>,
}

impl Container for ContainerCore {
    fn count(&self) -> usize {
        self.tombstones
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    fn enter_access_scope(&self) -> AccessScope<'_> {
        self.scope.enter()
    }

    fn in_access_scope(&self) -> bool {
        self.scope.is_active()
    }

    fn is_reaped(&self, position: usize) -> bool {
        self.tombstones
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(position)
            .copied()
            .unwrap_or(false)
    }

    fn reserved_slot_count(&self) -> usize {
        self.reserved.len()
    }

    fn open_reserved_stream(&self, slot: usize, offset: u64) -> ContainerResult<ReservedStream> {
        let reserved = self.reserved.get(slot).ok_or(ContainerError::SlotOutOfRange {
            slot,
            count: self.reserved.len(),
        })?;
        reserved.claim(offset)
    }
}

impl ContainerCore {
    fn with_tombstones<R>(&self, f: impl FnOnce(&mut Vec<bool>) -> R) -> R {
        let mut tombstones = self
            .tombstones
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut tombstones)
    }
}

/// Ordered in-memory container of items
pub struct MemoryContainer<T> {
    core: Arc<ContainerCore>,
    items: Vec<T>,
    observers: Vec<SharedObserver<T>>,
    disposed: bool,
}

impl<T> MemoryContainer<T> {
    /// Create an unloaded, empty container with `reserved_slots` slots
    pub fn new(reserved_slots: usize) -> Self {
        Self {
            core: Arc::new(ContainerCore {
                loaded: AtomicBool::new(false),
                scope: ScopeCounter::new(),
                tombstones: RwLock::new(Vec::new()),
                reserved: (0..reserved_slots)
                    .map(|index| Arc::new(ReservedSlot::new(index)))
                    .collect(),
            }),
            items: Vec::new(),
            observers: Vec::new(),
            disposed: false,
        }
    }

    /// Handle given to metadata stores
    pub fn handle(&self) -> ContainerHandle {
        Arc::clone(&self.core) as ContainerHandle
    }

    /// Register an observer
    ///
    /// When the container is already loaded the observer receives
    /// `Loaded` immediately so it can attach.
    pub fn subscribe<O>(&mut self, observer: Arc<Mutex<O>>) -> ContainerResult<()>
    where
        O: ContainerObserver<T> + Send + 'static,
    {
        self.ensure_not_disposed()?;
        let observer: SharedObserver<T> = observer;
        self.observers.push(Arc::clone(&observer));

        if self.core.is_loaded() {
            let core = Arc::clone(&self.core);
            let _scope = core.enter_access_scope();
            observer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .on_lifecycle(LifecycleEvent::Loaded)?;
        }
        Ok(())
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Mark the container loaded and notify observers
    pub fn load(&mut self) -> ContainerResult<()> {
        self.ensure_not_disposed()?;
        if self.core.is_loaded() {
            return Ok(());
        }
        self.core.loaded.store(true, Ordering::Release);
        self.dispatch_lifecycle(LifecycleEvent::Loaded)
    }

    /// Notify observers, then mark the container unloaded
    ///
    /// Items and reserved bytes are kept for the next `load`.
    pub fn unload(&mut self) -> ContainerResult<()> {
        if !self.core.is_loaded() {
            return Ok(());
        }
        let result = self.dispatch_lifecycle(LifecycleEvent::Unloading);
        self.core.loaded.store(false, Ordering::Release);
        result
    }

    /// Drop every item and every reserved byte
    ///
    /// Observers see `Clearing` before anything is dropped and `Cleared`
    /// once the container is empty.
    pub fn clear(&mut self) -> ContainerResult<()> {
        self.ensure_loaded()?;
        self.dispatch_lifecycle(LifecycleEvent::Clearing)?;

        self.items.clear();
        self.core.with_tombstones(|tombstones| tombstones.clear());
        for slot in &self.core.reserved {
            slot.wipe()?;
        }

        self.dispatch_lifecycle(LifecycleEvent::Cleared)
    }

    /// Notify observers and release the container for good
    pub fn dispose(&mut self) -> ContainerResult<()> {
        if self.disposed {
            return Ok(());
        }
        let result = self.dispatch_lifecycle(LifecycleEvent::Disposing);
        self.core.loaded.store(false, Ordering::Release);
        self.observers.clear();
        self.disposed = true;
        result
    }

    /// Number of positions, reaped ones included
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the container holds no positions
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the position is reaped
    pub fn is_reaped(&self, position: usize) -> bool {
        self.core.is_reaped(position)
    }

    /// Item at `position` without notifying observers
    pub fn get(&self, position: usize) -> Option<&T> {
        self.items.get(position)
    }

    /// Item at `position`; observers see a `Read` notification
    pub fn read(&self, position: usize) -> ContainerResult<&T> {
        self.ensure_loaded()?;
        self.ensure_position(position)?;

        let core = Arc::clone(&self.core);
        let _scope = core.enter_access_scope();
        let item = &self.items[position];
        self.dispatch(&Mutation::new(position, item, OperationType::Read))
            .map_err(|rejection| ContainerError::Observer(rejection.error))?;
        Ok(item)
    }

    /// Append an item, returning its position
    pub fn add(&mut self, item: T) -> ContainerResult<usize> {
        self.ensure_loaded()?;
        let core = Arc::clone(&self.core);
        let _scope = core.enter_access_scope();

        let position = self.items.len();
        self.items.push(item);
        core.with_tombstones(|tombstones| tombstones.push(false));

        let mutation = Mutation::new(position, &self.items[position], OperationType::Add);
        let result = self.dispatch(&mutation);
        if let Err(rejection) = result {
            let item = self.items.remove(position);
            core.with_tombstones(|tombstones| tombstones.truncate(position));
            let inverse = Mutation::new(position, &item, OperationType::Remove);
            return Err(self.roll_back(OperationType::Add, rejection, &inverse));
        }
        Ok(position)
    }

    /// Insert an item at `position`, shifting later items right
    pub fn insert(&mut self, position: usize, item: T) -> ContainerResult<()> {
        self.ensure_loaded()?;
        if position > self.items.len() {
            return Err(ContainerError::PositionOutOfRange {
                position,
                count: self.items.len(),
            });
        }
        let core = Arc::clone(&self.core);
        let _scope = core.enter_access_scope();

        self.items.insert(position, item);
        core.with_tombstones(|tombstones| tombstones.insert(position, false));

        let mutation = Mutation::new(position, &self.items[position], OperationType::Insert);
        let result = self.dispatch(&mutation);
        if let Err(rejection) = result {
            let item = self.items.remove(position);
            core.with_tombstones(|tombstones| {
                tombstones.remove(position);
            });
            let inverse = Mutation::new(position, &item, OperationType::Remove);
            return Err(self.roll_back(OperationType::Insert, rejection, &inverse));
        }
        Ok(())
    }

    /// Replace the item at `position`, returning the previous item
    pub fn update(&mut self, position: usize, item: T) -> ContainerResult<T> {
        self.ensure_loaded()?;
        self.ensure_live(position)?;
        let core = Arc::clone(&self.core);
        let _scope = core.enter_access_scope();

        let previous = std::mem::replace(&mut self.items[position], item);

        let mutation = Mutation::new(position, &self.items[position], OperationType::Update);
        let result = self.dispatch(&mutation);
        if let Err(rejection) = result {
            self.items[position] = previous;
            let inverse = Mutation::new(position, &self.items[position], OperationType::Update);
            return Err(self.roll_back(OperationType::Update, rejection, &inverse));
        }
        Ok(previous)
    }

    /// Remove the item at `position`, shifting later items left
    pub fn remove(&mut self, position: usize) -> ContainerResult<T> {
        self.ensure_loaded()?;
        self.ensure_position(position)?;
        let core = Arc::clone(&self.core);
        let _scope = core.enter_access_scope();

        let reaped = core.is_reaped(position);
        let removed = self.items.remove(position);
        core.with_tombstones(|tombstones| tombstones.remove(position));

        let result = self.dispatch(&Mutation::new(position, &removed, OperationType::Remove));
        if let Err(rejection) = result {
            self.items.insert(position, removed);
            core.with_tombstones(|tombstones| tombstones.insert(position, reaped));
            let inverse = Mutation::new(position, &self.items[position], OperationType::Insert);
            return Err(self.roll_back(OperationType::Remove, rejection, &inverse));
        }
        Ok(removed)
    }

    /// Tombstone the item at `position`; the position stays occupied
    pub fn reap(&mut self, position: usize) -> ContainerResult<()> {
        self.ensure_loaded()?;
        self.ensure_live(position)?;
        let core = Arc::clone(&self.core);
        let _scope = core.enter_access_scope();

        core.with_tombstones(|tombstones| tombstones[position] = true);

        self.dispatch(&Mutation::new(position, &self.items[position], OperationType::Reap))
            .map_err(|rejection| ContainerError::Observer(rejection.error))
    }

    /// Deliver a notification to every observer, keeping the first error
    fn dispatch(&self, mutation: &Mutation<'_, T>) -> Result<(), Rejection> {
        let mut accepted = Vec::with_capacity(self.observers.len());
        let mut first_error = None;
        for (index, observer) in self.observers.iter().enumerate() {
            let mut observer = observer.lock().unwrap_or_else(PoisonError::into_inner);
            match observer.on_mutation(mutation) {
                Ok(()) => accepted.push(index),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(error) => Err(Rejection { accepted, error }),
            None => Ok(()),
        }
    }

    /// Replay `inverse` to the observers that accepted the rejected mutation
    ///
    /// Called once the container state is restored.
    fn roll_back(
        &self,
        operation: OperationType,
        rejection: Rejection,
        inverse: &Mutation<'_, T>,
    ) -> ContainerError {
        let position = inverse.position.to_string();
        log_event_with_fields(
            Event::MutationRolledBack,
            &[
                ("operation", operation.as_str()),
                ("position", position.as_str()),
                ("code", rejection.error.code().code()),
            ],
        );

        for index in rejection.accepted {
            let mut observer = self.observers[index]
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Err(err) = observer.on_mutation(inverse) {
                let observer_index = index.to_string();
                log_event_with_fields(
                    Event::ConsistencyViolation,
                    &[
                        ("observer", observer_index.as_str()),
                        ("operation", inverse.operation.as_str()),
                        ("position", position.as_str()),
                        ("code", err.code().code()),
                    ],
                );
            }
        }
        ContainerError::Observer(rejection.error)
    }

    fn dispatch_lifecycle(&self, event: LifecycleEvent) -> ContainerResult<()> {
        let core = Arc::clone(&self.core);
        let _scope = core.enter_access_scope();

        let mut first_error = None;
        for observer in &self.observers {
            let mut observer = observer.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(err) = observer.on_lifecycle(event) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(ContainerError::Observer(err)),
            None => Ok(()),
        }
    }

    fn ensure_not_disposed(&self) -> ContainerResult<()> {
        if self.disposed {
            return Err(ContainerError::Disposed);
        }
        Ok(())
    }

    fn ensure_loaded(&self) -> ContainerResult<()> {
        self.ensure_not_disposed()?;
        if !self.core.is_loaded() {
            return Err(ContainerError::NotLoaded);
        }
        Ok(())
    }

    fn ensure_position(&self, position: usize) -> ContainerResult<()> {
        if position >= self.items.len() {
            return Err(ContainerError::PositionOutOfRange {
                position,
                count: self.items.len(),
            });
        }
        Ok(())
    }

    fn ensure_live(&self, position: usize) -> ContainerResult<()> {
        self.ensure_position(position)?;
        if self.core.is_reaped(position) {
            return Err(ContainerError::Reaped(position));
        }
        Ok(())
    }
}

impl<T> fmt::Debug for MemoryContainer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryContainer")
            .field("count", &self.items.len())
            .field("loaded", &self.core.is_loaded())
            .field("reserved_slots", &self.core.reserved.len())
            .field("observers", &self.observers.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexResult;

    #[derive(Default)]
    struct Recorder {
        operations: Vec<(usize, OperationType)>,
        lifecycle: Vec<LifecycleEvent>,
        scope_seen: bool,
        handle: Option<ContainerHandle>,
    }

    impl ContainerObserver<String> for Recorder {
        fn on_mutation(&mut self, mutation: &Mutation<'_, String>) -> IndexResult<()> {
            self.operations.push((mutation.position, mutation.operation));
            if let Some(handle) = &self.handle {
                self.scope_seen = handle.in_access_scope();
            }
            Ok(())
        }

        fn on_lifecycle(&mut self, event: LifecycleEvent) -> IndexResult<()> {
            self.lifecycle.push(event);
            Ok(())
        }
    }

    /// Rejects every mutation of one operation type
    struct Rejecter(OperationType);

    impl ContainerObserver<String> for Rejecter {
        fn on_mutation(&mut self, mutation: &Mutation<'_, String>) -> IndexResult<()> {
            if mutation.operation == self.0 {
                return Err(IndexError::contract_violation("rejected"));
            }
            Ok(())
        }

        fn on_lifecycle(&mut self, _event: LifecycleEvent) -> IndexResult<()> {
            Ok(())
        }
    }

    fn rejecting(operation: OperationType) -> MemoryContainer<String> {
        let mut container = loaded();
        container
            .subscribe(Arc::new(Mutex::new(Rejecter(operation))))
            .unwrap();
        container
    }

    fn loaded() -> MemoryContainer<String> {
        let mut container = MemoryContainer::new(2);
        container.load().unwrap();
        container
    }

    #[test]
    fn test_mutations_require_load() {
        let mut container = MemoryContainer::<String>::new(1);
        assert!(matches!(
            container.add("a".to_string()),
            Err(ContainerError::NotLoaded)
        ));
    }

    #[test]
    fn test_notifications_in_order_inside_scope() {
        let mut container = loaded();
        let recorder = Arc::new(Mutex::new(Recorder {
            handle: Some(container.handle()),
            ..Default::default()
        }));
        container.subscribe(Arc::clone(&recorder)).unwrap();

        container.add("a".to_string()).unwrap();
        container.insert(0, "b".to_string()).unwrap();
        container.update(1, "c".to_string()).unwrap();
        container.reap(0).unwrap();
        container.read(1).unwrap();
        container.remove(0).unwrap();

        let recorder = recorder.lock().unwrap();
        assert_eq!(recorder.lifecycle, vec![LifecycleEvent::Loaded]);
        assert_eq!(
            recorder.operations,
            vec![
                (0, OperationType::Add),
                (0, OperationType::Insert),
                (1, OperationType::Update),
                (0, OperationType::Reap),
                (1, OperationType::Read),
                (0, OperationType::Remove),
            ]
        );
        assert!(recorder.scope_seen);
        assert!(!container.handle().in_access_scope());
    }

    #[test]
    fn test_tombstone_is_permanent() {
        let mut container = loaded();
        container.add("a".to_string()).unwrap();
        container.reap(0).unwrap();

        assert!(container.is_reaped(0));
        assert_eq!(container.len(), 1);
        assert!(matches!(container.reap(0), Err(ContainerError::Reaped(0))));
        assert!(matches!(
            container.update(0, "b".to_string()),
            Err(ContainerError::Reaped(0))
        ));
    }

    #[test]
    fn test_tombstones_shift_with_items() {
        let mut container = loaded();
        container.add("a".to_string()).unwrap();
        container.add("b".to_string()).unwrap();
        container.reap(1).unwrap();

        container.insert(0, "z".to_string()).unwrap();
        assert!(container.is_reaped(2));
        assert!(!container.is_reaped(1));

        container.remove(0).unwrap();
        assert!(container.is_reaped(1));
    }

    #[test]
    fn test_rejected_add_is_rolled_back() {
        let mut container = loaded();
        let recorder = Arc::new(Mutex::new(Recorder::default()));
        container.subscribe(Arc::clone(&recorder)).unwrap();
        container
            .subscribe(Arc::new(Mutex::new(Rejecter(OperationType::Add))))
            .unwrap();

        let err = container.add("a".to_string()).unwrap_err();

        assert!(err.observer_error().is_some());
        assert!(container.is_empty());
        assert_eq!(container.handle().count(), 0);
        assert_eq!(
            recorder.lock().unwrap().operations,
            vec![(0, OperationType::Add), (0, OperationType::Remove)]
        );
    }

    #[test]
    fn test_rejected_insert_is_rolled_back() {
        let mut container = rejecting(OperationType::Insert);
        container.add("a".to_string()).unwrap();

        assert!(container.insert(0, "z".to_string()).is_err());
        assert_eq!(container.len(), 1);
        assert_eq!(container.get(0).map(String::as_str), Some("a"));
        assert_eq!(container.handle().count(), 1);
    }

    #[test]
    fn test_rejected_update_restores_item() {
        let mut container = rejecting(OperationType::Update);
        container.add("a".to_string()).unwrap();

        assert!(container.update(0, "b".to_string()).is_err());
        assert_eq!(container.get(0).map(String::as_str), Some("a"));
    }

    #[test]
    fn test_rejected_remove_restores_tombstone() {
        let mut container = rejecting(OperationType::Remove);
        container.add("a".to_string()).unwrap();
        container.add("b".to_string()).unwrap();
        container.reap(1).unwrap();

        assert!(container.remove(1).is_err());
        assert_eq!(container.len(), 2);
        assert!(container.is_reaped(1));
        assert_eq!(container.get(1).map(String::as_str), Some("b"));
    }

    #[test]
    fn test_rejected_reap_keeps_tombstone() {
        let mut container = rejecting(OperationType::Reap);
        container.add("a".to_string()).unwrap();

        assert!(container.reap(0).is_err());
        assert!(container.is_reaped(0));
    }

    #[test]
    fn test_clear_wipes_reserved_slots() {
        let mut container = loaded();
        let handle = container.handle();
        {
            let stream = handle.open_reserved_stream(0, 4).unwrap();
            stream.write(0, b"data").unwrap();
        }
        container.add("a".to_string()).unwrap();

        container.clear().unwrap();
        assert!(container.is_empty());
        let stream = handle.open_reserved_stream(0, 0).unwrap();
        assert_eq!(stream.len().unwrap(), 0);
    }

    #[test]
    fn test_reserved_slot_out_of_range() {
        let container = loaded();
        let result = container.handle().open_reserved_stream(5, 0);
        assert!(matches!(
            result,
            Err(ContainerError::SlotOutOfRange { slot: 5, count: 2 })
        ));
    }

    #[test]
    fn test_subscribe_to_loaded_container_delivers_loaded() {
        let mut container = loaded();
        let recorder = Arc::new(Mutex::new(Recorder::default()));
        container.subscribe(Arc::clone(&recorder)).unwrap();

        assert_eq!(recorder.lock().unwrap().lifecycle, vec![LifecycleEvent::Loaded]);
    }

    #[test]
    fn test_lifecycle_sequence() {
        let mut container = MemoryContainer::<String>::new(1);
        let recorder = Arc::new(Mutex::new(Recorder::default()));
        container.subscribe(Arc::clone(&recorder)).unwrap();

        container.load().unwrap();
        container.clear().unwrap();
        container.unload().unwrap();
        container.dispose().unwrap();

        assert_eq!(
            recorder.lock().unwrap().lifecycle,
            vec![
                LifecycleEvent::Loaded,
                LifecycleEvent::Clearing,
                LifecycleEvent::Cleared,
                LifecycleEvent::Unloading,
                LifecycleEvent::Disposing,
            ]
        );
        assert!(matches!(container.load(), Err(ContainerError::Disposed)));
    }
}
