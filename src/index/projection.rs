//! In-memory projection over a metadata store
//!
//! Wraps a store and keeps a key view in step with it. Every operation runs
//! validate, then forward, then mutate the view:
//!
//! | Operation | View step after forwarding                     |
//! |-----------|------------------------------------------------|
//! | add       | map key to position                            |
//! | update    | unmap old key unless reaped, map new key       |
//! | insert    | full rebuild (later positions shifted right)   |
//! | remove    | full rebuild (later positions shifted left)    |
//! | reap      | unmap key; count and positions unchanged       |
//! | clear     | empty the view                                 |
//!
//! # Rebuild
//!
//! Rebuild empties the view, requires the persisted count to equal the
//! container count, then maps every position the container has not reaped.
//! A failed rebuild poisons the projection: every operation returns
//! `AERO_INDEX_CONSISTENCY_VIOLATION` until a rebuild succeeds.
//!
//! The projection records which positions were reaped as of its last
//! operation. A remove notification arrives after the container has shifted
//! its tombstones, so only this record says whether the removed position was
//! live and must hold its key.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::decorator::StoreDecorator;
use super::errors::{IndexError, IndexResult};
use super::store::MetadataStore;
use crate::container::{ContainerHandle, LifecycleEvent, OperationType};
use crate::observability::{log_event_with_fields, Event, IndexMetrics, ObservationScope};
use crate::storage::StoreEventReceiver;

/// Key view maintained by a projection
///
/// Validation never mutates; `map`/`unmap` run only after the inner store
/// accepted the operation.
pub trait ProjectionView<K>: Default + fmt::Debug + Send {
    /// Reject a key about to be added or inserted at `position`
    fn validate_add(&self, position: usize, key: &K) -> IndexResult<()>;

    /// Reject replacing the key at `position` with `key`
    fn validate_update(&self, position: usize, key: &K) -> IndexResult<()>;

    /// Require `key` to be mapped at `position`
    fn validate_present(&self, position: usize, key: &K) -> IndexResult<()>;

    /// Map `key` to `position`
    fn map(&mut self, key: K, position: usize) -> IndexResult<()>;

    /// Unmap the pair; returns whether it was present
    fn unmap(&mut self, key: &K, position: usize) -> bool;

    /// Drop every entry
    fn clear(&mut self);

    /// Key mapped at `position`
    fn key_at(&self, position: usize) -> Option<&K>;

    /// Whether any position maps `key`
    fn contains_key(&self, key: &K) -> bool;

    /// Number of distinct keys
    fn key_count(&self) -> usize;

    /// Number of mapped positions
    fn position_count(&self) -> usize;

    /// Every (key, position) pair in key order, then position order
    fn entries(&self) -> Vec<(K, usize)>;
}

/// Store decorator holding a synchronized in-memory view
pub struct InMemoryProjection<S: MetadataStore, V> {
    name: String,
    base: StoreDecorator<S>,
    view: V,
    reaped: BTreeSet<usize>,
    built: bool,
    poisoned: bool,
    metrics: Arc<IndexMetrics>,
}

impl<S, V> InMemoryProjection<S, V>
where
    S: MetadataStore,
    V: ProjectionView<S::Datum>,
{
    /// Wrap `inner`; the view is empty until the first rebuild
    pub fn new(name: impl Into<String>, inner: S) -> Self {
        Self::with_metrics(name, inner, Arc::new(IndexMetrics::new()))
    }

    /// Wrap `inner`, counting into a shared metrics registry
    pub fn with_metrics(name: impl Into<String>, inner: S, metrics: Arc<IndexMetrics>) -> Self {
        Self {
            name: name.into(),
            base: StoreDecorator::new(inner),
            view: V::default(),
            reaped: BTreeSet::new(),
            built: false,
            poisoned: false,
            metrics,
        }
    }

    /// Projection name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Metrics registry
    pub fn metrics(&self) -> &Arc<IndexMetrics> {
        &self.metrics
    }

    /// Inner store
    pub fn inner(&self) -> &S {
        self.base.inner()
    }

    /// Whether a failed rebuild left the projection unusable
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Whether the view reflects the container
    pub fn is_built(&self) -> bool {
        self.built && !self.poisoned
    }

    /// Read-only view
    pub fn view(&self) -> IndexResult<&V> {
        self.ensure_usable()?;
        Ok(&self.view)
    }

    /// Key mapped at `position`
    pub fn key_at(&self, position: usize) -> IndexResult<Option<&S::Datum>> {
        Ok(self.view()?.key_at(position))
    }

    /// Whether any live position maps `key`
    pub fn contains_key(&self, key: &S::Datum) -> IndexResult<bool> {
        Ok(self.view()?.contains_key(key))
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> IndexResult<usize> {
        Ok(self.view()?.key_count())
    }

    /// Number of live positions in the view
    pub fn position_count(&self) -> IndexResult<usize> {
        Ok(self.view()?.position_count())
    }

    /// Snapshot of every (key, position) pair
    pub fn entries(&self) -> IndexResult<Vec<(S::Datum, usize)>> {
        Ok(self.view()?.entries())
    }

    /// Re-derive the view from the container and the persisted list
    pub fn rebuild(&mut self) -> IndexResult<()> {
        let container = Arc::clone(self.base.container());
        let _scope = container.enter_access_scope();
        let observation = ObservationScope::with_fields(
            Event::IndexRebuild.as_str(),
            &[("index", self.name.as_str())],
        );

        self.view.clear();
        self.reaped.clear();
        self.built = false;

        match self.scan(&container) {
            Ok(()) => {
                self.poisoned = false;
                self.built = true;
                self.metrics.increment_rebuilds();
                let entries = self.view.position_count().to_string();
                observation.complete_with_fields(&[("entries", entries.as_str())]);
                Ok(())
            }
            Err(err) => {
                self.view.clear();
                self.reaped.clear();
                self.poisoned = true;
                if err.is_fatal() {
                    self.metrics.increment_consistency_violations();
                    let code = err.code().code();
                    log_event_with_fields(
                        Event::ConsistencyViolation,
                        &[("index", self.name.as_str()), ("code", code)],
                    );
                    observation.fail_fatal(err.message());
                } else {
                    observation.fail(err.message());
                }
                Err(err)
            }
        }
    }

    fn scan(&mut self, container: &ContainerHandle) -> IndexResult<()> {
        let persisted = self.base.count()?;
        let expected = container.count();
        if persisted != expected {
            return Err(IndexError::consistency_violation(persisted, expected));
        }

        for position in 0..expected {
            if container.is_reaped(position) {
                self.reaped.insert(position);
                continue;
            }
            let key = self.base.read(position)?;
            self.view
                .map(key, position)
                .map_err(|e| IndexError::duplicate_persisted_key(position, e))?;
        }
        Ok(())
    }

    fn ensure_usable(&self) -> IndexResult<()> {
        if self.poisoned {
            return Err(IndexError::poisoned(&self.name));
        }
        Ok(())
    }

    /// Count and log a rejected operation
    fn rejected(&self, operation: OperationType, position: usize, err: IndexError) -> IndexError {
        if err.code().is_contract() {
            self.metrics.increment_contract_violations();
            let position = position.to_string();
            log_event_with_fields(
                Event::ContractViolation,
                &[
                    ("index", self.name.as_str()),
                    ("operation", operation.as_str()),
                    ("position", position.as_str()),
                    ("code", err.code().code()),
                ],
            );
        }
        err
    }

    fn validated(
        &self,
        operation: OperationType,
        position: usize,
        check: impl FnOnce(&V) -> IndexResult<()>,
    ) -> IndexResult<()> {
        self.ensure_usable()?;
        check(&self.view).map_err(|e| self.rejected(operation, position, e))
    }

    fn forwarded(&self, operation: OperationType, position: usize, result: IndexResult<()>) -> IndexResult<()> {
        result.map_err(|e| self.rejected(operation, position, e))?;
        self.metrics.increment_operations();
        Ok(())
    }
}

impl<S, V> MetadataStore for InMemoryProjection<S, V>
where
    S: MetadataStore,
    V: ProjectionView<S::Datum>,
{
    type Datum = S::Datum;

    fn container(&self) -> &ContainerHandle {
        self.base.container()
    }

    fn count(&self) -> IndexResult<usize> {
        self.ensure_usable()?;
        self.base.count()
    }

    fn read(&self, position: usize) -> IndexResult<S::Datum> {
        self.ensure_usable()?;
        self.base.read(position)
    }

    fn read_bytes(&self, position: usize) -> IndexResult<Vec<u8>> {
        self.ensure_usable()?;
        self.base.read_bytes(position)
    }

    fn add(&mut self, position: usize, datum: S::Datum) -> IndexResult<()> {
        self.validated(OperationType::Add, position, |view| {
            view.validate_add(position, &datum)
        })?;
        let result = self.base.add(position, datum.clone());
        self.forwarded(OperationType::Add, position, result)?;
        self.view.map(datum, position)
    }

    fn update(&mut self, position: usize, datum: S::Datum) -> IndexResult<()> {
        self.ensure_usable()?;
        let container = Arc::clone(self.base.container());
        let _scope = container.enter_access_scope();

        // A reaped position has no old key and stays out of the view
        let reaped = container.is_reaped(position);
        let old = if reaped {
            None
        } else {
            let old = self.base.read(position)?;
            self.validated(OperationType::Update, position, |view| {
                view.validate_update(position, &datum)
            })?;
            Some(old)
        };
        let result = self.base.update(position, datum.clone());
        self.forwarded(OperationType::Update, position, result)?;

        if let Some(old) = old {
            self.view.unmap(&old, position);
        }
        if !reaped {
            self.view.map(datum, position)?;
        }
        Ok(())
    }

    fn insert(&mut self, position: usize, datum: S::Datum) -> IndexResult<()> {
        self.validated(OperationType::Insert, position, |view| {
            view.validate_add(position, &datum)
        })?;
        let result = self.base.insert(position, datum);
        self.forwarded(OperationType::Insert, position, result)?;
        self.rebuild()
    }

    fn remove(&mut self, position: usize) -> IndexResult<()> {
        self.ensure_usable()?;
        let key = self.base.read(position)?;
        if !self.reaped.contains(&position) {
            self.validated(OperationType::Remove, position, |view| {
                view.validate_present(position, &key)
            })?;
        }
        let result = self.base.remove(position);
        self.forwarded(OperationType::Remove, position, result)?;
        self.rebuild()
    }

    fn reap(&mut self, position: usize) -> IndexResult<()> {
        self.ensure_usable()?;
        let key = self.base.read(position)?;
        self.validated(OperationType::Reap, position, |view| {
            view.validate_present(position, &key)
        })?;
        let result = self.base.reap(position);
        self.forwarded(OperationType::Reap, position, result)?;
        self.view.unmap(&key, position);
        self.reaped.insert(position);
        Ok(())
    }

    fn clear(&mut self) -> IndexResult<()> {
        self.ensure_usable()?;
        self.base.clear()?;
        self.view.clear();
        self.reaped.clear();
        Ok(())
    }

    fn requires_load(&self) -> bool {
        self.base.requires_load() || !self.is_built()
    }

    fn load(&mut self) -> IndexResult<()> {
        if self.base.requires_load() {
            self.base.load()?;
        }
        self.rebuild()
    }

    fn on_container_event(&mut self, event: LifecycleEvent) -> IndexResult<()> {
        self.base.on_container_event(event)?;
        match event {
            LifecycleEvent::Loaded | LifecycleEvent::Cleared => {
                if !self.base.requires_load() {
                    self.rebuild()?;
                }
            }
            LifecycleEvent::Clearing | LifecycleEvent::Unloading | LifecycleEvent::Disposing => {
                self.view.clear();
                self.reaped.clear();
                self.built = false;
            }
        }
        Ok(())
    }

    fn subscribe(&mut self) -> StoreEventReceiver {
        self.base.subscribe()
    }
}

impl<S: MetadataStore, V: fmt::Debug> fmt::Debug for InMemoryProjection<S, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryProjection")
            .field("name", &self.name)
            .field("inner", self.base.inner())
            .field("view", &self.view)
            .field("built", &self.built)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}
