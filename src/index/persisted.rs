//! Persisted metadata store
//!
//! Datums are packed back to back in a reserved slot of the container,
//! position `p` at byte `p * SIZE` past the segment offset.
//!
//! # Invariants
//!
//! - `count() == container.count()` whenever the segment is attached
//! - `add` only appends (`position == count()`)
//! - `reap` leaves the persisted list untouched; tombstones live in the
//!   container
//! - Every operation holds the container access scope
//! - Validator hooks run before the list is mutated

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::datum::FixedDatum;
use super::errors::{IndexError, IndexResult};
use super::store::MetadataStore;
use crate::config::IndexConfig;
use crate::container::{ContainerHandle, LifecycleEvent, ReservedStream};
use crate::storage::{AttachableSegment, SegmentState, StorageError, StoreEventReceiver};

/// Read-only view over the persisted datums, handed to validators
pub struct PersistedList<'a, D> {
    stream: &'a ReservedStream,
    count: usize,
    _datum: PhantomData<fn() -> D>,
}

impl<'a, D: FixedDatum> PersistedList<'a, D> {
    fn open(stream: &'a ReservedStream) -> IndexResult<Self> {
        let len = stream
            .len()
            .map_err(|e| StorageError::read_failed("Failed to size persisted list", e))?;
        if D::SIZE == 0 {
            return Err(IndexError::contract_violation(
                "Persisted datums must encode to at least one byte",
            ));
        }
        let size = D::SIZE as u64;
        if len % size != 0 {
            return Err(StorageError::corruption_at_length(
                len,
                format!("Persisted list length is not a multiple of {}", size),
            )
            .into());
        }
        Ok(Self {
            stream,
            count: (len / size) as usize,
            _datum: PhantomData,
        })
    }

    /// Number of datums
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the list holds no datums
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Datum at `position`
    pub fn read(&self, position: usize) -> IndexResult<D> {
        let bytes = self.read_bytes(position)?;
        D::decode(&bytes).ok_or_else(|| {
            StorageError::corruption_at_position(position, "Persisted bytes are not a valid datum")
                .into()
        })
    }

    /// Encoded datum at `position`
    pub fn read_bytes(&self, position: usize) -> IndexResult<Vec<u8>> {
        self.ensure_position(position)?;
        let mut buf = vec![0u8; D::SIZE];
        self.stream
            .read(byte_offset::<D>(position), &mut buf)
            .map_err(|e| StorageError::read_failed("Failed to read datum", e))?;
        Ok(buf)
    }

    fn ensure_position(&self, position: usize) -> IndexResult<()> {
        if position >= self.count {
            return Err(IndexError::position_out_of_range(position, self.count));
        }
        Ok(())
    }
}

fn byte_offset<D: FixedDatum>(position: usize) -> u64 {
    (position * D::SIZE) as u64
}

/// Pre-mutation hooks; every default accepts
pub trait StoreValidator<D: FixedDatum>: fmt::Debug + Send {
    /// Before an append
    fn validate_add(&self, _list: &PersistedList<'_, D>, _position: usize, _datum: &D) -> IndexResult<()> {
        Ok(())
    }

    /// Before an in-place overwrite
    fn validate_update(&self, _list: &PersistedList<'_, D>, _position: usize, _datum: &D) -> IndexResult<()> {
        Ok(())
    }

    /// Before a shifting insert
    fn validate_insert(&self, _list: &PersistedList<'_, D>, _position: usize, _datum: &D) -> IndexResult<()> {
        Ok(())
    }

    /// Before a shifting remove
    fn validate_remove(&self, _list: &PersistedList<'_, D>, _position: usize) -> IndexResult<()> {
        Ok(())
    }

    /// Before a reap
    fn validate_reap(&self, _list: &PersistedList<'_, D>, _position: usize) -> IndexResult<()> {
        Ok(())
    }

    /// Before a clear
    fn validate_clear(&self, _list: &PersistedList<'_, D>) -> IndexResult<()> {
        Ok(())
    }
}

/// Accepts every operation
#[derive(Debug, Clone, Copy, Default)]
pub struct NoValidation;

impl<D: FixedDatum> StoreValidator<D> for NoValidation {}

/// Keeps the persisted list in ascending order (duplicates allowed)
#[derive(Debug, Clone, Copy, Default)]
pub struct SortedValidator;

impl SortedValidator {
    /// Check that `datum` fits between `before` and `after`
    fn check_between<D: FixedDatum>(
        list: &PersistedList<'_, D>,
        position: usize,
        datum: &D,
        before: Option<usize>,
        after: Option<usize>,
    ) -> IndexResult<()> {
        if let Some(before) = before {
            let prev = list.read(before)?;
            if prev > *datum {
                return Err(IndexError::contract_violation(format!(
                    "Datum {:?} at position {} sorts before {:?} at position {}",
                    datum, position, prev, before
                )));
            }
        }
        if let Some(after) = after.filter(|p| *p < list.count()) {
            let next = list.read(after)?;
            if *datum > next {
                return Err(IndexError::contract_violation(format!(
                    "Datum {:?} at position {} sorts after {:?} at position {}",
                    datum, position, next, after
                )));
            }
        }
        Ok(())
    }
}

impl<D: FixedDatum> StoreValidator<D> for SortedValidator {
    fn validate_add(&self, list: &PersistedList<'_, D>, position: usize, datum: &D) -> IndexResult<()> {
        Self::check_between(list, position, datum, position.checked_sub(1), None)
    }

    fn validate_update(&self, list: &PersistedList<'_, D>, position: usize, datum: &D) -> IndexResult<()> {
        Self::check_between(list, position, datum, position.checked_sub(1), Some(position + 1))
    }

    fn validate_insert(&self, list: &PersistedList<'_, D>, position: usize, datum: &D) -> IndexResult<()> {
        Self::check_between(list, position, datum, position.checked_sub(1), Some(position))
    }
}

/// Metadata store backed by a reserved slot of the container
pub struct PersistedStore<D: FixedDatum, V: StoreValidator<D> = NoValidation> {
    segment: AttachableSegment,
    validator: V,
    _datum: PhantomData<fn() -> D>,
}

impl<D: FixedDatum> PersistedStore<D> {
    /// Create a detached store over `slot`, starting at byte `offset`
    pub fn new(container: ContainerHandle, slot: usize, offset: u64) -> Self {
        Self::with_validator(container, slot, offset, NoValidation)
    }

    /// Create a detached store placed as configured
    pub fn from_config(container: ContainerHandle, config: &IndexConfig) -> Self {
        Self::new(container, config.reserved_slot, config.byte_offset)
    }
}

impl<D: FixedDatum, V: StoreValidator<D>> PersistedStore<D, V> {
    /// Create a detached store with custom validation hooks
    pub fn with_validator(container: ContainerHandle, slot: usize, offset: u64, validator: V) -> Self {
        Self {
            segment: AttachableSegment::new(container, slot, offset),
            validator,
            _datum: PhantomData,
        }
    }

    /// Segment lifecycle state
    pub fn state(&self) -> SegmentState {
        self.segment.state()
    }

    /// Whether the segment is attached
    pub fn is_attached(&self) -> bool {
        self.segment.is_attached()
    }

    /// Validation hooks
    pub fn validator(&self) -> &V {
        &self.validator
    }

    /// Run `f` against the persisted list inside the access scope
    fn with_list<R>(&self, f: impl FnOnce(&PersistedList<'_, D>) -> IndexResult<R>) -> IndexResult<R> {
        let container = Arc::clone(self.segment.container());
        let _scope = container.enter_access_scope();
        let list = PersistedList::open(self.segment.stream()?)?;
        f(&list)
    }

    fn write_failed(e: crate::container::ContainerError) -> IndexError {
        StorageError::write_failed("Failed to write persisted list", e).into()
    }
}

impl<D: FixedDatum, V: StoreValidator<D>> MetadataStore for PersistedStore<D, V> {
    type Datum = D;

    fn container(&self) -> &ContainerHandle {
        self.segment.container()
    }

    fn count(&self) -> IndexResult<usize> {
        self.with_list(|list| Ok(list.count()))
    }

    fn read(&self, position: usize) -> IndexResult<D> {
        self.with_list(|list| list.read(position))
    }

    fn read_bytes(&self, position: usize) -> IndexResult<Vec<u8>> {
        self.with_list(|list| list.read_bytes(position))
    }

    fn add(&mut self, position: usize, datum: D) -> IndexResult<()> {
        self.with_list(|list| {
            if position != list.count() {
                return Err(IndexError::position_mismatch(position, list.count()));
            }
            self.validator.validate_add(list, position, &datum)?;
            list.stream
                .write(byte_offset::<D>(position), &datum.to_bytes())
                .map_err(Self::write_failed)
        })
    }

    fn update(&mut self, position: usize, datum: D) -> IndexResult<()> {
        self.with_list(|list| {
            list.ensure_position(position)?;
            self.validator.validate_update(list, position, &datum)?;
            list.stream
                .write(byte_offset::<D>(position), &datum.to_bytes())
                .map_err(Self::write_failed)
        })
    }

    fn insert(&mut self, position: usize, datum: D) -> IndexResult<()> {
        self.with_list(|list| {
            if position > list.count() {
                return Err(IndexError::position_out_of_range(position, list.count()));
            }
            self.validator.validate_insert(list, position, &datum)?;
            list.stream
                .insert(byte_offset::<D>(position), &datum.to_bytes())
                .map_err(Self::write_failed)
        })
    }

    fn remove(&mut self, position: usize) -> IndexResult<()> {
        self.with_list(|list| {
            list.ensure_position(position)?;
            self.validator.validate_remove(list, position)?;
            list.stream
                .remove(byte_offset::<D>(position), D::SIZE as u64)
                .map_err(Self::write_failed)
        })
    }

    fn reap(&mut self, position: usize) -> IndexResult<()> {
        self.with_list(|list| {
            list.ensure_position(position)?;
            self.validator.validate_reap(list, position)
        })
    }

    fn clear(&mut self) -> IndexResult<()> {
        self.with_list(|list| {
            self.validator.validate_clear(list)?;
            list.stream.truncate(0).map_err(Self::write_failed)
        })
    }

    fn requires_load(&self) -> bool {
        !self.segment.is_attached()
    }

    fn load(&mut self) -> IndexResult<()> {
        if self.segment.is_attached() {
            return Ok(());
        }
        Ok(self.segment.attach()?)
    }

    fn on_container_event(&mut self, event: LifecycleEvent) -> IndexResult<()> {
        Ok(self.segment.on_container_event(event)?)
    }

    fn subscribe(&mut self) -> StoreEventReceiver {
        self.segment.subscribe()
    }
}

impl<D: FixedDatum, V: StoreValidator<D>> fmt::Debug for PersistedStore<D, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedStore")
            .field("segment", &self.segment)
            .field("datum_size", &D::SIZE)
            .field("validator", &self.validator)
            .finish()
    }
}
