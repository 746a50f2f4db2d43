//! Metadata store contract
//!
//! One datum per container position, kept in step with the container by the
//! listener. Implemented by the persisted store, by the forwarding decorator
//! and by in-memory projections, so layers compose by wrapping.

use std::fmt;

use super::datum::FixedDatum;
use super::errors::IndexResult;
use crate::container::{ContainerHandle, LifecycleEvent};
use crate::storage::StoreEventReceiver;

/// Position-addressed store of fixed-size datums
pub trait MetadataStore: fmt::Debug + Send {
    /// Datum stored per position
    type Datum: FixedDatum;

    /// Container the store indexes
    fn container(&self) -> &ContainerHandle;

    /// Number of persisted datums
    fn count(&self) -> IndexResult<usize>;

    /// Datum at `position`
    fn read(&self, position: usize) -> IndexResult<Self::Datum>;

    /// Encoded datum at `position`
    fn read_bytes(&self, position: usize) -> IndexResult<Vec<u8>>;

    /// Append; `position` must equal `count()`
    fn add(&mut self, position: usize, datum: Self::Datum) -> IndexResult<()>;

    /// Overwrite in place
    fn update(&mut self, position: usize, datum: Self::Datum) -> IndexResult<()>;

    /// Insert, shifting later datums right
    fn insert(&mut self, position: usize, datum: Self::Datum) -> IndexResult<()>;

    /// Remove, shifting later datums left
    fn remove(&mut self, position: usize) -> IndexResult<()>;

    /// Tombstone notification; the persisted list is not touched
    fn reap(&mut self, position: usize) -> IndexResult<()>;

    /// Drop every datum
    fn clear(&mut self) -> IndexResult<()>;

    /// Whether `load` has work to do
    fn requires_load(&self) -> bool;

    /// Attach and populate from the container
    fn load(&mut self) -> IndexResult<()>;

    /// Follow a container lifecycle transition
    fn on_container_event(&mut self, event: LifecycleEvent) -> IndexResult<()>;

    /// Subscribe to `Loading`/`Loaded`/`Detached` notifications
    fn subscribe(&mut self) -> StoreEventReceiver;
}
