//! Metadata index layer
//!
//! Keyed views over a container, kept consistent with it on every mutation.
//!
//! # Layers
//!
//! ```text
//! container -> ContainerListener -> InMemoryProjection -> StoreDecorator -> PersistedStore
//!                                     (UniqueView/MultiView)                   (reserved slot)
//! ```
//!
//! # Design Principles
//!
//! - The container is the source of truth; views are derived
//! - Deterministic: BTreeMap iteration order, sorted positions
//! - Validation before mutation; rejected operations change nothing
//!
//! # Invariants
//!
//! - Persisted count equals container count while attached
//! - Views hold exactly the keys of non-reaped positions
//! - A unique view never maps two positions to one key

mod datum;
mod decorator;
mod errors;
mod listener;
mod multi;
mod persisted;
mod projection;
mod store;
mod unique;

pub use datum::{Crc32, FixedDatum, FixedKey};
pub use decorator::StoreDecorator;
pub use errors::{IndexError, IndexErrorCode, IndexResult};
pub use listener::ContainerListener;
pub use multi::{MultiIndex, MultiView};
pub use persisted::{NoValidation, PersistedList, PersistedStore, SortedValidator, StoreValidator};
pub use projection::{InMemoryProjection, ProjectionView};
pub use store::MetadataStore;
pub use unique::{UniqueIndex, UniqueView};
