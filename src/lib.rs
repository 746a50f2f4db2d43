//! aerodb-metaindex - Metadata indexes over an ordered persisted container
//!
//! Unique and multi-valued key views, persisted per position in a reserved
//! slot of the container and kept consistent with every container mutation.

pub mod config;
pub mod container;
pub mod index;
pub mod observability;
pub mod storage;

pub use config::{ConfigError, IndexConfig};
pub use container::{Container, ContainerHandle, MemoryContainer};
pub use index::{
    ContainerListener, IndexError, IndexResult, MetadataStore, MultiIndex, PersistedStore,
    UniqueIndex,
};
