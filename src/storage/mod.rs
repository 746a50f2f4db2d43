//! Segment storage for persisted metadata
//!
//! Persisted metadata lives in a reserved slot of the container, not in a
//! file of its own. This module owns the binding between a store and that
//! slot.
//!
//! # Design Principles
//!
//! - One segment per reserved slot, exclusive while attached
//! - Attachment follows the container lifecycle
//! - Stream access only inside the container access scope
//!
//! # Invariants Enforced
//!
//! - Attach only on a loaded container, within the reserved slot count
//! - Detach completes before the container clears

mod errors;
mod segment;

pub use errors::{Severity, StorageError, StorageErrorCode, StorageResult};
pub use segment::{AttachableSegment, SegmentState, StoreEvent, StoreEventReceiver, StoreEventSender};
