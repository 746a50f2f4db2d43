//! Attachable stream segment
//!
//! Binds a persisted metadata store to one reserved slot of the container.
//!
//! # Lifecycle
//!
//! ```text
//! Detached -> Attaching -> Attached -> Detaching -> Detached
//! ```
//!
//! - Attach requires a loaded container, a slot within the declared reserved
//!   slot count, and no prior attachment
//! - `Clearing`, `Unloading` and `Disposing` detach before the container
//!   proceeds; `Loaded` and `Cleared` re-attach
//! - Stream access requires the caller to hold the container access scope;
//!   the segment itself does not serialize access

use std::fmt;

use tokio::sync::mpsc;

use super::errors::{StorageError, StorageResult};
use crate::container::{ContainerHandle, LifecycleEvent, ReservedStream};
use crate::observability::{log_event_with_fields, Event};

/// Notifications emitted by a store as its segment attaches and detaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// Segment is opening its stream view
    Loading,
    /// Segment is attached and readable
    Loaded,
    /// Segment closed its stream view
    Detached,
}

/// Sender half of a store event subscription
pub type StoreEventSender = mpsc::UnboundedSender<StoreEvent>;

/// Receiver half of a store event subscription
pub type StoreEventReceiver = mpsc::UnboundedReceiver<StoreEvent>;

/// Attachment state of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// No stream view open
    Detached,
    /// Opening the stream view
    Attaching,
    /// Stream view open
    Attached,
    /// Closing the stream view
    Detaching,
}

impl SegmentState {
    /// Returns the string representation used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentState::Detached => "detached",
            SegmentState::Attaching => "attaching",
            SegmentState::Attached => "attached",
            SegmentState::Detaching => "detaching",
        }
    }
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle glue between a store and a reserved slot
pub struct AttachableSegment {
    container: ContainerHandle,
    slot: usize,
    offset: u64,
    state: SegmentState,
    stream: Option<ReservedStream>,
    subscribers: Vec<StoreEventSender>,
}

impl AttachableSegment {
    /// Create a detached segment for `slot`, starting at byte `offset`
    pub fn new(container: ContainerHandle, slot: usize, offset: u64) -> Self {
        Self {
            container,
            slot,
            offset,
            state: SegmentState::Detached,
            stream: None,
            subscribers: Vec::new(),
        }
    }

    /// Container this segment belongs to
    pub fn container(&self) -> &ContainerHandle {
        &self.container
    }

    /// Reserved slot index
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Byte offset inside the slot
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Current lifecycle state
    pub fn state(&self) -> SegmentState {
        self.state
    }

    /// Whether the stream view is open
    pub fn is_attached(&self) -> bool {
        self.state == SegmentState::Attached
    }

    /// Subscribe to `Loading`/`Loaded`/`Detached` notifications
    pub fn subscribe(&mut self) -> StoreEventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Open the stream view over the reserved slot
    pub fn attach(&mut self) -> StorageResult<()> {
        if self.state != SegmentState::Detached {
            return Err(StorageError::segment_state(format!(
                "Segment for slot {} is {}, expected detached",
                self.slot, self.state
            )));
        }
        if !self.container.is_loaded() {
            return Err(StorageError::segment_state(
                "Container must be loaded before attaching",
            ));
        }
        let reserved = self.container.reserved_slot_count();
        if self.slot >= reserved {
            return Err(StorageError::segment_state(format!(
                "Reserved slot {} out of range (reserved slots: {})",
                self.slot, reserved
            )));
        }

        self.state = SegmentState::Attaching;
        self.emit(StoreEvent::Loading);

        match self.container.open_reserved_stream(self.slot, self.offset) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = SegmentState::Attached;
            }
            Err(err) => {
                self.state = SegmentState::Detached;
                return Err(StorageError::attach_failed(self.slot, err));
            }
        }

        let slot = self.slot.to_string();
        let offset = self.offset.to_string();
        log_event_with_fields(
            Event::SegmentAttached,
            &[("slot", slot.as_str()), ("offset", offset.as_str())],
        );
        self.emit(StoreEvent::Loaded);
        Ok(())
    }

    /// Close the stream view; detaching a detached segment is a no-op
    pub fn detach(&mut self) {
        if self.state != SegmentState::Attached {
            return;
        }

        self.state = SegmentState::Detaching;
        self.stream = None;
        self.state = SegmentState::Detached;

        let slot = self.slot.to_string();
        log_event_with_fields(Event::SegmentDetached, &[("slot", slot.as_str())]);
        self.emit(StoreEvent::Detached);
    }

    /// Follow the container lifecycle
    pub fn on_container_event(&mut self, event: LifecycleEvent) -> StorageResult<()> {
        match event {
            LifecycleEvent::Loaded | LifecycleEvent::Cleared => {
                if self.state == SegmentState::Detached && self.container.is_loaded() {
                    self.attach()?;
                }
            }
            LifecycleEvent::Clearing | LifecycleEvent::Unloading | LifecycleEvent::Disposing => {
                self.detach();
            }
        }
        Ok(())
    }

    /// Stream view, available while attached and inside the access scope
    pub fn stream(&self) -> StorageResult<&ReservedStream> {
        let stream = match (&self.state, &self.stream) {
            (SegmentState::Attached, Some(stream)) => stream,
            _ => {
                return Err(StorageError::segment_state(format!(
                    "Segment for slot {} is {}",
                    self.slot, self.state
                )))
            }
        };
        if !self.container.in_access_scope() {
            return Err(StorageError::segment_state(
                "Stream access requires the container access scope",
            ));
        }
        Ok(stream)
    }

    fn emit(&mut self, event: StoreEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

impl fmt::Debug for AttachableSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachableSegment")
            .field("slot", &self.slot)
            .field("offset", &self.offset)
            .field("state", &self.state)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
