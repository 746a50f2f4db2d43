//! # Container Errors
//!
//! Error types for the reference container and its reserved streams.

use thiserror::Error;

use crate::index::IndexError;

/// Result type for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Container errors
#[derive(Debug, Error)]
pub enum ContainerError {
    // ==================
    // Lifecycle Errors
    // ==================
    /// Operation requires a loaded container
    #[error("Container is not loaded")]
    NotLoaded,

    /// Container was disposed and can no longer be used
    #[error("Container has been disposed")]
    Disposed,

    // ==================
    // Position Errors
    // ==================
    /// Position outside the container
    #[error("Position {position} out of range (count: {count})")]
    PositionOutOfRange { position: usize, count: usize },

    /// Position carries a permanent tombstone
    #[error("Position {0} has been reaped")]
    Reaped(usize),

    // ==================
    // Reserved Slot Errors
    // ==================
    /// Reserved slot index beyond the declared reserved slot count
    #[error("Reserved slot {slot} out of range (reserved slots: {count})")]
    SlotOutOfRange { slot: usize, count: usize },

    /// Reserved slot is already held by another stream view
    #[error("Reserved slot {0} is already attached")]
    SlotInUse(usize),

    /// Byte range outside the reserved stream
    #[error("Stream range {offset}..{end} out of bounds (length: {len})")]
    StreamOutOfBounds { offset: u64, end: u64, len: u64 },

    /// Reserved slot lock poisoned by a panicking writer
    #[error("Reserved slot {0} lock poisoned")]
    Poisoned(usize),

    // ==================
    // Observer Errors
    // ==================
    /// An observer rejected the notification; the mutation was undone unless it was a reap
    #[error("Observer rejected notification: {0}")]
    Observer(#[source] IndexError),
}

impl ContainerError {
    /// Returns the observer error, if this error came from an observer
    pub fn observer_error(&self) -> Option<&IndexError> {
        match self {
            ContainerError::Observer(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IndexError> for ContainerError {
    fn from(err: IndexError) -> Self {
        ContainerError::Observer(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ContainerError::PositionOutOfRange { position: 7, count: 3 };
        assert_eq!(err.to_string(), "Position 7 out of range (count: 3)");

        let err = ContainerError::SlotInUse(2);
        assert!(err.to_string().contains("already attached"));
    }

    #[test]
    fn test_observer_error_is_exposed() {
        let err = ContainerError::from(IndexError::key_not_found(4));
        assert!(err.observer_error().is_some());
        assert!(ContainerError::NotLoaded.observer_error().is_none());
    }
}
