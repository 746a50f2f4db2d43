//! Segment storage error types
//!
//! Error codes:
//! - AERO_SEGMENT_STATE (ERROR severity)
//! - AERO_SEGMENT_READ_FAILED (ERROR severity)
//! - AERO_SEGMENT_WRITE_FAILED (ERROR severity)
//! - AERO_DATA_CORRUPTION (FATAL severity) - from CORRUPTION category

use std::fmt;

use crate::container::ContainerError;

/// Severity levels for storage and index errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, caller continues
    Error,
    /// Index must not be used until rebuilt
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Segment is not in a state that allows the operation
    AeroSegmentState,
    /// Reading the reserved stream failed
    AeroSegmentReadFailed,
    /// Writing the reserved stream failed
    AeroSegmentWriteFailed,
    /// Persisted bytes do not form a valid datum list
    AeroDataCorruption,
}

impl StorageErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::AeroSegmentState => "AERO_SEGMENT_STATE",
            StorageErrorCode::AeroSegmentReadFailed => "AERO_SEGMENT_READ_FAILED",
            StorageErrorCode::AeroSegmentWriteFailed => "AERO_SEGMENT_WRITE_FAILED",
            StorageErrorCode::AeroDataCorruption => "AERO_DATA_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::AeroSegmentState => Severity::Error,
            StorageErrorCode::AeroSegmentReadFailed => Severity::Error,
            StorageErrorCode::AeroSegmentWriteFailed => Severity::Error,
            StorageErrorCode::AeroDataCorruption => Severity::Fatal,
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage error type with full context
#[derive(Debug)]
pub struct StorageError {
    /// Error code
    code: StorageErrorCode,
    /// Human-readable message
    message: String,
    /// Optional details about the error context
    details: Option<String>,
    /// Underlying container error if applicable
    source: Option<ContainerError>,
}

impl StorageError {
    /// Create a segment state error (not attached, already attached, ...)
    pub fn segment_state(message: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::AeroSegmentState,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a segment state error caused by the container
    pub fn attach_failed(slot: usize, source: ContainerError) -> Self {
        Self {
            code: StorageErrorCode::AeroSegmentState,
            message: "Failed to attach reserved slot".to_string(),
            details: Some(format!("slot: {}", slot)),
            source: Some(source),
        }
    }

    /// Create a read failed error
    pub fn read_failed(message: impl Into<String>, source: ContainerError) -> Self {
        Self {
            code: StorageErrorCode::AeroSegmentReadFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Create a write failed error
    pub fn write_failed(message: impl Into<String>, source: ContainerError) -> Self {
        Self {
            code: StorageErrorCode::AeroSegmentWriteFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Create a data corruption error with byte length context
    pub fn corruption_at_length(len: u64, reason: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::AeroDataCorruption,
            message: reason.into(),
            details: Some(format!("byte_length: {}", len)),
            source: None,
        }
    }

    /// Create a data corruption error for a single position
    pub fn corruption_at_position(position: usize, reason: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::AeroDataCorruption,
            message: reason.into(),
            details: Some(format!("position: {}", position)),
            source: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(StorageErrorCode::AeroSegmentState.code(), "AERO_SEGMENT_STATE");
        assert_eq!(StorageErrorCode::AeroSegmentReadFailed.code(), "AERO_SEGMENT_READ_FAILED");
        assert_eq!(StorageErrorCode::AeroSegmentWriteFailed.code(), "AERO_SEGMENT_WRITE_FAILED");
        assert_eq!(StorageErrorCode::AeroDataCorruption.code(), "AERO_DATA_CORRUPTION");
    }

    #[test]
    fn test_data_corruption_is_fatal() {
        let err = StorageError::corruption_at_length(13, "not a multiple of datum size");
        assert!(err.is_fatal());
        assert_eq!(err.code().code(), "AERO_DATA_CORRUPTION");
    }

    #[test]
    fn test_write_failed_not_fatal() {
        let err = StorageError::write_failed("stream write", ContainerError::Poisoned(0));
        assert!(!err.is_fatal());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_display_contains_required_fields() {
        let err = StorageError::corruption_at_position(3, "short datum");
        let display = format!("{}", err);
        assert!(display.contains("AERO_DATA_CORRUPTION"));
        assert!(display.contains("FATAL"));
        assert!(display.contains("short datum"));
        assert!(display.contains("position: 3"));
    }
}
