//! Index error types
//!
//! Error codes:
//! - AERO_INDEX_CONTRACT_VIOLATION (ERROR)
//! - AERO_INDEX_DUPLICATE_KEY (ERROR)
//! - AERO_INDEX_KEY_NOT_FOUND (ERROR)
//! - AERO_INDEX_CONSISTENCY_VIOLATION (FATAL)
//! - AERO_INDEX_STORAGE_FAILED (severity of the underlying storage error)
//!
//! Contract violations are raised before any representation is touched.
//! Consistency violations leave the projection unusable until rebuilt.

use std::fmt;

use crate::storage::{Severity, StorageError};

/// Index-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexErrorCode {
    /// Operation violates the store contract (position, ordering, key shape)
    AeroIndexContractViolation,
    /// Key already present in a unique projection
    AeroIndexDuplicateKey,
    /// Key expected in the view is missing
    AeroIndexKeyNotFound,
    /// Persisted list and container disagree
    AeroIndexConsistencyViolation,
    /// Underlying segment or stream failure
    AeroIndexStorageFailed,
}

impl IndexErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            IndexErrorCode::AeroIndexContractViolation => "AERO_INDEX_CONTRACT_VIOLATION",
            IndexErrorCode::AeroIndexDuplicateKey => "AERO_INDEX_DUPLICATE_KEY",
            IndexErrorCode::AeroIndexKeyNotFound => "AERO_INDEX_KEY_NOT_FOUND",
            IndexErrorCode::AeroIndexConsistencyViolation => "AERO_INDEX_CONSISTENCY_VIOLATION",
            IndexErrorCode::AeroIndexStorageFailed => "AERO_INDEX_STORAGE_FAILED",
        }
    }

    /// Returns the default severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            IndexErrorCode::AeroIndexConsistencyViolation => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Whether the operation was rejected before any mutation
    pub fn is_contract(&self) -> bool {
        matches!(
            self,
            IndexErrorCode::AeroIndexContractViolation
                | IndexErrorCode::AeroIndexDuplicateKey
                | IndexErrorCode::AeroIndexKeyNotFound
        )
    }
}

impl fmt::Display for IndexErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Index error type with full context
#[derive(Debug)]
pub struct IndexError {
    /// Error code
    code: IndexErrorCode,
    /// Severity, which storage errors may raise to FATAL
    severity: Severity,
    /// Human-readable message
    message: String,
    /// Position if applicable
    position: Option<usize>,
    /// Underlying cause
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl IndexError {
    fn new(code: IndexErrorCode, message: String, position: Option<usize>) -> Self {
        Self {
            code,
            severity: code.severity(),
            message,
            position,
            source: None,
        }
    }

    /// Create a generic contract violation
    pub fn contract_violation(reason: impl Into<String>) -> Self {
        Self::new(IndexErrorCode::AeroIndexContractViolation, reason.into(), None)
    }

    /// Create a contract violation for an append at the wrong position
    pub fn position_mismatch(position: usize, expected: usize) -> Self {
        Self::new(
            IndexErrorCode::AeroIndexContractViolation,
            format!("Append at position {} but count is {}", position, expected),
            Some(position),
        )
    }

    /// Create a contract violation for a position outside the persisted list
    pub fn position_out_of_range(position: usize, count: usize) -> Self {
        Self::new(
            IndexErrorCode::AeroIndexContractViolation,
            format!("Position {} out of range (count: {})", position, count),
            Some(position),
        )
    }

    /// Create a duplicate key error
    pub fn duplicate_key(key: &impl fmt::Debug, position: usize, existing: usize) -> Self {
        Self::new(
            IndexErrorCode::AeroIndexDuplicateKey,
            format!("Key {:?} already indexed at position {}", key, existing),
            Some(position),
        )
    }

    /// Create a key not found error
    pub fn key_not_found(position: usize) -> Self {
        Self::new(
            IndexErrorCode::AeroIndexKeyNotFound,
            format!("No indexed key at position {}", position),
            Some(position),
        )
    }

    /// Create a consistency violation for a count mismatch at rebuild time
    pub fn consistency_violation(persisted: usize, expected: usize) -> Self {
        Self::new(
            IndexErrorCode::AeroIndexConsistencyViolation,
            format!(
                "Persisted count {} does not match container count {}",
                persisted, expected
            ),
            None,
        )
    }

    /// Create a consistency violation for a duplicate persisted key
    pub fn duplicate_persisted_key(position: usize, cause: IndexError) -> Self {
        Self {
            source: Some(Box::new(cause)),
            ..Self::new(
                IndexErrorCode::AeroIndexConsistencyViolation,
                format!("Persisted key at position {} is already indexed", position),
                Some(position),
            )
        }
    }

    /// Create the error returned by a projection that must be rebuilt
    pub fn poisoned(index: &str) -> Self {
        Self::new(
            IndexErrorCode::AeroIndexConsistencyViolation,
            format!("Index '{}' is inconsistent and must be rebuilt", index),
            None,
        )
    }

    /// Returns the error code
    pub fn code(&self) -> IndexErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the position if applicable
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code.code(), self.message)?;
        if let Some(position) = self.position {
            write!(f, " (position: {})", position)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<StorageError> for IndexError {
    fn from(err: StorageError) -> Self {
        Self {
            code: IndexErrorCode::AeroIndexStorageFailed,
            severity: err.severity(),
            message: err.message().to_string(),
            position: None,
            source: Some(Box::new(err)),
        }
    }
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            IndexErrorCode::AeroIndexContractViolation.code(),
            "AERO_INDEX_CONTRACT_VIOLATION"
        );
        assert_eq!(IndexErrorCode::AeroIndexDuplicateKey.code(), "AERO_INDEX_DUPLICATE_KEY");
        assert_eq!(IndexErrorCode::AeroIndexKeyNotFound.code(), "AERO_INDEX_KEY_NOT_FOUND");
        assert_eq!(
            IndexErrorCode::AeroIndexConsistencyViolation.code(),
            "AERO_INDEX_CONSISTENCY_VIOLATION"
        );
        assert_eq!(IndexErrorCode::AeroIndexStorageFailed.code(), "AERO_INDEX_STORAGE_FAILED");
    }

    #[test]
    fn test_only_consistency_violation_is_fatal_by_default() {
        assert!(IndexError::consistency_violation(3, 4).is_fatal());
        assert!(IndexError::poisoned("by_name").is_fatal());
        assert!(!IndexError::position_mismatch(0, 1).is_fatal());
        assert!(!IndexError::duplicate_key(&"k", 1, 0).is_fatal());
        assert!(!IndexError::key_not_found(2).is_fatal());
    }

    #[test]
    fn test_contract_codes() {
        assert!(IndexError::position_mismatch(0, 1).code().is_contract());
        assert!(IndexError::duplicate_key(&"k", 1, 0).code().is_contract());
        assert!(!IndexError::consistency_violation(1, 2).code().is_contract());
    }

    #[test]
    fn test_storage_error_keeps_severity() {
        let corrupt = StorageError::corruption_at_length(5, "length not a multiple of 4");
        let err = IndexError::from(corrupt);
        assert_eq!(err.code(), IndexErrorCode::AeroIndexStorageFailed);
        assert!(err.is_fatal());
        assert!(std::error::Error::source(&err).is_some());

        let state = StorageError::segment_state("not attached");
        assert!(!IndexError::from(state).is_fatal());
    }

    #[test]
    fn test_error_display_contains_required_fields() {
        let err = IndexError::duplicate_key(&"alpha", 1, 0);
        let display = format!("{}", err);
        assert!(display.contains("AERO_INDEX_DUPLICATE_KEY"));
        assert!(display.contains("ERROR"));
        assert!(display.contains("alpha"));
        assert!(display.contains("position: 1"));
    }

    #[test]
    fn test_duplicate_persisted_key_has_cause() {
        let err = IndexError::duplicate_persisted_key(3, IndexError::duplicate_key(&7u32, 3, 1));
        assert!(err.is_fatal());
        assert_eq!(err.position(), Some(3));
        assert!(err.to_string().contains("caused by"));
    }
}
