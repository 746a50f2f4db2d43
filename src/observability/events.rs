//! Observability events for the metadata index layer
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Index configuration loaded
    ConfigLoaded,

    // Segment lifecycle
    /// Stream view opened over a reserved slot
    SegmentAttached,
    /// Stream view closed
    SegmentDetached,

    // Rebuild
    /// In-memory view rebuild; logged as a scope with `_BEGIN`, `_COMPLETE`
    /// and `_FAILED` suffixes
    IndexRebuild,

    // Container
    /// Observer rejected a mutation and the container undid it
    MutationRolledBack,

    // Violations
    /// Operation rejected before mutation
    ContractViolation,
    /// Persisted and container state disagree (FATAL)
    ConsistencyViolation,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "INDEX_CONFIG_LOADED",
            Event::SegmentAttached => "SEGMENT_ATTACHED",
            Event::SegmentDetached => "SEGMENT_DETACHED",
            Event::IndexRebuild => "INDEX_REBUILD",
            Event::MutationRolledBack => "CONTAINER_MUTATION_ROLLED_BACK",
            Event::ContractViolation => "INDEX_CONTRACT_VIOLATION",
            Event::ConsistencyViolation => "INDEX_CONSISTENCY_VIOLATION",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::ConsistencyViolation)
    }

    /// Returns true if this event reports a rejected operation
    pub fn is_warning(&self) -> bool {
        matches!(self, Event::ContractViolation | Event::MutationRolledBack)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
