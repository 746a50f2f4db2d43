//! Counters for index maintenance
//!
//! - Counters only, monotonic
//! - Shared between projections through `Arc`
//! - Relaxed atomics; values are observational

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for one or more in-memory projections
#[derive(Debug, Default)]
pub struct IndexMetrics {
    /// Operations forwarded to the persisted store
    operations_applied: AtomicU64,
    /// Completed in-memory rebuilds
    rebuilds: AtomicU64,
    /// Operations rejected by validation
    contract_violations: AtomicU64,
    /// Rebuilds aborted on count mismatch or duplicate persisted keys
    consistency_violations: AtomicU64,
}

impl IndexMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment operations applied
    pub fn increment_operations(&self) {
        self.operations_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment completed rebuilds
    pub fn increment_rebuilds(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment rejected operations
    pub fn increment_contract_violations(&self) {
        self.contract_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment consistency violations
    pub fn increment_consistency_violations(&self) {
        self.consistency_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations_applied: self.operations_applied.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            contract_violations: self.contract_violations.load(Ordering::Relaxed),
            consistency_violations: self.consistency_violations.load(Ordering::Relaxed),
        }
    }

    /// Snapshot rendered as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub operations_applied: u64,
    pub rebuilds: u64,
    pub contract_violations: u64,
    pub consistency_violations: u64,
}
