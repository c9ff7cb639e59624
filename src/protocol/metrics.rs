//! Aggregate metrics snapshot.
//!
//! The backend pushes partial metrics objects. A snapshot is merged
//! field-by-field: fields absent from the update keep their prior value,
//! fields present replace it. Nested objects such as `testsByStatus` are
//! replaced as a whole, never merged.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// StatusCounts
// ============================================================================

/// Test counts grouped by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCounts {
    /// Passed tests.
    pub passed: u64,
    /// Failed tests.
    pub failed: u64,
    /// Skipped tests.
    pub skipped: u64,
    /// Tests that errored before producing an outcome.
    pub error: u64,
}

impl StatusCounts {
    /// Sum over all outcomes.
    #[inline]
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.passed + self.failed + self.skipped + self.error
    }
}

// ============================================================================
// MetricsSnapshot
// ============================================================================

/// Dashboard-wide metrics.
///
/// Every field is optional so the same type describes both the full summary
/// and a partial live update.
///
/// # Format
///
/// ```json
/// {
///   "passRate": 82.5,
///   "totalRepositories": 4,
///   "totalTests": 1200,
///   "testsLast7Days": 310,
///   "averageDuration": 41.2,
///   "testsByStatus": { "passed": 990, "failed": 150, "skipped": 40, "error": 20 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Percentage of passing tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_rate: Option<f64>,

    /// Number of monitored repositories.
    ///
    /// Counts are kept as `f64` so a non-integral value does not reject
    /// the whole frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_repositories: Option<f64>,

    /// Number of recorded test executions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tests: Option<f64>,

    /// Executions in the trailing week.
    #[serde(
        rename = "testsLast7Days",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tests_last_7_days: Option<f64>,

    /// Mean execution duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_duration: Option<f64>,

    /// Breakdown by outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_by_status: Option<StatusCounts>,

    /// Fields the backend sends that this crate does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetricsSnapshot {
    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pass_rate.is_none()
            && self.total_repositories.is_none()
            && self.total_tests.is_none()
            && self.tests_last_7_days.is_none()
            && self.average_duration.is_none()
            && self.tests_by_status.is_none()
            && self.extra.is_empty()
    }

    /// Shallow-merges `update` into `self`.
    ///
    /// Fields set in `update` overwrite, fields unset in `update` are kept.
    pub fn merge(&mut self, update: Self) {
        fn take<T>(slot: &mut Option<T>, incoming: Option<T>) {
            if incoming.is_some() {
                *slot = incoming;
            }
        }

        take(&mut self.pass_rate, update.pass_rate);
        take(&mut self.total_repositories, update.total_repositories);
        take(&mut self.total_tests, update.total_tests);
        take(&mut self.tests_last_7_days, update.tests_last_7_days);
        take(&mut self.average_duration, update.average_duration);
        take(&mut self.tests_by_status, update.tests_by_status);
        self.extra.extend(update.extra);
    }

    /// Returns a merged copy without mutating `self`.
    #[must_use]
    pub fn merged(&self, update: Self) -> Self {
        let mut next = self.clone();
        next.merge(update);
        next
    }
}

// ============================================================================
// Tests
// ============================================================================
