//! REST resource models.
//!
//! Wire names follow the backend's camelCase JSON; repository and test
//! result ids travel as `_id`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::RepositoryId;
use crate::protocol::StatusCounts;

// ============================================================================
// Repository
// ============================================================================

/// Health of a monitored repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryStatus {
    /// Tests are running.
    #[default]
    Active,
    /// Monitoring paused.
    Inactive,
    /// Last run failed to execute.
    Error,
}

/// A monitored repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// Server-assigned id.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RepositoryId>,
    pub name: String,
    pub owner: String,
    pub status: RepositoryStatus,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of a create request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryDraft {
    pub name: String,
    pub owner: String,
    pub url: String,
    pub status: RepositoryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RepositoryDraft {
    /// Creates an active draft without a description.
    pub fn new(name: impl Into<String>, owner: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            url: url.into(),
            status: RepositoryStatus::Active,
            description: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update; only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RepositoryStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============================================================================
// Test Results
// ============================================================================

/// Outcome of one test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

impl TestStatus {
    /// Wire name, also used as the `status` query value.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request and response captured for a failing test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// One executed API test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(rename = "_id")]
    pub id: String,
    pub repository_id: RepositoryId,
    pub name: String,
    pub status: TestStatus,
    /// Milliseconds.
    pub duration: f64,
    /// ISO-8601 timestamp.
    pub executed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<TestDetails>,
}

/// Response of the per-repository test query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryTests {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub status_counts: StatusCounts,
    #[serde(default)]
    pub data: Vec<TestResult>,
}

// ============================================================================
// Time Series
// ============================================================================

/// Daily aggregate of test executions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    pub date: String,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub passed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_duration: Option<f64>,
}

impl TimeSeriesPoint {
    /// Percentage of passed tests, or `None` for an empty day.
    #[must_use]
    pub fn pass_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.passed as f64 / self.total as f64 * 100.0)
    }
}

// ============================================================================
// Dashboard Configuration
// ============================================================================

/// Widget renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    Chart,
    Metric,
    Table,
    Status,
}

/// Grid placement of a widget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetPosition {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// One configured dashboard widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardWidget {
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    pub title: String,
    pub data_source: String,
    pub position: WidgetPosition,
    /// Renderer-specific options, passed through untouched.
    #[serde(default)]
    pub config: Value,
}

/// Saved widget layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default)]
    pub widgets: Vec<DashboardWidget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

// ============================================================================
// Query Options
// ============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Filter and ordering of the per-repository test list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestQuery {
    pub limit: u32,
    /// Field name to sort by.
    pub sort: String,
    pub order: SortOrder,
    pub status: Option<TestStatus>,
}

impl Default for TestQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            sort: "executedAt".to_owned(),
            order: SortOrder::Desc,
            status: None,
        }
    }
}

impl TestQuery {
    /// Query-string pairs in request order.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("limit", self.limit.to_string()),
            ("sort", self.sort.clone()),
            ("order", self.order.as_str().to_owned()),
        ];
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_owned()));
        }
        pairs
    }
}

/// Time window of the trend charts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TimePeriod {
    Day,
    #[default]
    Week,
    Month,
    Quarter,
}

impl TimePeriod {
    /// Query value (`24h`, `7d`, `30d`, `90d`).
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "30d",
            Self::Quarter => "90d",
        }
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dashboard section currently shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ActiveView {
    #[default]
    Metrics,
    Repositories,
    Tests,
    Settings,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_repository_wire_shape() {
        let repo: Repository = serde_json::from_value(json!({
            "_id": "r1",
            "name": "payments-api",
            "owner": "platform",
            "status": "error",
            "url": "https://github.com/acme/payments-api"
        }))
        .unwrap();

        assert_eq!(repo.id, Some(RepositoryId::from("r1")));
        assert_eq!(repo.status, RepositoryStatus::Error);
        assert_eq!(repo.description, None);
    }

    #[test]
    fn test_patch_sends_only_set_fields() {
        let patch = RepositoryPatch {
            status: Some(RepositoryStatus::Inactive),
            ..RepositoryPatch::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"status": "inactive"})
        );
    }

    #[test]
    fn test_repository_tests_response() {
        let body: RepositoryTests = serde_json::from_value(json!({
            "success": true,
            "count": 1,
            "statusCounts": {"passed": 1, "failed": 0, "skipped": 0, "error": 0},
            "data": [{
                "_id": "t1",
                "repositoryId": "r1",
                "name": "GET /users",
                "status": "passed",
                "duration": 41.5,
                "executedAt": "2024-05-01T10:00:00Z",
                "details": {"statusCode": 200}
            }]
        }))
        .unwrap();

        assert_eq!(body.status_counts.passed, 1);
        assert_eq!(body.data[0].status, TestStatus::Passed);
        assert_eq!(
            body.data[0].details.as_ref().and_then(|d| d.status_code),
            Some(200)
        );
    }

    #[test]
    fn test_widget_type_field() {
        let widget: DashboardWidget = serde_json::from_value(json!({
            "type": "chart",
            "title": "Pass rate",
            "dataSource": "timeSeries",
            "position": {"x": 0, "y": 0, "w": 6, "h": 4},
            "config": {"stacked": true}
        }))
        .unwrap();

        assert_eq!(widget.kind, WidgetKind::Chart);
        assert_eq!(widget.position.w, 6);
    }

    #[test]
    fn test_default_query_pairs() {
        let mut query = TestQuery::default();
        assert_eq!(
            query.to_pairs(),
            vec![
                ("limit", "20".to_owned()),
                ("sort", "executedAt".to_owned()),
                ("order", "desc".to_owned()),
            ]
        );

        query.status = Some(TestStatus::Failed);
        assert_eq!(query.to_pairs()[3], ("status", "failed".to_owned()));
    }

    #[test]
    fn test_point_pass_rate() {
        let point = TimeSeriesPoint {
            date: "2024-05-01".into(),
            total: 8,
            passed: 6,
            ..TimeSeriesPoint::default()
        };
        assert_eq!(point.pass_rate(), Some(75.0));
        assert_eq!(TimeSeriesPoint::default().pass_rate(), None);
    }

    #[test]
    fn test_period_labels() {
        assert_eq!(TimePeriod::default().as_str(), "7d");
        assert_eq!(TimePeriod::Day.to_string(), "24h");
    }
}
