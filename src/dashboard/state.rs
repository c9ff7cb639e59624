//! View state held by the dashboard controller.

#![deny(missing_docs)]

use crate::client::ConnectionState;
use crate::identifiers::RepositoryId;
use crate::protocol::{MetricsSnapshot, StatusCounts};

use super::models::{
    ActiveView, DashboardConfig, Repository, TestQuery, TestResult, TimePeriod, TimeSeriesPoint,
};

/// In-flight flags for sections that show a spinner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionLoading {
    /// Metrics summary request in flight.
    pub metrics: bool,
    /// Repository list request in flight.
    pub repositories: bool,
    /// Selected repository's tests request in flight.
    pub tests: bool,
    /// Widget layout request in flight.
    pub config: bool,
}

/// Everything the dashboard renders from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    /// Tab currently shown.
    pub view: ActiveView,
    /// Metrics summary, merged with live `metrics` updates.
    pub metrics: Option<MetricsSnapshot>,
    /// Monitored repositories.
    pub repositories: Vec<Repository>,
    /// Pass/fail history for [`DashboardState::period`].
    pub time_series: Vec<TimeSeriesPoint>,
    /// Window of the time series.
    pub period: TimePeriod,
    /// Repository whose tests are listed, if any.
    pub selected_repository: Option<RepositoryId>,
    /// Current page of the selected repository's tests.
    pub tests: Vec<TestResult>,
    /// Per-status totals for the selected repository.
    pub status_counts: StatusCounts,
    /// Filters and paging for the test list.
    pub test_query: TestQuery,
    /// Widget layout, once loaded.
    pub config: Option<DashboardConfig>,
    /// Live-update connection status.
    pub connection: ConnectionState,
    /// User-visible error banner.
    pub error: Option<String>,
    /// `true` until the first [`super::Dashboard::load`] completes.
    pub loading: bool,
    /// Per-section in-flight flags.
    pub sections: SectionLoading,
}

impl DashboardState {
    /// Pass-rate change between the last two time-series points.
    ///
    /// Formatted as `+x.xx%` or `-x.xx%`; `"0%"` when fewer than two points
    /// exist or either has no tests.
    #[must_use]
    pub fn pass_rate_trend(&self) -> String {
        let [.., previous, latest] = self.time_series.as_slice() else {
            return "0%".to_owned();
        };

        match (latest.pass_rate(), previous.pass_rate()) {
            (Some(latest), Some(previous)) => {
                let diff = latest - previous;
                if diff >= 0.0 {
                    format!("+{diff:.2}%")
                } else {
                    format!("{diff:.2}%")
                }
            }
            _ => "0%".to_owned(),
        }
    }
}
