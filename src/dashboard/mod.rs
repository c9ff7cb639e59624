//! Dashboard consumer of the live-update feed.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `api` | [`DashboardApi`] seam and [`HttpApi`] |
//! | `core` | [`Dashboard`] controller |
//! | `models` | REST resources |
//! | `state` | [`DashboardState`] |

// ============================================================================
// Submodules
// ============================================================================

/// REST collaborator.
pub mod api;

/// Dashboard controller.
pub mod core;

/// REST resource models.
pub mod models;

/// View state.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use api::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, DashboardApi, HttpApi, HttpApiBuilder};
pub use core::{DEFAULT_POLL_INTERVAL, Dashboard};
pub use models::{
    ActiveView, DashboardConfig, DashboardWidget, Repository, RepositoryDraft, RepositoryPatch,
    RepositoryStatus, RepositoryTests, SortOrder, TestDetails, TestQuery, TestResult, TestStatus,
    TimePeriod, TimeSeriesPoint, WidgetKind, WidgetPosition,
};
pub use state::{DashboardState, SectionLoading};
