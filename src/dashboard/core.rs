//! Dashboard controller.
//!
//! [`Dashboard`] keeps the view state in sync with the backend. REST calls
//! go through a [`DashboardApi`]; live events from a [`LiveUpdateClient`]
//! trigger targeted refreshes.
//!
//! Refresh operations never fail: errors are logged and surfaced as the
//! banner in [`DashboardState::error`]. Mutations also return the error.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use crate::client::core::WeakClient;
use crate::client::{ConnectionState, LiveEvent, LiveUpdateClient, Notice};
use crate::error::{Error, Result};
use crate::identifiers::{RepositoryId, SubscriptionId};
use crate::protocol::{MessageKind, MetricsSnapshot};

use super::api::DashboardApi;
use super::models::{
    ActiveView, DashboardConfig, RepositoryDraft, RepositoryPatch, TestQuery, TimePeriod,
};
use super::state::DashboardState;

// ============================================================================
// Constants
// ============================================================================

/// Default interval of the background refresh.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

// ============================================================================
// Types
// ============================================================================

/// Item queued from client handlers to the pump task.
enum Pumped {
    Event(LiveEvent),
    Notice(Notice),
}

/// Handlers registered by [`Dashboard::attach`].
///
/// Dropped with the pump task, which unregisters them from a client that
/// is still alive.
struct Registration {
    client: WeakClient,
    ids: Vec<SubscriptionId>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some(client) = self.client.upgrade() else {
            return;
        };
        for id in self.ids.drain(..) {
            client.remove_handler(id);
        }
        debug!("Dashboard handlers unregistered");
    }
}

/// Section whose refresh flag is toggled.
#[derive(Clone, Copy)]
enum Section {
    Metrics,
    Repositories,
    Tests,
    Config,
}

// ============================================================================
// Dashboard
// ============================================================================

/// View-state controller over a REST collaborator.
pub struct Dashboard<A> {
    api: A,
    state: RwLock<DashboardState>,
}

impl<A: DashboardApi> Dashboard<A> {
    /// Creates a dashboard in its loading state.
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: RwLock::new(DashboardState {
                loading: true,
                ..DashboardState::default()
            }),
        }
    }

    /// REST collaborator.
    #[inline]
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Snapshot of the current view state.
    #[must_use]
    pub fn state(&self) -> DashboardState {
        self.state.read().clone()
    }

    /// See [`DashboardState::pass_rate_trend`].
    #[must_use]
    pub fn pass_rate_trend(&self) -> String {
        self.state.read().pass_rate_trend()
    }

    /// Clears the error banner.
    pub fn dismiss_error(&self) {
        self.state.write().error = None;
    }

    fn set_section(&self, section: Section, busy: bool) {
        let mut state = self.state.write();
        let flag = match section {
            Section::Metrics => &mut state.sections.metrics,
            Section::Repositories => &mut state.sections.repositories,
            Section::Tests => &mut state.sections.tests,
            Section::Config => &mut state.sections.config,
        };
        *flag = busy;
    }

    fn show_error(&self, banner: String, err: &Error) {
        error!(error = %err, banner = %banner, "Dashboard request failed");
        self.state.write().error = Some(banner);
    }

    fn fetch_failed(&self, what: &str, err: &Error) {
        self.show_error(format!("Failed to fetch {what}. Please try again later."), err);
    }
}

// ============================================================================
// Dashboard - Refresh
// ============================================================================

impl<A: DashboardApi> Dashboard<A> {
    /// Initial load: metrics, repositories and time series concurrently.
    pub async fn load(&self) {
        {
            let mut state = self.state.write();
            state.loading = true;
            state.error = None;
        }

        tokio::join!(
            self.refresh_metrics(),
            self.refresh_repositories(),
            self.refresh_time_series(),
        );

        self.state.write().loading = false;
        info!("Dashboard loaded");
    }

    /// Reloads the metrics summary.
    pub async fn refresh_metrics(&self) {
        self.set_section(Section::Metrics, true);
        match self.api.metrics_summary().await {
            Ok(metrics) => self.state.write().metrics = Some(metrics),
            Err(e) => self.fetch_failed("metrics summary", &e),
        }
        self.set_section(Section::Metrics, false);
    }

    /// Reloads the repository list.
    pub async fn refresh_repositories(&self) {
        self.set_section(Section::Repositories, true);
        match self.api.repositories().await {
            Ok(repositories) => self.state.write().repositories = repositories,
            Err(e) => self.fetch_failed("repositories", &e),
        }
        self.set_section(Section::Repositories, false);
    }

    /// Reloads the time series for the current period and selection.
    pub async fn refresh_time_series(&self) {
        let (period, selected) = {
            let state = self.state.read();
            (state.period, state.selected_repository.clone())
        };

        match self.api.time_series(period, selected.as_ref()).await {
            Ok(points) => self.state.write().time_series = points,
            Err(e) => self.fetch_failed("time series data", &e),
        }
    }

    /// Reloads the selected repository's tests, or clears them when
    /// nothing is selected.
    pub async fn refresh_tests(&self) {
        let (selected, query) = {
            let state = self.state.read();
            (state.selected_repository.clone(), state.test_query.clone())
        };

        let Some(repository) = selected else {
            let mut state = self.state.write();
            state.tests.clear();
            state.status_counts = Default::default();
            return;
        };

        self.set_section(Section::Tests, true);
        match self.api.repository_tests(&repository, &query).await {
            Ok(response) => {
                let mut state = self.state.write();
                // Selection may have moved on while the request was in flight
                if state.selected_repository.as_ref() == Some(&repository) {
                    state.tests = response.data;
                    state.status_counts = response.status_counts;
                }
            }
            Err(e) => self.fetch_failed("repository tests", &e),
        }
        self.set_section(Section::Tests, false);
    }

    /// Loads the widget layout. Failures are logged only.
    pub async fn load_config(&self, user: Option<&str>) {
        self.set_section(Section::Config, true);
        match self.api.dashboard_config(user).await {
            Ok(config) => self.state.write().config = Some(config),
            Err(e) => warn!(error = %e, user, "Error fetching dashboard config"),
        }
        self.set_section(Section::Config, false);
    }
}

// ============================================================================
// Dashboard - Mutations
// ============================================================================

impl<A: DashboardApi> Dashboard<A> {
    /// Saves the widget layout for `user`.
    ///
    /// # Errors
    ///
    /// Returns the REST error after setting the banner.
    pub async fn save_config(&self, config: &DashboardConfig, user: &str) -> Result<()> {
        match self.api.save_dashboard_config(config, user).await {
            Ok(saved) => {
                self.state.write().config = Some(saved);
                Ok(())
            }
            Err(e) => {
                self.show_error(
                    "Failed to save dashboard configuration. Please try again later.".to_owned(),
                    &e,
                );
                Err(e)
            }
        }
    }

    /// Creates a repository and reloads the list.
    ///
    /// # Errors
    ///
    /// Returns the REST error after setting the banner.
    pub async fn create_repository(&self, draft: &RepositoryDraft) -> Result<()> {
        if let Err(e) = self.api.create_repository(draft).await {
            self.show_error(
                "Failed to create repository. Please try again later.".to_owned(),
                &e,
            );
            return Err(e);
        }

        self.refresh_repositories().await;
        Ok(())
    }

    /// Updates a repository and reloads the list.
    ///
    /// # Errors
    ///
    /// Returns the REST error after setting the banner.
    pub async fn update_repository(&self, id: &RepositoryId, patch: &RepositoryPatch) -> Result<()> {
        if let Err(e) = self.api.update_repository(id, patch).await {
            self.show_error(
                "Failed to update repository. Please try again later.".to_owned(),
                &e,
            );
            return Err(e);
        }

        self.refresh_repositories().await;
        Ok(())
    }

    /// Deletes a repository, reloads the list, and drops the selection if
    /// it pointed at the deleted repository.
    ///
    /// # Errors
    ///
    /// Returns the REST error after setting the banner.
    pub async fn delete_repository(&self, id: &RepositoryId) -> Result<()> {
        if let Err(e) = self.api.delete_repository(id).await {
            self.show_error(
                "Failed to delete repository. Please try again later.".to_owned(),
                &e,
            );
            return Err(e);
        }

        self.refresh_repositories().await;

        let mut state = self.state.write();
        if state.selected_repository.as_ref() == Some(id) {
            state.selected_repository = None;
            state.tests.clear();
            state.status_counts = Default::default();
        }
        Ok(())
    }
}

// ============================================================================
// Dashboard - Navigation
// ============================================================================

impl<A: DashboardApi> Dashboard<A> {
    /// Changes the selected repository and reloads dependent data.
    pub async fn select_repository(&self, repository: Option<RepositoryId>) {
        self.state.write().selected_repository = repository;
        tokio::join!(self.refresh_time_series(), self.refresh_tests());
    }

    /// Switches section, reloading what the section shows.
    pub async fn set_view(&self, view: ActiveView) {
        let has_selection = {
            let mut state = self.state.write();
            state.view = view;
            state.selected_repository.is_some()
        };

        match view {
            ActiveView::Repositories => self.refresh_repositories().await,
            ActiveView::Tests if has_selection => self.refresh_tests().await,
            ActiveView::Settings => self.load_config(None).await,
            ActiveView::Metrics | ActiveView::Tests => {}
        }
    }

    /// Changes the chart period and reloads the time series.
    pub async fn set_period(&self, period: TimePeriod) {
        self.state.write().period = period;
        self.refresh_time_series().await;
    }

    /// Changes the test list filter, reloading it if a repository is
    /// selected.
    pub async fn set_test_query(&self, query: TestQuery) {
        let has_selection = {
            let mut state = self.state.write();
            state.test_query = query;
            state.selected_repository.is_some()
        };

        if has_selection {
            self.refresh_tests().await;
        }
    }
}

// ============================================================================
// Dashboard - Live Updates
// ============================================================================

impl<A: DashboardApi> Dashboard<A> {
    /// Applies one live event.
    ///
    /// - `metrics`: merged into the local metrics
    /// - `testResult`: one time-series refresh, plus one test-list refresh
    ///   when the test view shows a selected repository
    /// - `repositoryUpdate`: one repository-list refresh
    pub async fn handle_live_event(&self, event: &LiveEvent) {
        match event {
            LiveEvent::Metrics { update, .. } => {
                self.state
                    .write()
                    .metrics
                    .get_or_insert_with(MetricsSnapshot::default)
                    .merge(update.clone());
            }
            LiveEvent::TestResult(_) => {
                let tests_visible = {
                    let state = self.state.read();
                    state.view == ActiveView::Tests && state.selected_repository.is_some()
                };

                if tests_visible {
                    tokio::join!(self.refresh_time_series(), self.refresh_tests());
                } else {
                    self.refresh_time_series().await;
                }
            }
            LiveEvent::RepositoryUpdate(_) => self.refresh_repositories().await,
        }
    }

    fn apply_notice(&self, notice: &Notice) {
        warn!(notice = %notice.message(), "Live-update notice");
        self.state.write().error = Some(notice.message());
    }

    fn set_connection(&self, connection: ConnectionState) {
        self.state.write().connection = connection;
    }

    /// Subscribes to `client` and applies its events on one pump task.
    ///
    /// Events are applied strictly in arrival order. Connection status
    /// changes are mirrored into [`DashboardState::connection`]. The task
    /// ends once the client is dropped. Aborting the returned handle
    /// unregisters the handlers it added.
    pub fn attach(self: &Arc<Self>, client: &LiveUpdateClient) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ids = Vec::with_capacity(4);

        for kind in [
            MessageKind::Metrics,
            MessageKind::TestResult,
            MessageKind::RepositoryUpdate,
        ] {
            let tx = tx.clone();
            ids.push(client.on(kind, move |event| {
                let _ = tx.send(Pumped::Event(event.clone()));
            }));
        }
        ids.push(client.on_notice(move |notice| {
            let _ = tx.send(Pumped::Notice(notice.clone()));
        }));

        let registration = Registration {
            client: client.downgrade(),
            ids,
        };

        let mut connection = client.watch_state();
        self.set_connection(*connection.borrow_and_update());

        let dashboard = Arc::clone(self);
        tokio::spawn(async move {
            let _registration = registration;
            loop {
                tokio::select! {
                    item = rx.recv() => match item {
                        Some(Pumped::Event(event)) => dashboard.handle_live_event(&event).await,
                        Some(Pumped::Notice(notice)) => dashboard.apply_notice(&notice),
                        None => break,
                    },
                    changed = connection.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let current = *connection.borrow_and_update();
                        dashboard.set_connection(current);
                    }
                }
            }
            debug!("Dashboard live-update pump stopped");
        })
    }

    /// Refreshes metrics, time series and selected tests every `period`.
    ///
    /// The first refresh happens one period from now. The task ends once
    /// the dashboard is dropped.
    pub fn spawn_poller(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let dashboard: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(dashboard) = dashboard.upgrade() else {
                    break;
                };

                debug!("Periodic dashboard refresh");
                let has_selection = dashboard.state.read().selected_repository.is_some();
                if has_selection {
                    tokio::join!(
                        dashboard.refresh_metrics(),
                        dashboard.refresh_time_series(),
                        dashboard.refresh_tests(),
                    );
                } else {
                    tokio::join!(dashboard.refresh_metrics(), dashboard.refresh_time_series());
                }
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures_util::SinkExt;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use tokio_tungstenite::tungstenite::Message;

    use crate::client::ReconnectPolicy;
    use crate::dashboard::models::{
        Repository, RepositoryStatus, RepositoryTests, TestStatus, TimeSeriesPoint,
    };
    use crate::testing::{TestServer, eventually, next_text};

    #[derive(Default)]
    struct Calls {
        metrics: AtomicUsize,
        repositories: AtomicUsize,
        time_series: AtomicUsize,
        tests: AtomicUsize,
        config: AtomicUsize,
        deletes: AtomicUsize,
    }

    #[derive(Default)]
    struct MockApi {
        calls: Calls,
        fail_repositories: AtomicBool,
        fail_writes: AtomicBool,
        fail_config: AtomicBool,
        time_series_args: Mutex<Vec<(TimePeriod, Option<RepositoryId>)>>,
        test_queries: Mutex<Vec<TestQuery>>,
    }

    fn unavailable(endpoint: &str) -> Error {
        Error::http(endpoint, 503)
    }

    fn repository(id: &str) -> Repository {
        Repository {
            id: Some(RepositoryId::from(id)),
            name: format!("{id}-service"),
            owner: "platform".into(),
            status: RepositoryStatus::Active,
            url: format!("https://github.com/acme/{id}"),
            description: None,
        }
    }

    #[async_trait]
    impl DashboardApi for MockApi {
        async fn metrics_summary(&self) -> Result<MetricsSnapshot> {
            self.calls.metrics.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_value(json!({"passRate": 90, "totalTests": 40}))?)
        }

        async fn repositories(&self) -> Result<Vec<Repository>> {
            self.calls.repositories.fetch_add(1, Ordering::SeqCst);
            if self.fail_repositories.load(Ordering::SeqCst) {
                return Err(unavailable("/api/repositories"));
            }
            Ok(vec![repository("r1"), repository("r2")])
        }

        async fn create_repository(&self, _draft: &RepositoryDraft) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(unavailable("/api/repositories"));
            }
            Ok(())
        }

        async fn update_repository(&self, _id: &RepositoryId, _patch: &RepositoryPatch) -> Result<()> {
            Ok(())
        }

        async fn delete_repository(&self, _id: &RepositoryId) -> Result<()> {
            self.calls.deletes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(unavailable("/api/repositories/r1"));
            }
            Ok(())
        }

        async fn time_series(
            &self,
            period: TimePeriod,
            repository: Option<&RepositoryId>,
        ) -> Result<Vec<TimeSeriesPoint>> {
            self.calls.time_series.fetch_add(1, Ordering::SeqCst);
            self.time_series_args
                .lock()
                .push((period, repository.cloned()));
            Ok(vec![TimeSeriesPoint {
                date: "2024-05-01".into(),
                total: 10,
                passed: 8,
                ..TimeSeriesPoint::default()
            }])
        }

        async fn repository_tests(
            &self,
            repository: &RepositoryId,
            query: &TestQuery,
        ) -> Result<RepositoryTests> {
            self.calls.tests.fetch_add(1, Ordering::SeqCst);
            self.test_queries.lock().push(query.clone());
            Ok(serde_json::from_value(json!({
                "success": true,
                "count": 1,
                "statusCounts": {"passed": 0, "failed": 1, "skipped": 0, "error": 0},
                "data": [{
                    "_id": "t1",
                    "repositoryId": repository.as_str(),
                    "name": "POST /orders",
                    "status": "failed",
                    "duration": 120.0,
                    "executedAt": "2024-05-01T10:00:00Z"
                }]
            }))?)
        }

        async fn dashboard_config(&self, _user: Option<&str>) -> Result<DashboardConfig> {
            self.calls.config.fetch_add(1, Ordering::SeqCst);
            if self.fail_config.load(Ordering::SeqCst) {
                return Err(unavailable("/api/dashboard/config"));
            }
            Ok(DashboardConfig {
                name: "Default".into(),
                ..DashboardConfig::default()
            })
        }

        async fn save_dashboard_config(
            &self,
            config: &DashboardConfig,
            _user: &str,
        ) -> Result<DashboardConfig> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(unavailable("/api/dashboard/config"));
            }
            Ok(config.clone())
        }
    }

    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn dashboard() -> Arc<Dashboard<MockApi>> {
        Arc::new(Dashboard::new(MockApi::default()))
    }

    #[tokio::test]
    async fn test_load_populates_sections() {
        let dashboard = dashboard();
        assert!(dashboard.state().loading);

        dashboard.load().await;

        let state = dashboard.state();
        assert!(!state.loading);
        assert_eq!(state.error, None);
        assert_eq!(state.metrics.and_then(|m| m.pass_rate), Some(90.0));
        assert_eq!(state.repositories.len(), 2);
        assert_eq!(state.time_series.len(), 1);
        assert_eq!(
            *dashboard.api().time_series_args.lock(),
            vec![(TimePeriod::Week, None)]
        );
        assert_eq!(state.sections, Default::default());
    }

    #[tokio::test]
    async fn test_fetch_failure_sets_banner_only() {
        let dashboard = dashboard();
        dashboard
            .api()
            .fail_repositories
            .store(true, Ordering::SeqCst);

        dashboard.load().await;

        let state = dashboard.state();
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to fetch repositories. Please try again later.")
        );
        assert!(state.metrics.is_some());
        assert!(state.repositories.is_empty());

        dashboard.dismiss_error();
        assert_eq!(dashboard.state().error, None);
    }

    #[tokio::test]
    async fn test_test_result_in_test_view_refreshes_once_each() {
        let dashboard = dashboard();
        dashboard
            .select_repository(Some(RepositoryId::from("r1")))
            .await;
        dashboard.set_view(ActiveView::Tests).await;
        let calls = &dashboard.api().calls;
        let (series_before, tests_before) = (count(&calls.time_series), count(&calls.tests));

        dashboard
            .handle_live_event(&LiveEvent::TestResult(None))
            .await;

        assert_eq!(count(&calls.time_series), series_before + 1);
        assert_eq!(count(&calls.tests), tests_before + 1);
        assert_eq!(
            dashboard.api().time_series_args.lock().last(),
            Some(&(TimePeriod::Week, Some(RepositoryId::from("r1"))))
        );
    }

    #[tokio::test]
    async fn test_test_result_outside_test_view_skips_tests() {
        let dashboard = dashboard();
        dashboard
            .select_repository(Some(RepositoryId::from("r1")))
            .await;
        let calls = &dashboard.api().calls;
        let tests_before = count(&calls.tests);

        dashboard
            .handle_live_event(&LiveEvent::TestResult(Some(json!({"name": "x"}))))
            .await;

        assert_eq!(count(&calls.tests), tests_before);
        assert_eq!(count(&calls.time_series), 2);
    }

    #[tokio::test]
    async fn test_repository_update_refreshes_list() {
        let dashboard = dashboard();

        dashboard
            .handle_live_event(&LiveEvent::RepositoryUpdate(None))
            .await;

        assert_eq!(count(&dashboard.api().calls.repositories), 1);
        assert_eq!(dashboard.state().repositories.len(), 2);
    }

    #[tokio::test]
    async fn test_metrics_event_merges_into_summary() {
        let dashboard = dashboard();
        dashboard.refresh_metrics().await;

        let update: MetricsSnapshot = serde_json::from_value(json!({"passRate": 95})).unwrap();
        dashboard
            .handle_live_event(&LiveEvent::Metrics {
                snapshot: update.clone(),
                update,
            })
            .await;

        let metrics = dashboard.state().metrics.unwrap();
        assert_eq!(metrics.pass_rate, Some(95.0));
        assert_eq!(metrics.total_tests, Some(40.0));
    }

    #[tokio::test]
    async fn test_deselect_clears_tests_without_request() {
        let dashboard = dashboard();
        dashboard
            .select_repository(Some(RepositoryId::from("r1")))
            .await;
        assert_eq!(dashboard.state().tests.len(), 1);
        assert_eq!(dashboard.state().status_counts.failed, 1);

        dashboard.select_repository(None).await;

        let state = dashboard.state();
        assert!(state.tests.is_empty());
        assert_eq!(state.status_counts.total(), 0);
        assert_eq!(count(&dashboard.api().calls.tests), 1);
    }

    #[tokio::test]
    async fn test_delete_selected_repository_clears_selection() -> anyhow::Result<()> {
        let dashboard = dashboard();
        let id = RepositoryId::from("r1");
        dashboard.select_repository(Some(id.clone())).await;

        dashboard.delete_repository(&id).await?;

        let state = dashboard.state();
        assert_eq!(state.selected_repository, None);
        assert!(state.tests.is_empty());
        assert_eq!(count(&dashboard.api().calls.repositories), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_other_repository_keeps_selection() -> anyhow::Result<()> {
        let dashboard = dashboard();
        dashboard
            .select_repository(Some(RepositoryId::from("r1")))
            .await;

        dashboard
            .delete_repository(&RepositoryId::from("r2"))
            .await?;

        assert_eq!(
            dashboard.state().selected_repository,
            Some(RepositoryId::from("r1"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_mutation_returns_error_and_banner() {
        let dashboard = dashboard();
        dashboard.api().fail_writes.store(true, Ordering::SeqCst);

        assert_err!(
            dashboard
                .create_repository(&RepositoryDraft::new("svc", "me", "https://x"))
                .await
        );
        assert_eq!(
            dashboard.state().error.as_deref(),
            Some("Failed to create repository. Please try again later.")
        );
        assert_eq!(count(&dashboard.api().calls.repositories), 0);

        assert_err!(
            dashboard
                .save_config(&DashboardConfig::default(), "default")
                .await
        );
        assert_eq!(
            dashboard.state().error.as_deref(),
            Some("Failed to save dashboard configuration. Please try again later.")
        );
    }

    #[tokio::test]
    async fn test_create_repository_reloads_list() {
        let dashboard = dashboard();

        assert_ok!(
            dashboard
                .create_repository(&RepositoryDraft::new("svc", "me", "https://x"))
                .await
        );
        assert_eq!(count(&dashboard.api().calls.repositories), 1);
    }

    #[tokio::test]
    async fn test_settings_view_loads_config_quietly() {
        let dashboard = dashboard();
        dashboard.api().fail_config.store(true, Ordering::SeqCst);

        dashboard.set_view(ActiveView::Settings).await;
        assert_eq!(dashboard.state().error, None);
        assert_eq!(dashboard.state().config, None);

        dashboard.api().fail_config.store(false, Ordering::SeqCst);
        dashboard.set_view(ActiveView::Settings).await;
        assert_eq!(
            dashboard.state().config.map(|c| c.name),
            Some("Default".to_owned())
        );
        assert_eq!(count(&dashboard.api().calls.config), 2);
    }

    #[tokio::test]
    async fn test_query_change_refetches_selected_tests() {
        let dashboard = dashboard();
        let query = TestQuery {
            status: Some(TestStatus::Failed),
            ..TestQuery::default()
        };

        dashboard.set_test_query(query.clone()).await;
        assert_eq!(count(&dashboard.api().calls.tests), 0);

        dashboard
            .select_repository(Some(RepositoryId::from("r1")))
            .await;
        dashboard
            .set_test_query(TestQuery {
                limit: 5,
                ..query
            })
            .await;

        let queries = dashboard.api().test_queries.lock();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1].limit, 5);
        assert_eq!(queries[1].status, Some(TestStatus::Failed));
    }

    #[tokio::test]
    async fn test_period_change_refreshes_series() {
        let dashboard = dashboard();

        dashboard.set_period(TimePeriod::Quarter).await;

        assert_eq!(dashboard.state().period, TimePeriod::Quarter);
        assert_eq!(
            *dashboard.api().time_series_args.lock(),
            vec![(TimePeriod::Quarter, None)]
        );
    }

    #[tokio::test]
    async fn test_poller_refreshes_periodically() {
        let dashboard = dashboard();
        let poller = dashboard.spawn_poller(Duration::from_millis(20));

        eventually(|| count(&dashboard.api().calls.metrics) >= 2).await;
        assert!(count(&dashboard.api().calls.time_series) >= 2);
        assert_eq!(count(&dashboard.api().calls.tests), 0);

        poller.abort();
    }

    #[tokio::test]
    async fn test_attach_follows_live_feed() {
        let mut server = TestServer::start().await;
        let client = LiveUpdateClient::builder()
            .url(server.url())
            .reconnect_policy(ReconnectPolicy::with_base_delay(Duration::from_secs(20)))
            .build()
            .unwrap();
        let dashboard = dashboard();
        let _pump = dashboard.attach(&client);

        client.connect();
        let mut ws = server.next_connection().await;
        let _subscribe = next_text(&mut ws).await;
        eventually(|| dashboard.state().connection == ConnectionState::Connected).await;

        ws.send(Message::Text(r#"{"type":"repositoryUpdate"}"#.into()))
            .await
            .unwrap();
        ws.send(Message::Text(
            r#"{"type":"metrics","data":{"testsLast7Days":12}}"#.into(),
        ))
        .await
        .unwrap();

        eventually(|| {
            dashboard
                .state()
                .metrics
                .is_some_and(|m| m.tests_last_7_days == Some(12.0))
        })
        .await;
        assert_eq!(count(&dashboard.api().calls.repositories), 1);

        ws.close(None).await.unwrap();
        eventually(|| dashboard.state().connection == ConnectionState::Disconnected).await;
    }

    #[tokio::test]
    async fn test_stopped_pump_unregisters_handlers() {
        let client = LiveUpdateClient::builder()
            .url("ws://127.0.0.1:9/")
            .build()
            .unwrap();
        let dashboard = dashboard();

        let pump = dashboard.attach(&client);
        for kind in [
            MessageKind::Metrics,
            MessageKind::TestResult,
            MessageKind::RepositoryUpdate,
        ] {
            assert_eq!(client.handler_count(kind), 1);
        }
        assert_eq!(client.notice_handler_count(), 1);

        pump.abort();
        eventually(|| {
            client.handler_count(MessageKind::Metrics) == 0
                && client.handler_count(MessageKind::TestResult) == 0
                && client.handler_count(MessageKind::RepositoryUpdate) == 0
                && client.notice_handler_count() == 0
        })
        .await;

        let _second = dashboard.attach(&client);
        assert_eq!(client.handler_count(MessageKind::Metrics), 1);
    }

    #[tokio::test]
    async fn test_notice_becomes_banner() {
        let dashboard = dashboard();
        dashboard.apply_notice(&Notice::degraded());
        assert_eq!(
            dashboard.state().error.as_deref(),
            Some(Notice::DEGRADED_MESSAGE)
        );
    }
}
