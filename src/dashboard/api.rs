//! REST collaborator.
//!
//! [`DashboardApi`] is the seam between the dashboard controller and the
//! backend. [`HttpApi`] talks to the real service; tests substitute their
//! own implementation.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::RepositoryId;
use crate::protocol::MetricsSnapshot;

use super::models::{
    DashboardConfig, Repository, RepositoryDraft, RepositoryPatch, RepositoryTests, TestQuery,
    TimePeriod, TimeSeriesPoint,
};

// ============================================================================
// Constants
// ============================================================================

/// Hosted backend used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://poc-backend-ctxm.onrender.com";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// DashboardApi
// ============================================================================

/// REST operations the dashboard depends on.
#[async_trait]
pub trait DashboardApi: Send + Sync + 'static {
    /// `GET /api/metrics/summary`
    async fn metrics_summary(&self) -> Result<MetricsSnapshot>;

    /// `GET /api/repositories`
    async fn repositories(&self) -> Result<Vec<Repository>>;

    /// `POST /api/repositories`
    async fn create_repository(&self, draft: &RepositoryDraft) -> Result<()>;

    /// `PUT /api/repositories/{id}`
    async fn update_repository(&self, id: &RepositoryId, patch: &RepositoryPatch) -> Result<()>;

    /// `DELETE /api/repositories/{id}`
    async fn delete_repository(&self, id: &RepositoryId) -> Result<()>;

    /// `GET /api/metrics/time-series`
    async fn time_series(
        &self,
        period: TimePeriod,
        repository: Option<&RepositoryId>,
    ) -> Result<Vec<TimeSeriesPoint>>;

    /// `GET /api/metrics/repositories/{id}/tests`
    async fn repository_tests(
        &self,
        repository: &RepositoryId,
        query: &TestQuery,
    ) -> Result<RepositoryTests>;

    /// `GET /api/dashboard/config`
    async fn dashboard_config(&self, user: Option<&str>) -> Result<DashboardConfig>;

    /// `PUT /api/dashboard/config`
    async fn save_dashboard_config(
        &self,
        config: &DashboardConfig,
        user: &str,
    ) -> Result<DashboardConfig>;
}

/// `{ "data": ... }` response wrapper.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

// ============================================================================
// URL Construction
// ============================================================================

fn endpoint(base: &Url, path: &str) -> Result<Url> {
    Ok(base.join(path)?)
}

fn repository_url(base: &Url, id: &RepositoryId) -> Result<Url> {
    endpoint(
        base,
        &format!("api/repositories/{}", urlencoding::encode(id.as_str())),
    )
}

fn time_series_url(base: &Url, period: TimePeriod, repository: Option<&RepositoryId>) -> Result<Url> {
    let mut url = endpoint(base, "api/metrics/time-series")?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("period", period.as_str());
        if let Some(id) = repository {
            query.append_pair("repositoryId", id.as_str());
        }
    }
    Ok(url)
}

fn repository_tests_url(base: &Url, id: &RepositoryId, test_query: &TestQuery) -> Result<Url> {
    let mut url = endpoint(
        base,
        &format!(
            "api/metrics/repositories/{}/tests",
            urlencoding::encode(id.as_str())
        ),
    )?;
    url.query_pairs_mut().extend_pairs(test_query.to_pairs());
    Ok(url)
}

fn dashboard_config_url(base: &Url, user: Option<&str>) -> Result<Url> {
    let mut url = endpoint(base, "api/dashboard/config")?;
    if let Some(user) = user {
        url.query_pairs_mut().append_pair("userId", user);
    }
    Ok(url)
}

/// Parses and normalizes a REST base URL so relative joins keep its path.
fn parse_base(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::config(format!(
            "REST base URL must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

// ============================================================================
// HttpApi
// ============================================================================

/// [`DashboardApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base: Url,
}

impl HttpApi {
    /// Creates a builder with the hosted backend and a 10 s timeout.
    #[inline]
    #[must_use]
    pub fn builder() -> HttpApiBuilder {
        HttpApiBuilder::default()
    }

    /// Base URL every endpoint is resolved against.
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn get_data<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "GET");
        let response = Self::ensure_success(self.client.get(url).send().await?)?;
        let envelope: DataEnvelope<T> = response.json().await?;
        Ok(envelope.data)
    }

    fn ensure_success(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(Error::http(response.url().path(), status.as_u16()))
        }
    }
}

#[async_trait]
impl DashboardApi for HttpApi {
    async fn metrics_summary(&self) -> Result<MetricsSnapshot> {
        self.get_data(endpoint(&self.base, "api/metrics/summary")?)
            .await
    }

    async fn repositories(&self) -> Result<Vec<Repository>> {
        self.get_data(endpoint(&self.base, "api/repositories")?)
            .await
    }

    async fn create_repository(&self, draft: &RepositoryDraft) -> Result<()> {
        let url = endpoint(&self.base, "api/repositories")?;
        debug!(%url, name = %draft.name, "POST");
        Self::ensure_success(self.client.post(url).json(draft).send().await?)?;
        Ok(())
    }

    async fn update_repository(&self, id: &RepositoryId, patch: &RepositoryPatch) -> Result<()> {
        let url = repository_url(&self.base, id)?;
        debug!(%url, "PUT");
        Self::ensure_success(self.client.put(url).json(patch).send().await?)?;
        Ok(())
    }

    async fn delete_repository(&self, id: &RepositoryId) -> Result<()> {
        let url = repository_url(&self.base, id)?;
        debug!(%url, "DELETE");
        Self::ensure_success(self.client.delete(url).send().await?)?;
        Ok(())
    }

    async fn time_series(
        &self,
        period: TimePeriod,
        repository: Option<&RepositoryId>,
    ) -> Result<Vec<TimeSeriesPoint>> {
        self.get_data(time_series_url(&self.base, period, repository)?)
            .await
    }

    async fn repository_tests(
        &self,
        repository: &RepositoryId,
        query: &TestQuery,
    ) -> Result<RepositoryTests> {
        let url = repository_tests_url(&self.base, repository, query)?;
        debug!(%url, "GET");
        let response = Self::ensure_success(self.client.get(url).send().await?)?;
        Ok(response.json().await?)
    }

    async fn dashboard_config(&self, user: Option<&str>) -> Result<DashboardConfig> {
        self.get_data(dashboard_config_url(&self.base, user)?)
            .await
    }

    async fn save_dashboard_config(
        &self,
        config: &DashboardConfig,
        user: &str,
    ) -> Result<DashboardConfig> {
        let url = dashboard_config_url(&self.base, Some(user))?;
        debug!(%url, "PUT");
        let response = Self::ensure_success(self.client.put(url).json(config).send().await?)?;
        let envelope: DataEnvelope<DashboardConfig> = response.json().await?;
        Ok(envelope.data)
    }
}

// ============================================================================
// HttpApiBuilder
// ============================================================================

/// Builder for [`HttpApi`].
#[derive(Debug, Clone)]
pub struct HttpApiBuilder {
    base_url: String,
    timeout: Duration,
}

impl Default for HttpApiBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl HttpApiBuilder {
    /// Sets the backend base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if the base URL does not parse
    /// - [`Error::Config`] if it is not http(s) or the timeout is zero
    /// - [`Error::Request`] if the HTTP client cannot be created
    pub fn build(self) -> Result<HttpApi> {
        if self.timeout.is_zero() {
            return Err(Error::config("REST timeout must be greater than zero"));
        }

        let base = parse_base(&self.base_url)?;
        let client = Client::builder().timeout(self.timeout).build()?;

        Ok(HttpApi { client, base })
    }
}

// ============================================================================
// Tests
// ============================================================================
