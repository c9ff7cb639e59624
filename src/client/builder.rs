//! Builder pattern for live-update client configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use apitest_dashboard::{LiveUpdateClient, ReconnectPolicy};
//!
//! # fn example() -> apitest_dashboard::Result<()> {
//! let client = LiveUpdateClient::builder()
//!     .url("wss://backend.example.com/ws")
//!     .heartbeat_interval(Duration::from_secs(30))
//!     .reconnect_policy(ReconnectPolicy::with_base_delay(Duration::from_secs(2)))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::Channel;

use super::config::{ClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL};
use super::core::LiveUpdateClient;
use super::policy::ReconnectPolicy;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`LiveUpdateClient`].
///
/// Use [`LiveUpdateClient::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    /// Endpoint URL, validated on build.
    url: Option<String>,
    /// Keep-alive interval.
    heartbeat_interval: Duration,
    /// Handshake timeout.
    connect_timeout: Duration,
    /// Subscription channel.
    channel: Channel,
    /// Backoff policy.
    reconnect: ReconnectPolicy,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            url: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            channel: Channel::metrics(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a builder with default settings and no URL.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the live-update endpoint.
    ///
    /// # Arguments
    ///
    /// * `url` - `ws://` or `wss://` URL of the backend feed
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the keep-alive interval.
    #[inline]
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the subscription channel.
    #[inline]
    #[must_use]
    pub fn channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    /// Sets the reconnect backoff policy.
    #[inline]
    #[must_use]
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Builds the client with validation.
    ///
    /// The client is created without a socket; call
    /// [`LiveUpdateClient::connect`] to start the feed.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the URL is missing or not `ws`/`wss`
    /// - [`Error::Url`] if the URL does not parse
    /// - [`Error::Config`] if an interval is zero or the policy is invalid
    pub fn build(self) -> Result<LiveUpdateClient> {
        let config = self.into_config()?;
        Ok(LiveUpdateClient::new(config))
    }

    /// Validates and returns the configuration without creating a client.
    ///
    /// # Errors
    ///
    /// Same as [`ClientBuilder::build`].
    pub fn into_config(self) -> Result<ClientConfig> {
        let url = Self::validate_url(self.url.as_deref())?;

        if self.heartbeat_interval.is_zero() {
            return Err(Error::config("Heartbeat interval must be greater than zero"));
        }

        if self.connect_timeout.is_zero() {
            return Err(Error::config("Connect timeout must be greater than zero"));
        }

        self.reconnect.validate()?;

        Ok(ClientConfig {
            url,
            heartbeat_interval: self.heartbeat_interval,
            connect_timeout: self.connect_timeout,
            channel: self.channel,
            reconnect: self.reconnect,
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Validates the endpoint URL.
    fn validate_url(url: Option<&str>) -> Result<Url> {
        let raw = url.ok_or_else(|| {
            Error::config(
                "Live-update URL is required. Use .url() to set it.\n\
                 Example: LiveUpdateClient::builder().url(\"ws://localhost:5000\")",
            )
        })?;

        let url = Url::parse(raw)?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::config(format!(
                "Live-update URL must use ws:// or wss://, got {other}://"
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
