//! Live-update client configuration.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::identifiers::Channel;
use crate::transport::LinkSettings;

use super::policy::ReconnectPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Default keep-alive interval while connected.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default timeout for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// ClientConfig
// ============================================================================

/// Validated configuration of a [`super::LiveUpdateClient`].
///
/// Built through [`super::ClientBuilder`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Live-update endpoint (`ws://` or `wss://`).
    pub url: Url,

    /// Interval between `ping` heartbeats while the connection is open.
    pub heartbeat_interval: Duration,

    /// Maximum time for the WebSocket handshake.
    pub connect_timeout: Duration,

    /// Channel subscribed to after every successful open.
    pub channel: Channel,

    /// Backoff between reconnect attempts.
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    /// Per-connection settings handed to the transport.
    #[inline]
    pub(crate) fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            url: self.url.to_string(),
            heartbeat_interval: self.heartbeat_interval,
            connect_timeout: self.connect_timeout,
            channel: self.channel.clone(),
        }
    }
}
