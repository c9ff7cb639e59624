//! Outbound message types.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::to_string;

use crate::error::Result;
use crate::identifiers::Channel;

// ============================================================================
// OutboundMessage
// ============================================================================

/// Message sent from the client to the live-update endpoint.
///
/// # Format
///
/// ```json
/// { "type": "ping" }
/// { "type": "subscribe", "channel": "metrics" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Heartbeat ping.
    Ping,

    /// Channel subscription, sent once per successful open.
    Subscribe {
        /// Channel to subscribe to.
        channel: Channel,
    },
}

impl OutboundMessage {
    /// Creates a subscription message.
    #[inline]
    #[must_use]
    pub fn subscribe(channel: Channel) -> Self {
        Self::Subscribe { channel }
    }

    /// Serializes the message to a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
