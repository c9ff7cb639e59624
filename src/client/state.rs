//! Connection status, advisory notices and delivered events.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::Value;

use crate::protocol::{MessageKind, MetricsSnapshot};

// ============================================================================
// ConnectionState
// ============================================================================

/// Status of the live-update connection.
///
/// `Connecting -> Connected` on open, `Connected -> Disconnected` on close
/// or error, `Disconnected -> Connecting` on every reconnect attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Handshake in progress.
    #[default]
    Connecting,
    /// Socket open and subscribed.
    Connected,
    /// No socket; a reconnect may be scheduled.
    Disconnected,
}

impl ConnectionState {
    /// Lowercase label for status indicators.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Notice
// ============================================================================

/// User-visible advisory raised by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The transport reported an error; live data may be stale.
    Degraded {
        /// Banner text.
        message: String,
    },

    /// The reconnect policy ran out of attempts.
    GaveUp {
        /// Attempts made before giving up.
        attempts: u32,
    },
}

impl Notice {
    /// Banner shown when the transport errors.
    pub const DEGRADED_MESSAGE: &'static str =
        "WebSocket connection error. Some data may not update in real-time.";

    /// Creates the standard degraded notice.
    #[inline]
    #[must_use]
    pub fn degraded() -> Self {
        Self::Degraded {
            message: Self::DEGRADED_MESSAGE.to_owned(),
        }
    }

    /// Banner text for this notice.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Degraded { message } => message.clone(),
            Self::GaveUp { attempts } => format!(
                "Live data connection lost after {attempts} reconnect attempts. Use reconnect to try again."
            ),
        }
    }
}

// ============================================================================
// LiveEvent
// ============================================================================

/// Event delivered to registered handlers, one per inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// Metrics changed.
    Metrics {
        /// Fields carried by this message only.
        update: MetricsSnapshot,
        /// Client snapshot after merging `update`.
        snapshot: MetricsSnapshot,
    },

    /// A test execution finished.
    TestResult(Option<Value>),

    /// Repository list changed.
    RepositoryUpdate(Option<Value>),
}

impl LiveEvent {
    /// Handler category of this event.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Metrics { .. } => MessageKind::Metrics,
            Self::TestResult(_) => MessageKind::TestResult,
            Self::RepositoryUpdate(_) => MessageKind::RepositoryUpdate,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_connecting() {
        assert_eq!(ConnectionState::default(), ConnectionState::Connecting);
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Disconnected.as_str(), "disconnected");
    }

    #[test]
    fn test_notice_messages() {
        assert_eq!(Notice::degraded().message(), Notice::DEGRADED_MESSAGE);
        assert!(Notice::GaveUp { attempts: 5 }.message().contains("5 reconnect"));
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(LiveEvent::TestResult(None).kind(), MessageKind::TestResult);
        assert_eq!(
            LiveEvent::RepositoryUpdate(None).kind(),
            MessageKind::RepositoryUpdate
        );
    }
}
