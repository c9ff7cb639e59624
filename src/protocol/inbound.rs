//! Inbound message types.
//!
//! Frames are parsed in two steps, first into a loosely typed [`Envelope`]
//! and then into an [`InboundMessage`]. Only the first step can fail for a
//! well-formed JSON object with a string `type`; unrecognized tags become
//! [`InboundMessage::Unknown`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde_json::{Value, from_str, from_value};

use crate::error::{Error, Result};

use super::MetricsSnapshot;

// ============================================================================
// Envelope
// ============================================================================

/// Raw inbound frame.
///
/// # Format
///
/// ```json
/// {
///   "type": "metrics",
///   "data": { ... }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Message tag.
    #[serde(rename = "type")]
    pub kind: String,

    /// Optional opaque payload.
    #[serde(default)]
    pub data: Option<Value>,
}

impl Envelope {
    /// Parses a text frame into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the frame is not a JSON object with a
    /// string `type` field.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(from_str(text)?)
    }

    /// Converts the envelope into a typed message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if a `metrics` payload is not an object.
    pub fn into_message(self) -> Result<InboundMessage> {
        let message = match self.kind.as_str() {
            "metrics" => {
                let snapshot = match self.data {
                    None | Some(Value::Null) => MetricsSnapshot::default(),
                    Some(data @ Value::Object(_)) => from_value(data)?,
                    Some(other) => {
                        return Err(Error::protocol(format!(
                            "metrics payload must be an object, got {other}"
                        )));
                    }
                };
                InboundMessage::Metrics(snapshot)
            }
            "testResult" => InboundMessage::TestResult(self.data),
            "repositoryUpdate" => InboundMessage::RepositoryUpdate(self.data),
            "ping" => InboundMessage::Ping,
            "pong" => InboundMessage::Pong,
            _ => InboundMessage::Unknown { kind: self.kind },
        };

        Ok(message)
    }
}

// ============================================================================
// MessageKind
// ============================================================================

/// Inbound categories consumers can register handlers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Metrics update.
    Metrics,
    /// A test execution finished.
    TestResult,
    /// Repository list changed.
    RepositoryUpdate,
}

impl MessageKind {
    /// Wire tag of this category.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Metrics => "metrics",
            Self::TestResult => "testResult",
            Self::RepositoryUpdate => "repositoryUpdate",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// InboundMessage
// ============================================================================

/// Typed inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Partial metrics to merge into the current snapshot.
    Metrics(MetricsSnapshot),

    /// A test execution finished. Payload is passed through untouched.
    TestResult(Option<Value>),

    /// Repository list changed. Payload is passed through untouched.
    RepositoryUpdate(Option<Value>),

    /// Keep-alive ping from the server.
    Ping,

    /// Keep-alive answer from the server.
    Pong,

    /// Tag this client does not understand.
    Unknown {
        /// The unrecognized tag.
        kind: String,
    },
}

impl InboundMessage {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the frame is not valid JSON or lacks `type`
    /// - [`Error::Protocol`] if a `metrics` payload is malformed
    pub fn parse(text: &str) -> Result<Self> {
        Envelope::parse(text)?.into_message()
    }

    /// Returns the handler category, if this message has one.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            Self::Metrics(_) => Some(MessageKind::Metrics),
            Self::TestResult(_) => Some(MessageKind::TestResult),
            Self::RepositoryUpdate(_) => Some(MessageKind::RepositoryUpdate),
            Self::Ping | Self::Pong | Self::Unknown { .. } => None,
        }
    }

    /// Returns `true` for keep-alive traffic.
    #[inline]
    #[must_use]
    pub fn is_keepalive(&self) -> bool {
        matches!(self, Self::Ping | Self::Pong)
    }
}

// ============================================================================
// Tests
// ============================================================================
