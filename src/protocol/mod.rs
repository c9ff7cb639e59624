//! Live-update protocol message types.
//!
//! This module defines the JSON messages exchanged with the backend's
//! live-update endpoint.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Shape |
//! |---------|-----------|-------|
//! | Ping | Local → Remote | `{"type":"ping"}` |
//! | Subscribe | Local → Remote | `{"type":"subscribe","channel":"metrics"}` |
//! | Metrics | Remote → Local | `{"type":"metrics","data":{...partial metrics...}}` |
//! | Test result | Remote → Local | `{"type":"testResult"}` |
//! | Repository update | Remote → Local | `{"type":"repositoryUpdate"}` |
//!
//! Every frame is a text frame with a `type` tag. Unrecognized tags are not
//! errors; they parse into [`InboundMessage::Unknown`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `inbound` | Envelope parsing and typed inbound messages |
//! | `metrics` | Metrics snapshot with shallow-merge semantics |
//! | `outbound` | Keep-alive and subscription messages |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound message parsing.
pub mod inbound;

/// Metrics snapshot model.
pub mod metrics;

/// Outbound message types.
pub mod outbound;

// ============================================================================
// Re-exports
// ============================================================================

pub use inbound::{Envelope, InboundMessage, MessageKind};
pub use metrics::{MetricsSnapshot, StatusCounts};
pub use outbound::OutboundMessage;
