//! API-testing dashboard - live-update client and dashboard state.
//!
//! This library keeps a dashboard for an API-testing platform current: a
//! reconnecting WebSocket client streams live updates from the backend,
//! and a controller keeps the view state in sync with its REST API.
//!
//! # Architecture
//!
//! - **[`LiveUpdateClient`]**: owns one WebSocket connection, subscribes to
//!   the `metrics` channel, sends heartbeats, reconnects with exponential
//!   backoff, and dispatches typed messages to registered handlers
//! - **[`Dashboard`]**: view state over a [`DashboardApi`]; live events
//!   trigger targeted refreshes
//!
//! Key design principles:
//!
//! - One socket and one reconnect timer at a time, tracked by generation
//! - Caller-initiated close never schedules a reconnect
//! - Malformed or unknown messages are logged and dropped, never fatal
//! - REST failures become a user-visible banner, not a panic
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use apitest_dashboard::{Dashboard, HttpApi, LiveUpdateClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let api = HttpApi::builder()
//!         .base_url("http://localhost:5000")
//!         .build()?;
//!     let dashboard = Arc::new(Dashboard::new(api));
//!     dashboard.load().await;
//!
//!     let client = LiveUpdateClient::builder()
//!         .url("ws://localhost:5000")
//!         .build()?;
//!     let _pump = dashboard.attach(&client);
//!     client.connect();
//!
//!     println!("pass-rate trend: {}", dashboard.pass_rate_trend());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Reconnecting live-update client |
//! | [`dashboard`] | Dashboard controller and REST collaborator |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Live-update message types |
//! | [`transport`] | WebSocket connection task (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Reconnecting live-update client.
///
/// Use [`LiveUpdateClient::builder()`] to configure a client.
pub mod client;

/// Dashboard controller and REST collaborator.
pub mod dashboard;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Live-update message types.
///
/// Inbound `{type, data}` envelopes and outbound `ping`/`subscribe`.
pub mod protocol;

/// WebSocket transport layer.
///
/// Internal module running one connection per generation.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    ClientBuilder, ClientConfig, ConnectionState, LiveEvent, LiveUpdateClient, Notice,
    ReconnectPolicy,
};

// Dashboard types
pub use dashboard::{Dashboard, DashboardApi, DashboardState, HttpApi, HttpApiBuilder};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{Channel, RepositoryId, SubscriptionId};

// Protocol types
pub use protocol::{InboundMessage, MessageKind, MetricsSnapshot, StatusCounts};
