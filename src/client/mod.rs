//! Reconnecting live-update client.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`ClientBuilder`] |
//! | `config` | [`ClientConfig`] and defaults |
//! | `core` | [`LiveUpdateClient`] |
//! | `handlers` | Handler registry |
//! | `policy` | [`ReconnectPolicy`] |
//! | `state` | [`ConnectionState`], [`Notice`], [`LiveEvent`] |

// ============================================================================
// Submodules
// ============================================================================

/// Client builder.
pub mod builder;

/// Client configuration.
pub mod config;

/// Client core.
pub mod core;

/// Handler registry.
pub mod handlers;

/// Reconnect backoff.
pub mod policy;

/// Status, notices and events.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use config::{ClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL};
pub use core::LiveUpdateClient;
pub use handlers::{EventHandler, NoticeHandler};
pub use policy::ReconnectPolicy;
pub use state::{ConnectionState, LiveEvent, Notice};
