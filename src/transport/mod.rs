//! WebSocket transport layer.
//!
//! This module owns the socket side of the live-update feed: opening the
//! connection, subscribing, heartbeats, and reporting lifecycle events back
//! to the client.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                          ┌─────────────────┐
//! │  LiveUpdateClient    │                          │  Backend        │
//! │                      │        WebSocket         │  live-update    │
//! │  Session             │◄────────────────────────►│  endpoint       │
//! │  → Connection (gen N)│     ws(s)://host/...     │                 │
//! └──────────────────────┘                          └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::open` - Spawn the task for generation N
//! 2. Handshake, then `LinkEvents::on_open`
//! 3. Subscribe, then read frames and send heartbeats
//! 4. Remote close or failure → `LinkEvents::on_close`
//! 5. `Connection::close` or drop → close frame, no callback
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection task and event loop |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{
    CLOSE_ABNORMAL, CLOSE_NO_STATUS, CLOSE_NORMAL, Connection, LinkEvents, LinkSettings,
};
