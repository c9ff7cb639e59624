//! WebSocket connection task.
//!
//! Each [`Connection`] owns one spawned tokio task that opens the socket,
//! subscribes, sends heartbeats and forwards inbound frames to
//! [`LinkEvents`]. All socket callbacks of one connection run on that task,
//! so frames are delivered in transport order and one at a time.
//!
//! # Event Loop
//!
//! ```text
//! connect_async ──► on_open ──► subscribe ──► loop {
//!                                              inbound frame  → on_text
//!                                              heartbeat tick → ping
//!                                              Close command  → close frame, exit quietly
//!                                            }
//!                                            exit by remote / error → on_error?, on_close
//! ```
//!
//! The heartbeat interval is a local of the loop, so it stops on the same
//! poll that observes the close or error.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::Channel;
use crate::protocol::OutboundMessage;

// ============================================================================
// Constants
// ============================================================================

/// Close code for caller-initiated closes.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code reported for a close frame without a status.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Close code reported when the socket went away without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = futures_util::stream::SplitSink<WsStream, Message>;

// ============================================================================
// LinkEvents
// ============================================================================

/// Callbacks from a connection task.
///
/// Every callback carries the generation the connection was opened with.
/// Implementors ignore callbacks from superseded generations.
pub trait LinkEvents: Send + Sync + 'static {
    /// Socket opened. Return `false` to drop the connection without
    /// subscribing (the generation is stale).
    fn on_open(&self, generation: u64) -> bool;

    /// Text frame received.
    fn on_text(&self, generation: u64, text: &str);

    /// Transport error. Always followed by [`LinkEvents::on_close`].
    fn on_error(&self, generation: u64, error: &Error);

    /// Socket closed by the remote end or by a failure.
    ///
    /// Not called after a caller-initiated close.
    fn on_close(&self, generation: u64, code: u16, reason: &str);
}

// ============================================================================
// LinkSettings
// ============================================================================

/// Per-connection settings.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    /// Endpoint URL.
    pub url: String,
    /// Interval between `ping` heartbeats.
    pub heartbeat_interval: Duration,
    /// Handshake timeout.
    pub connect_timeout: Duration,
    /// Channel to subscribe to after open.
    pub channel: Channel,
}

// ============================================================================
// LinkCommand
// ============================================================================

/// Commands from the owning client to the task.
enum LinkCommand {
    /// Close with the given code and reason.
    Close { code: u16, reason: String },
}

/// How the event loop ended.
enum LinkExit {
    /// Caller closed or superseded the connection.
    Local,
    /// Remote closed, or the stream ended.
    Remote { code: u16, reason: String },
    /// Read or write failed.
    Failed(Error),
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to one WebSocket connection task.
///
/// Dropping the handle closes the socket without reporting
/// [`LinkEvents::on_close`].
pub struct Connection {
    /// Generation this connection was opened with.
    generation: u64,
    /// Channel for sending commands to the task.
    command_tx: mpsc::UnboundedSender<LinkCommand>,
    /// The connection task.
    task: JoinHandle<()>,
}

impl Connection {
    /// Spawns a connection task.
    ///
    /// Must be called within a tokio runtime.
    pub fn open(settings: LinkSettings, events: Arc<dyn LinkEvents>, generation: u64) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_link(settings, events, generation, command_rx));

        Self {
            generation,
            command_tx,
            task,
        }
    }

    /// Generation this connection was opened with.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` once the task has exited.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Closes the socket with `code` and `reason`.
    ///
    /// Consumes the handle; the task sends the close frame and exits
    /// without reporting a close.
    pub fn close(self, code: u16, reason: impl Into<String>) {
        let _ = self.command_tx.send(LinkCommand::Close {
            code,
            reason: reason.into(),
        });
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Connection task body.
async fn run_link(
    settings: LinkSettings,
    events: Arc<dyn LinkEvents>,
    generation: u64,
    mut command_rx: mpsc::UnboundedReceiver<LinkCommand>,
) {
    // interval_at panics on a zero period
    if settings.heartbeat_interval.is_zero() {
        let err = Error::config("Heartbeat interval must be greater than zero");
        report_failure(&*events, generation, err);
        return;
    }

    let handshake = timeout(settings.connect_timeout, connect_async(settings.url.as_str()));

    let ws_stream = tokio::select! {
        result = handshake => match result {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                report_failure(&*events, generation, handshake_error(e));
                return;
            }
            Err(_) => {
                let err = Error::connection_timeout(settings.connect_timeout.as_millis() as u64);
                report_failure(&*events, generation, err);
                return;
            }
        },

        _ = command_rx.recv() => {
            debug!(generation, "Connection cancelled during handshake");
            return;
        }
    };

    if !events.on_open(generation) {
        debug!(generation, "Stale connection opened, dropping");
        let (mut ws_write, _) = ws_stream.split();
        let _ = ws_write.close().await;
        return;
    }

    let (mut ws_write, mut ws_read) = ws_stream.split();

    if let Err(e) = send_message(&mut ws_write, &OutboundMessage::subscribe(settings.channel)).await
    {
        report_failure(&*events, generation, e);
        return;
    }

    let period = settings.heartbeat_interval;
    let mut heartbeat = interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit = loop {
        tokio::select! {
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        events.on_text(generation, text.as_str());
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                            .unwrap_or((CLOSE_NO_STATUS, String::new()));
                        debug!(generation, code, %reason, "WebSocket closed by remote");
                        let _ = ws_write.close().await;
                        break LinkExit::Remote { code, reason };
                    }

                    Some(Err(e)) => {
                        break LinkExit::Failed(Error::WebSocket(e));
                    }

                    None => {
                        break LinkExit::Remote {
                            code: CLOSE_ABNORMAL,
                            reason: "stream ended".to_owned(),
                        };
                    }

                    // Protocol-level ping/pong is answered by tungstenite
                    Some(Ok(_)) => {}
                }
            }

            _ = heartbeat.tick() => {
                if let Err(e) = send_message(&mut ws_write, &OutboundMessage::Ping).await {
                    break LinkExit::Failed(e);
                }
                trace!(generation, "Heartbeat sent");
            }

            command = command_rx.recv() => {
                let (code, reason) = match command {
                    Some(LinkCommand::Close { code, reason }) => (code, reason),
                    None => (CLOSE_NORMAL, "superseded".to_owned()),
                };
                let frame = CloseFrame {
                    code: CloseCode::from(code),
                    reason: reason.into(),
                };
                if let Err(e) = ws_write.send(Message::Close(Some(frame))).await {
                    debug!(generation, error = %e, "Close frame not delivered");
                }
                break LinkExit::Local;
            }
        }
    };

    match exit {
        LinkExit::Local => debug!(generation, "Connection closed locally"),
        LinkExit::Remote { code, reason } => events.on_close(generation, code, &reason),
        LinkExit::Failed(err) => report_failure(&*events, generation, err),
    }
}

/// Reports an error followed by an abnormal close.
fn report_failure(events: &dyn LinkEvents, generation: u64, err: Error) {
    warn!(generation, error = %err, "WebSocket failure");
    events.on_error(generation, &err);
    events.on_close(generation, CLOSE_ABNORMAL, &err.to_string());
}

/// Classifies a failed handshake.
fn handshake_error(err: WsError) -> Error {
    match err {
        WsError::Io(e) => Error::Io(e),
        WsError::Http(response) => {
            Error::connection(format!("handshake rejected with HTTP {}", response.status()))
        }
        other => Error::WebSocket(other),
    }
}

/// Serializes and sends one outbound message.
async fn send_message(ws_write: &mut WsSink, message: &OutboundMessage) -> Result<()> {
    let json = message.to_json()?;
    ws_write.send(Message::Text(json.into())).await?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
