//! Live-update client.
//!
//! [`LiveUpdateClient`] owns one logical stream to the backend feed. It
//! reconnects with backoff whenever the socket goes away for any reason
//! other than a caller-initiated [`LiveUpdateClient::close`], and hands
//! parsed messages to registered handlers.
//!
//! # Example
//!
//! ```no_run
//! use apitest_dashboard::{ConnectionState, LiveUpdateClient};
//!
//! # async fn example() -> apitest_dashboard::Result<()> {
//! let client = LiveUpdateClient::builder()
//!     .url("ws://localhost:5000")
//!     .build()?;
//!
//! client.on_metrics(|snapshot| println!("pass rate: {:?}", snapshot.pass_rate));
//! client.on_repository_update(|_| println!("repositories changed"));
//!
//! client.connect();
//! client
//!     .wait_for_state(ConnectionState::Connected, std::time::Duration::from_secs(10))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Generations
//!
//! Every [`LiveUpdateClient::connect`] and [`LiveUpdateClient::close`]
//! starts a new generation. Socket callbacks and reconnect timers carry the
//! generation they were created for and are ignored once it is superseded,
//! so at most one socket and one reconnect timer are ever live.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::SubscriptionId;
use crate::protocol::{InboundMessage, MessageKind, MetricsSnapshot};
use crate::transport::{CLOSE_NORMAL, Connection, LinkEvents};

use super::builder::ClientBuilder;
use super::config::ClientConfig;
use super::handlers::Handlers;
use super::state::{ConnectionState, LiveEvent, Notice};

// ============================================================================
// Types
// ============================================================================

/// Mutable connection bookkeeping, guarded by one lock.
#[derive(Default)]
struct Session {
    /// Current generation; bumped by every connect and close.
    generation: u64,
    /// Reconnect attempts since the last successful open.
    attempt: u32,
    /// Delay used for the most recently scheduled reconnect.
    last_delay: Option<Duration>,
    /// Live socket, if any.
    link: Option<Connection>,
    /// Pending reconnect timer, if any.
    reconnect: Option<JoinHandle<()>>,
}

/// Internal shared state for the client.
pub(crate) struct ClientInner {
    /// Validated configuration.
    config: ClientConfig,
    /// Connection status broadcast.
    state_tx: watch::Sender<ConnectionState>,
    /// Connection bookkeeping.
    session: Mutex<Session>,
    /// Merged metrics from the feed.
    metrics: Mutex<MetricsSnapshot>,
    /// Registered handlers.
    handlers: Handlers,
}

/// Bridge from the connection task back to the client.
///
/// Holds a weak reference so a running socket never keeps a dropped client
/// alive.
struct ClientLink {
    client: Weak<ClientInner>,
}

/// Non-owning handle to a [`LiveUpdateClient`].
#[derive(Clone)]
pub(crate) struct WeakClient(Weak<ClientInner>);

impl WeakClient {
    /// Returns the client if any strong handle is still alive.
    pub(crate) fn upgrade(&self) -> Option<LiveUpdateClient> {
        self.0.upgrade().map(|inner| LiveUpdateClient { inner })
    }
}

// ============================================================================
// LiveUpdateClient
// ============================================================================

/// Reconnecting live-update client.
///
/// Cloning is cheap; all clones drive the same connection. Dropping the
/// last clone closes the socket and cancels any pending reconnect.
#[derive(Clone)]
pub struct LiveUpdateClient {
    /// Shared inner state.
    pub(crate) inner: Arc<ClientInner>,
}

// ============================================================================
// LiveUpdateClient - Display
// ============================================================================

impl fmt::Debug for LiveUpdateClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveUpdateClient")
            .field("url", &self.inner.config.url.as_str())
            .field("state", &self.state())
            .field("reconnect_attempts", &self.reconnect_attempts())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// LiveUpdateClient - Lifecycle
// ============================================================================

impl LiveUpdateClient {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client from a configuration validated by
    /// [`ClientBuilder::into_config`].
    ///
    /// The client starts in [`ConnectionState::Connecting`] without a
    /// socket; call [`LiveUpdateClient::connect`] to open one.
    #[must_use]
    pub(crate) fn new(config: ClientConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::default());

        Self {
            inner: Arc::new(ClientInner {
                config,
                state_tx,
                session: Mutex::new(Session::default()),
                metrics: Mutex::new(MetricsSnapshot::default()),
                handlers: Handlers::default(),
            }),
        }
    }

    /// Opens a new connection, closing any previous one first.
    ///
    /// Cancels a pending reconnect timer. Must be called within a tokio
    /// runtime.
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Closes the connection with a normal-closure code.
    ///
    /// No reconnect is scheduled afterwards.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Reconnects now, skipping any scheduled backoff delay.
    pub fn manual_reconnect(&self) {
        info!("Manual reconnect requested");
        self.inner.connect();
    }
}

// ============================================================================
// LiveUpdateClient - Status
// ============================================================================

impl LiveUpdateClient {
    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the current connection status.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Returns a receiver that observes every status change.
    #[inline]
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Waits until the status equals `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if `target` is not reached within `wait`.
    pub async fn wait_for_state(&self, target: ConnectionState, wait: Duration) -> Result<()> {
        let mut rx = self.watch_state();

        timeout(wait, async move {
            rx.wait_for(|state| *state == target).await.map(|_| ())
        })
        .await
        .map_err(|_| Error::timeout(format!("waiting for {target}"), wait.as_millis() as u64))?
        .map_err(|_| Error::ConnectionClosed)
    }

    /// Returns the metrics merged from every `metrics` message so far.
    #[inline]
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.lock().clone()
    }

    /// Reconnect attempts since the last successful open.
    #[inline]
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.session.lock().attempt
    }

    /// Delay of the most recently scheduled reconnect.
    ///
    /// Cleared by a successful open.
    #[inline]
    #[must_use]
    pub fn last_reconnect_delay(&self) -> Option<Duration> {
        self.inner.session.lock().last_delay
    }

    /// Returns `true` while a reconnect timer is pending.
    #[inline]
    #[must_use]
    pub fn has_pending_reconnect(&self) -> bool {
        self.inner
            .session
            .lock()
            .reconnect
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

// ============================================================================
// LiveUpdateClient - Handlers
// ============================================================================

impl LiveUpdateClient {
    /// Registers a handler for every event of `kind`.
    pub fn on<F>(&self, kind: MessageKind, handler: F) -> SubscriptionId
    where
        F: Fn(&LiveEvent) + Send + Sync + 'static,
    {
        self.inner.handlers.add_event(kind, Arc::new(handler))
    }

    /// Registers a handler receiving the merged snapshot after each
    /// `metrics` message.
    pub fn on_metrics<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&MetricsSnapshot) + Send + Sync + 'static,
    {
        self.on(MessageKind::Metrics, move |event| {
            if let LiveEvent::Metrics { snapshot, .. } = event {
                handler(snapshot);
            }
        })
    }

    /// Registers a handler for `testResult` messages.
    pub fn on_test_result<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        self.on(MessageKind::TestResult, move |event| {
            if let LiveEvent::TestResult(data) = event {
                handler(data.as_ref());
            }
        })
    }

    /// Registers a handler for `repositoryUpdate` messages.
    pub fn on_repository_update<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        self.on(MessageKind::RepositoryUpdate, move |event| {
            if let LiveEvent::RepositoryUpdate(data) = event {
                handler(data.as_ref());
            }
        })
    }

    /// Registers a handler for advisory notices.
    pub fn on_notice<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Notice) + Send + Sync + 'static,
    {
        self.inner.handlers.add_notice(Arc::new(handler))
    }

    /// Unregisters a handler. Returns `true` if it was registered.
    pub fn remove_handler(&self, id: SubscriptionId) -> bool {
        self.inner.handlers.remove(id)
    }

    /// Returns a handle that does not keep the client alive.
    pub(crate) fn downgrade(&self) -> WeakClient {
        WeakClient(Arc::downgrade(&self.inner))
    }

    /// Number of event handlers registered for `kind`.
    #[cfg(test)]
    pub(crate) fn handler_count(&self, kind: MessageKind) -> usize {
        self.inner.handlers.count(kind)
    }

    /// Number of registered notice handlers.
    #[cfg(test)]
    pub(crate) fn notice_handler_count(&self) -> usize {
        self.inner.handlers.notice_count()
    }
}

// ============================================================================
// ClientInner - Lifecycle
// ============================================================================

impl ClientInner {
    /// Opens a new connection under the session lock.
    fn connect(self: &Arc<Self>) {
        let mut session = self.session.lock();
        self.open_locked(&mut session);
    }

    /// Supersedes any live socket and timer, then spawns a new connection.
    fn open_locked(self: &Arc<Self>, session: &mut Session) {
        if let Some(timer) = session.reconnect.take() {
            timer.abort();
        }

        if let Some(previous) = session.link.take() {
            debug!(
                generation = previous.generation(),
                "Closing superseded connection"
            );
            previous.close(CLOSE_NORMAL, "Superseded by new connection");
        }

        session.generation += 1;
        let generation = session.generation;
        self.set_state(ConnectionState::Connecting);

        let events: Arc<dyn LinkEvents> = Arc::new(ClientLink {
            client: Arc::downgrade(self),
        });
        session.link = Some(Connection::open(
            self.config.link_settings(),
            events,
            generation,
        ));

        info!(generation, url = %self.config.url, "Connecting to live-update feed");
    }

    /// Caller-initiated teardown.
    fn close(&self) {
        let mut session = self.session.lock();
        session.generation += 1;

        if let Some(timer) = session.reconnect.take() {
            timer.abort();
        }

        if let Some(link) = session.link.take() {
            link.close(CLOSE_NORMAL, "Client closed");
        }

        self.set_state(ConnectionState::Disconnected);
        info!(generation = session.generation, "Live-update client closed");
    }

    /// Timer callback: reconnect unless superseded meanwhile.
    fn fire_reconnect(self: &Arc<Self>, scheduled_for: u64) {
        let mut session = self.session.lock();

        if session.generation != scheduled_for {
            trace!(scheduled_for, "Stale reconnect timer ignored");
            return;
        }

        // The running timer is this call; release it without aborting
        session.reconnect = None;
        self.open_locked(&mut session);
    }

    /// Arms the single reconnect timer.
    fn schedule_locked(self: &Arc<Self>, session: &mut Session, delay: Duration) {
        if let Some(previous) = session.reconnect.take() {
            previous.abort();
        }

        let client = Arc::downgrade(self);
        let generation = session.generation;

        session.reconnect = Some(tokio::spawn(async move {
            sleep(delay).await;
            if let Some(inner) = client.upgrade() {
                inner.fire_reconnect(generation);
            }
        }));
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Connection state changed");
        }
    }
}

// ============================================================================
// ClientInner - Socket Callbacks
// ============================================================================

impl ClientInner {
    fn handle_open(&self, generation: u64) -> bool {
        let mut session = self.session.lock();

        if session.generation != generation {
            return false;
        }

        session.attempt = 0;
        session.last_delay = None;
        self.set_state(ConnectionState::Connected);
        info!(generation, "Live-update feed connected");
        true
    }

    fn handle_text(&self, generation: u64, text: &str) {
        let message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Error parsing live-update message, dropped");
                return;
            }
        };

        let event = {
            let session = self.session.lock();

            if session.generation != generation {
                trace!(generation, "Message from superseded connection ignored");
                return;
            }

            match message {
                InboundMessage::Metrics(update) => {
                    let mut metrics = self.metrics.lock();
                    metrics.merge(update.clone());
                    LiveEvent::Metrics {
                        update,
                        snapshot: metrics.clone(),
                    }
                }
                InboundMessage::TestResult(data) => LiveEvent::TestResult(data),
                InboundMessage::RepositoryUpdate(data) => LiveEvent::RepositoryUpdate(data),
                InboundMessage::Ping | InboundMessage::Pong => {
                    trace!(generation, "Keep-alive received");
                    return;
                }
                InboundMessage::Unknown { kind } => {
                    warn!(kind = %kind, "Unknown message type");
                    return;
                }
            }
        };

        trace!(generation, kind = %event.kind(), "Dispatching live event");
        self.handlers.dispatch(&event);
    }

    fn handle_error(&self, generation: u64, err: &Error) {
        if self.session.lock().generation != generation {
            return;
        }

        error!(generation, error = %err, "Live-update connection error");
        self.handlers.notify(&Notice::degraded());
    }

    fn handle_close(self: &Arc<Self>, generation: u64, code: u16, reason: &str) {
        let notice = {
            let mut session = self.session.lock();

            if session.generation != generation {
                trace!(generation, code, "Close from superseded connection ignored");
                return;
            }

            session.link = None;
            self.set_state(ConnectionState::Disconnected);

            let attempt = session.attempt;
            if self.config.reconnect.allows(attempt) {
                let delay = self.config.reconnect.delay(attempt);
                session.attempt = attempt.saturating_add(1);
                session.last_delay = Some(delay);
                self.schedule_locked(&mut session, delay);

                info!(
                    code,
                    reason,
                    attempt = session.attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Live-update feed disconnected, reconnect scheduled"
                );
                None
            } else {
                warn!(code, reason, attempts = attempt, "Reconnect attempts exhausted");
                Some(Notice::GaveUp { attempts: attempt })
            }
        };

        if let Some(notice) = notice {
            self.handlers.notify(&notice);
        }
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        let session = self.session.get_mut();

        if let Some(timer) = session.reconnect.take() {
            timer.abort();
        }

        if let Some(link) = session.link.take() {
            link.close(CLOSE_NORMAL, "Client dropped");
        }
    }
}

// ============================================================================
// ClientLink
// ============================================================================

impl LinkEvents for ClientLink {
    fn on_open(&self, generation: u64) -> bool {
        self.client
            .upgrade()
            .is_some_and(|client| client.handle_open(generation))
    }

    fn on_text(&self, generation: u64, text: &str) {
        if let Some(client) = self.client.upgrade() {
            client.handle_text(generation, text);
        }
    }

    fn on_error(&self, generation: u64, error: &Error) {
        if let Some(client) = self.client.upgrade() {
            client.handle_error(generation, error);
        }
    }

    fn on_close(&self, generation: u64, code: u16, reason: &str) {
        if let Some(client) = self.client.upgrade() {
            client.handle_close(generation, code, reason);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
