//! Handler registry.
//!
//! Handlers are keyed by [`MessageKind`] and invoked in registration order.
//! The registry lock is released before any handler runs, so handlers may
//! register or remove handlers and call back into the client.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::identifiers::SubscriptionId;
use crate::protocol::MessageKind;

use super::state::{LiveEvent, Notice};

// ============================================================================
// Types
// ============================================================================

/// Callback for one inbound message category.
pub type EventHandler = Arc<dyn Fn(&LiveEvent) + Send + Sync>;

/// Callback for advisory notices.
pub type NoticeHandler = Arc<dyn Fn(&Notice) + Send + Sync>;

// ============================================================================
// Handlers
// ============================================================================

/// Registered event and notice handlers.
#[derive(Default)]
pub(crate) struct Handlers {
    events: RwLock<FxHashMap<MessageKind, Vec<(SubscriptionId, EventHandler)>>>,
    notices: RwLock<Vec<(SubscriptionId, NoticeHandler)>>,
}

impl Handlers {
    /// Registers an event handler for `kind`.
    pub(crate) fn add_event(&self, kind: MessageKind, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId::generate();
        self.events
            .write()
            .entry(kind)
            .or_default()
            .push((id, handler));
        trace!(%id, %kind, "Event handler registered");
        id
    }

    /// Registers a notice handler.
    pub(crate) fn add_notice(&self, handler: NoticeHandler) -> SubscriptionId {
        let id = SubscriptionId::generate();
        self.notices.write().push((id, handler));
        id
    }

    /// Removes a handler of either kind. Returns `true` if one was removed.
    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut removed = false;

        for handlers in self.events.write().values_mut() {
            let before = handlers.len();
            handlers.retain(|(existing, _)| *existing != id);
            removed |= handlers.len() != before;
        }

        let mut notices = self.notices.write();
        let before = notices.len();
        notices.retain(|(existing, _)| *existing != id);
        removed | (notices.len() != before)
    }

    /// Number of registered handlers for `kind`.
    #[cfg(test)]
    pub(crate) fn count(&self, kind: MessageKind) -> usize {
        self.events.read().get(&kind).map_or(0, Vec::len)
    }

    /// Number of registered notice handlers.
    #[cfg(test)]
    pub(crate) fn notice_count(&self) -> usize {
        self.notices.read().len()
    }

    /// Invokes every handler registered for the event's kind.
    pub(crate) fn dispatch(&self, event: &LiveEvent) {
        let handlers: Vec<EventHandler> = self
            .events
            .read()
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        for handler in handlers {
            handler(event);
        }
    }

    /// Invokes every notice handler.
    pub(crate) fn notify(&self, notice: &Notice) {
        let handlers: Vec<NoticeHandler> = self
            .notices
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        for handler in handlers {
            handler(notice);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
