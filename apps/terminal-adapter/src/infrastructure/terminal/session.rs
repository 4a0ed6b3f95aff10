//! Bookkeeping for the adapter's one live session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::application::ports::{QuoteSession, SubscriptionId};
use crate::domain::account::SessionId;

/// State shared between the adapter and the disconnect handler it registers.
#[derive(Debug, Default)]
pub(super) struct SessionFlags {
    subscription: Mutex<Option<SubscriptionId>>,
    disconnected: AtomicBool,
    established: AtomicBool,
}

impl SessionFlags {
    /// Record the subscription id once the client hands it back.
    ///
    /// If the session already dropped in between, the handler found no id
    /// to remove, so release it here instead.
    pub(super) fn store_subscription(&self, id: SubscriptionId, handle: &dyn QuoteSession) {
        *self.subscription.lock() = Some(id);
        if self.is_disconnected() {
            self.release(handle);
        }
    }

    /// Remove the disconnect subscription, if still registered.
    pub(super) fn release(&self, handle: &dyn QuoteSession) {
        let id = self.subscription.lock().take();
        if let Some(id) = id {
            handle.unsubscribe_disconnect(id);
        }
    }

    /// Mark the session as dropped. Returns `true` only for the first caller.
    pub(super) fn mark_disconnected(&self) -> bool {
        !self.disconnected.swap(true, Ordering::SeqCst)
    }

    pub(super) fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub(super) fn is_subscribed(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Remember that the handshake completed at some point.
    pub(super) fn mark_established(&self) {
        self.established.store(true, Ordering::SeqCst);
    }

    /// Whether the session was ever seen connected. A session that was and
    /// no longer is has dropped, even if no disconnect signal arrived.
    pub(super) fn was_established(&self) -> bool {
        self.established.load(Ordering::SeqCst)
    }
}

/// A session owned by the adapter.
#[derive(Clone)]
pub(super) struct ActiveSession {
    pub(super) id: SessionId,
    pub(super) handle: Arc<dyn QuoteSession>,
    pub(super) flags: Arc<SessionFlags>,
}

impl ActiveSession {
    /// Whether the remote reports the session up. Records the handshake as
    /// established when it does.
    pub(super) fn observe_connected(&self) -> bool {
        let up = self.handle.is_connected();
        if up {
            self.flags.mark_established();
        }
        up
    }

    /// Unsubscribe, then close.
    pub(super) fn close_quietly(&self) {
        self.flags.release(self.handle.as_ref());
        self.handle.disconnect();
    }
}
