//! # Signal Bus
//!
//! Page-wide logout signal. Any surface can ask for logout by emitting a
//! [`LogoutSignal`] without holding a reference to the session manager.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Request to end the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutSignal {
    /// Optional human-readable reason, for logs.
    #[serde(default)]
    pub message: Option<String>,
}

impl LogoutSignal {
    /// A signal carrying a reason.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

/// Callback invoked for every emitted signal.
pub type SignalHandler = Arc<dyn Fn(&LogoutSignal) + Send + Sync>;

/// Handle returned by [`SignalBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Channel carrying the logout signal.
pub trait SignalBus: Send + Sync {
    /// Registers a listener.
    fn subscribe(&self, handler: SignalHandler) -> SubscriptionId;

    /// Removes a listener. Returns whether it was registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Delivers `signal` to every listener; returns how many were called.
    fn emit(&self, signal: &LogoutSignal) -> usize;
}

/// In-process [`SignalBus`] with synchronous dispatch.
///
/// Listeners run on the emitting thread, in subscription order, outside
/// the internal lock, so a listener may itself subscribe or emit.
#[derive(Default)]
pub struct LocalSignalBus {
    listeners: RwLock<Vec<(SubscriptionId, SignalHandler)>>,
    next_id: AtomicU64,
}

impl LocalSignalBus {
    /// Creates a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl SignalBus for LocalSignalBus {
    fn subscribe(&self, handler: SignalHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, handler));
        tracing::debug!(?id, "Logout listener subscribed");
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        before != listeners.len()
    }

    fn emit(&self, signal: &LogoutSignal) -> usize {
        let handlers: Vec<SignalHandler> = self
            .listeners
            .read()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        tracing::debug!(
            listeners = handlers.len(),
            reason = signal.message.as_deref().unwrap_or_default(),
            "Emitting logout signal"
        );

        for handler in &handlers {
            handler(signal);
        }
        handlers.len()
    }
}
