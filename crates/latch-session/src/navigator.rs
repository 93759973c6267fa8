//! # Navigation
//!
//! Host hook for moving the UI to a route after logout.

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Moves the host UI to a route.
pub trait Navigator: Send + Sync {
    /// Navigates to `route`.
    fn navigate(&self, route: &str);
}

/// [`Navigator`] for headless hosts; it only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: &str) {
        tracing::info!(route, "Navigating");
    }
}

/// [`Navigator`] that records routes and lets async code wait for them.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
    notify: Notify,
}

impl RecordingNavigator {
    /// Creates a navigator with no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes navigated to so far, oldest first.
    #[must_use]
    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().clone()
    }

    /// Number of navigations so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.routes.lock().len()
    }

    /// Waits until at least `count` navigations have happened.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.count() >= count {
                return;
            }
            notified.await;
        }
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes.lock().push(route.to_string());
        self.notify.notify_waiters();
    }
}
