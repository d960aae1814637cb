//! Navigation and notification ports.
//!
//! The client never drives a screen directly. Forced navigation (sign-in after
//! a failed refresh, policy redirects) and user-visible notices go through
//! these traits so the front end decides what "navigate" means and tests can
//! record the calls.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// Moves the user to another screen.
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, url: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Shows a notice (toast, alert, terminal line) to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Runs navigations now or after a delay, keeping track of the delayed ones.
pub struct NavigationScheduler {
    navigator: Arc<dyn Navigator>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl NavigationScheduler {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self {
            navigator,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn navigate_now(&self, url: &str) {
        debug!(url, "Navigating");
        self.navigator.navigate_to(url);
    }

    /// Navigate to `url` once `delay` has passed. Must be called from within
    /// a tokio runtime.
    pub fn schedule(&self, url: String, delay: Duration) {
        debug!(url = %url, delay_ms = delay.as_millis() as u64, "Scheduling navigation");
        let navigator = Arc::clone(&self.navigator);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            navigator.navigate_to(&url);
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait until every scheduled navigation has run
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}

/// Navigator that remembers every target, in order.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to(&self, url: &str) {
        self.visited
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.to_string());
    }
}

/// Notifier that remembers every notice, in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_navigation_waits_for_delay() {
        let navigator = Arc::new(RecordingNavigator::new());
        let scheduler = NavigationScheduler::new(navigator.clone());

        scheduler.schedule("/auth/forgot-password?x=1".into(), Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(navigator.visited().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(navigator.visited(), vec!["/auth/forgot-password?x=1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_runs_pending_navigations() {
        let navigator = Arc::new(RecordingNavigator::new());
        let scheduler = NavigationScheduler::new(navigator.clone());

        scheduler.schedule("/a".into(), Duration::from_secs(5));
        scheduler.schedule("/b".into(), Duration::from_secs(1));
        scheduler.flush().await;

        assert_eq!(navigator.visited(), vec!["/b", "/a"]);
    }

    #[test]
    fn test_navigate_now_is_synchronous() {
        let navigator = Arc::new(RecordingNavigator::new());
        let scheduler = NavigationScheduler::new(navigator.clone());
        scheduler.navigate_now("/auth/signin");
        assert_eq!(navigator.visited(), vec!["/auth/signin"]);
    }
}
