//! Terminal rendering of navigations and notices.

use dashgate_core::{Navigator, Notice, NoticeLevel, Notifier};

/// Prints where the dashboard would have navigated, with the command that
/// continues from there.
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate_to(&self, url: &str) {
        match next_step(url) {
            Some(hint) => eprintln!("-> {} ({})", url, hint),
            None => eprintln!("-> {}", url),
        }
    }
}

/// Command that picks up at a dashboard route
fn next_step(url: &str) -> Option<&'static str> {
    let path = url.split('?').next().unwrap_or(url);
    if path.ends_with("/auth/signin") {
        Some("run `dashgate login`")
    } else if path.ends_with("/auth/2fa") {
        Some("run `dashgate verify-2fa --token <token>`")
    } else if path.ends_with("/auth/reset-password") {
        Some("run `dashgate reset-password --email <email>`")
    } else if path.ends_with("/auth/change-password") || path.ends_with("/auth/forgot-password") {
        Some("run `dashgate change-password --token <reset_token>`")
    } else {
        None
    }
}

pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: Notice) {
        let label = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{}] {}", label, notice.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_step() {
        assert_eq!(next_step("/auth/signin"), Some("run `dashgate login`"));
        assert!(next_step("http://localhost:3000/auth/2fa?token=abc")
            .unwrap()
            .contains("verify-2fa"));
        assert!(next_step("/auth/change-password?reset_token=t")
            .unwrap()
            .contains("change-password"));
        assert_eq!(next_step("/dashboard"), None);
    }
}
