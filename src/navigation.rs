//! Seams to the host view layer: redirects and toast notifications.
//!
//! The crate never renders; it tells the host where to go and what to show.

use std::sync::Mutex;

use serde::Serialize;

/// A redirect instruction, carrying the location the user originally asked
/// for so the login view can send them back afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub to: String,
    pub from: Option<String>,
}

impl Redirect {
    pub fn new(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            from: None,
        }
    }

    pub fn returning_to(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

/// Host-side navigation.
pub trait Navigator: Send + Sync {
    fn redirect(&self, redirect: Redirect);
}

/// Severity of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A non-blocking, toast-style user notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Host-side notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);

    fn success(&self, message: &str) {
        self.notify(Notice {
            level: NoticeLevel::Success,
            message: message.to_string(),
        });
    }

    fn error(&self, message: &str) {
        self.notify(Notice {
            level: NoticeLevel::Error,
            message: message.to_string(),
        });
    }
}

/// Navigator that only logs; for headless hosts.
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, redirect: Redirect) {
        tracing::info!(to = %redirect.to, from = ?redirect.from, "Redirect requested");
    }
}

/// Notifier that only logs; for headless hosts.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => tracing::info!(message = %notice.message, "Notice"),
            NoticeLevel::Error => tracing::warn!(message = %notice.message, "Notice"),
        }
    }
}

/// Navigator that records every redirect, for tests.
#[derive(Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<Redirect>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> Vec<Redirect> {
        self.redirects.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Redirect> {
        self.redirects().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, redirect: Redirect) {
        if let Ok(mut redirects) = self.redirects.lock() {
            redirects.push(redirect);
        }
    }
}

/// Notifier that records every notice, for tests.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .map(|n| n.message)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}
