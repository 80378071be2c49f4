//! Operator notices ("toasts") backed by a `tokio::sync::broadcast` channel.
//!
//! Every editor outcome that a person should see is published here. The
//! front end (or the CLI) subscribes and renders them; with no subscriber
//! notices are dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// One message for the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Background outcome (autosave); render unobtrusively.
    pub silent: bool,
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            silent: false,
            timestamp: Utc::now(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out channel for [`Notice`]s.
#[derive(Debug, Clone)]
pub struct NoticeBus {
    sender: broadcast::Sender<Notice>,
}

impl NoticeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, notice: Notice) {
        // Ignore the SendError: it only means nobody is listening.
        let _ = self.sender.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_notice() {
        let bus = NoticeBus::default();
        let mut rx = bus.subscribe();
        bus.publish(Notice::warning("Autosave failed").silent());

        let notice = rx.recv().await.expect("should receive the notice");
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.silent);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        NoticeBus::default().publish(Notice::info("nobody listening"));
    }
}
