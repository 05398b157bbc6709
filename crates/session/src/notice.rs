//! User-facing notifications (toasts) emitted by session operations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A transient notification for the UI to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: Uuid,
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Fan-out of notices to every subscribed view.
///
/// A view that falls more than `capacity` notices behind misses the oldest
/// ones.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(NoticeLevel::Success, message.into());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(NoticeLevel::Info, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(NoticeLevel::Error, message.into());
    }

    fn emit(&self, level: NoticeLevel, message: String) {
        let notice = Notice {
            id: Uuid::now_v7(),
            level,
            message,
            at: Utc::now(),
        };
        // No subscribers is fine: nobody is rendering toasts.
        let _ = self.tx.send(notice);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_notices_in_order() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();

        notifier.success("Login successful");
        notifier.error("Login failed");

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first.level, first.message.as_str()), (NoticeLevel::Success, "Login successful"));
        assert_eq!((second.level, second.message.as_str()), (NoticeLevel::Error, "Login failed"));
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn emitting_without_subscribers_is_harmless() {
        Notifier::new(4).info("nobody listening");
    }
}
