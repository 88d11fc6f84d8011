//! User-facing notifications raised by the feed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// How a notification should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Destructive,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notification {
    /// Creates a notification.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
        }
    }

    /// Destructive notification titled "Error".
    pub fn error(description: impl Into<String>) -> Self {
        Self::new("Error", description, Severity::Destructive)
    }

    /// The change feed could not be joined or reported an error.
    pub fn connection_error() -> Self {
        Self::new(
            "Connection Error",
            "Failed to connect to real-time updates",
            Severity::Destructive,
        )
    }

    pub fn is_destructive(&self) -> bool {
        self.severity == Severity::Destructive
    }
}

/// Receives notifications raised by the feed.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that logs every notification and keeps the most recent ones.
#[derive(Clone)]
pub struct NotificationLog {
    entries: Arc<Mutex<VecDeque<Notification>>>,
    capacity: usize,
}

impl NotificationLog {
    pub const DEFAULT_CAPACITY: usize = 50;

    /// Creates a log keeping the last [`DEFAULT_CAPACITY`](Self::DEFAULT_CAPACITY) entries.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a log keeping the last `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the retained notifications, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.entries().iter().cloned().collect()
    }

    /// Returns the number of retained notifications.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drops every retained notification.
    pub fn clear(&self) {
        self.entries().clear();
    }
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Destructive => tracing::warn!(
                title = %notification.title,
                description = %notification.description,
                "notification"
            ),
            Severity::Normal => tracing::info!(
                title = %notification.title,
                description = %notification.description,
                "notification"
            ),
        }

        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_destructive() {
        let n = Notification::error("Failed to fetch pending orders");
        assert_eq!(n.title, "Error");
        assert!(n.is_destructive());
    }

    #[test]
    fn test_connection_error_is_distinct() {
        let n = Notification::connection_error();
        assert_eq!(n.title, "Connection Error");
        assert_ne!(n, Notification::error("Failed to connect to real-time updates"));
    }

    #[test]
    fn test_log_records_in_order() {
        let log = NotificationLog::new();
        log.notify(Notification::error("first"));
        log.notify(Notification::new("Info", "second", Severity::Normal));

        let all = log.notifications();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].description, "first");
        assert_eq!(all[1].severity, Severity::Normal);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_log_drops_oldest_past_capacity() {
        let log = NotificationLog::with_capacity(2);
        for i in 0..3 {
            log.notify(Notification::error(format!("n{i}")));
        }
        let descriptions: Vec<_> = log
            .notifications()
            .into_iter()
            .map(|n| n.description)
            .collect();
        assert_eq!(descriptions, vec!["n1", "n2"]);
    }

    #[test]
    fn test_clones_share_entries() {
        let log = NotificationLog::new();
        let handle = log.clone();
        log.notify(Notification::connection_error());
        assert_eq!(handle.len(), 1);
    }
}
