//! Newest-first notification feed.

use notification_broker::NotificationEvent;
use std::collections::VecDeque;

use crate::notification::Notification;

/// One entry of the session's feed
#[derive(Debug, Clone)]
pub enum FeedEntry {
    /// A payload in the backend's notification shape
    Notification(Notification),
    /// Anything else the channel delivered, kept verbatim
    Raw(NotificationEvent),
}

impl FeedEntry {
    /// Classify an event. Payloads without a `"type"` field, or that do not
    /// decode, are kept as [`FeedEntry::Raw`].
    pub fn from_event(event: &NotificationEvent) -> Self {
        if event.kind().is_none() {
            return FeedEntry::Raw(event.clone());
        }

        match event.decode::<Notification>() {
            Ok(notification) => FeedEntry::Notification(notification),
            Err(e) => {
                tracing::debug!(
                    sequence = event.sequence(),
                    error = %e,
                    "Keeping undecodable notification as raw entry"
                );
                FeedEntry::Raw(event.clone())
            }
        }
    }

    pub fn as_notification(&self) -> Option<&Notification> {
        match self {
            FeedEntry::Notification(notification) => Some(notification),
            FeedEntry::Raw(_) => None,
        }
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            FeedEntry::Notification(notification) => Some(&notification.kind),
            FeedEntry::Raw(event) => event.kind(),
        }
    }
}

/// Bounded feed, newest entry first
#[derive(Debug)]
pub(crate) struct NotificationFeed {
    entries: VecDeque<FeedEntry>,
    capacity: usize,
}

impl NotificationFeed {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, entry: FeedEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub(crate) fn snapshot(&self) -> Vec<FeedEntry> {
        self.entries.iter().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
