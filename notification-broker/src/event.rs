//! The event value handed to listeners.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// One inbound notification, shared read-only by every listener.
///
/// The payload is opaque to the broker. Listeners receive `&NotificationEvent`
/// and the payload sits behind an `Arc`, so nothing a listener does can change
/// what the next listener sees.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    payload: Arc<Value>,
    received_at: DateTime<Utc>,
    sequence: u64,
}

impl NotificationEvent {
    /// Wrap a payload received now.
    pub fn new(payload: Value, sequence: u64) -> Self {
        Self {
            payload: Arc::new(payload),
            received_at: Utc::now(),
            sequence,
        }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// The payload's `"type"` field, if it has one
    pub fn kind(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Position of this event among all events the broker has received
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Deserialize the payload into a typed notification.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.payload.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Like {
        #[serde(rename = "postId")]
        post_id: u64,
    }

    #[test]
    fn test_kind_and_decode() {
        let event = NotificationEvent::new(json!({"type": "like", "postId": 7}), 1);
        assert_eq!(event.kind(), Some("like"));
        assert_eq!(event.sequence(), 1);
        assert_eq!(event.decode::<Like>().unwrap(), Like { post_id: 7 });
    }

    #[test]
    fn test_untyped_payload() {
        let event = NotificationEvent::new(json!("Echo: hi"), 2);
        assert_eq!(event.kind(), None);
        assert_eq!(event.payload(), &json!("Echo: hi"));
        assert!(event.decode::<Like>().is_err());
    }

    #[test]
    fn test_clones_share_payload() {
        let event = NotificationEvent::new(json!({"type": "follow"}), 3);
        let copy = event.clone();
        assert!(Arc::ptr_eq(&event.payload, &copy.payload));
        assert_eq!(copy.received_at(), event.received_at());
    }
}
