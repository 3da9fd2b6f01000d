//! Typed view of the notifications the backend pushes.
//!
//! The backend sends objects of this shape:
//!
//! ```json
//! {
//!   "id": 12,
//!   "type": "reaction",
//!   "title": "New reaction",
//!   "message": "Ada reacted to your post",
//!   "sender": {"id": 7, "first_name": "Ada", "last_name": "Lovelace", "avatar": null},
//!   "data": {"post_id": 3},
//!   "created_at": "2024-05-01T12:30:00.123456"
//! }
//! ```
//!
//! Timestamps arrive without an offset and are read as UTC. Fields the
//! backend adds later are kept in [`Notification::extra`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub id: Option<i64>,

    /// Notification type, e.g. `reaction`, `comment`, `follow`
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub sender: Option<NotificationSender>,

    /// Type-specific payload, such as the post a reaction refers to
    #[serde(default)]
    pub data: Value,

    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Notification {
    /// `data.post_id`, when the notification refers to a post
    pub fn post_id(&self) -> Option<i64> {
        self.data.get("post_id").and_then(Value::as_i64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSender {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl NotificationSender {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Accepts RFC 3339 or a naive ISO 8601 datetime, which is taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| Some(naive.and_utc()))
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_decode_backend_payload() {
        let payload = json!({
            "id": 12,
            "type": "reaction",
            "title": "New reaction",
            "message": "Ada reacted to your post",
            "sender": {"id": 7, "first_name": "Ada", "last_name": "Lovelace", "avatar": null},
            "data": {"post_id": 3},
            "created_at": "2024-05-01T12:30:00.123456"
        });

        let notification: Notification = serde_json::from_value(payload).unwrap();
        assert_eq!(notification.id, Some(12));
        assert_eq!(notification.kind, "reaction");
        assert_eq!(notification.post_id(), Some(3));
        assert!(notification.extra.is_empty());

        let sender = notification.sender.as_ref().unwrap();
        assert_eq!(sender.display_name(), "Ada Lovelace");
        assert_eq!(sender.avatar, None);

        let created = notification.created_at.unwrap();
        assert_eq!((created.year(), created.month(), created.day()), (2024, 5, 1));
        assert_eq!((created.hour(), created.minute()), (12, 30));
        assert_eq!(created.nanosecond(), 123_456_000);
    }

    #[rstest]
    #[case("2024-05-01T12:30:00", 12)]
    #[case("2024-05-01T12:30:00Z", 12)]
    #[case("2024-05-01T14:30:00+02:00", 12)]
    fn test_timestamp_formats(#[case] raw: &str, #[case] utc_hour: u32) {
        let notification: Notification =
            serde_json::from_value(json!({"type": "follow", "created_at": raw})).unwrap();
        assert_eq!(notification.created_at.unwrap().hour(), utc_hour);
    }

    #[test]
    fn test_minimal_payload_and_extra_fields() {
        let notification: Notification =
            serde_json::from_value(json!({"type": "like", "postId": 7})).unwrap();
        assert_eq!(notification.kind, "like");
        assert_eq!(notification.id, None);
        assert_eq!(notification.message, "");
        assert_eq!(notification.created_at, None);
        assert_eq!(notification.extra.get("postId"), Some(&json!(7)));
    }

    #[test]
    fn test_rejects_bad_timestamp() {
        let result =
            serde_json::from_value::<Notification>(json!({"type": "like", "created_at": "yesterday"}));
        assert!(result.is_err());
    }
}
