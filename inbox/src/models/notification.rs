use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque notification identifier. The store sends either JSON integers or
/// strings; both decode to the same textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NotificationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for NotificationId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for NotificationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Self(n.to_string()),
            Raw::Str(s) => Self(s),
        })
    }
}

/// Notification category. Unknown categories are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationType {
    ConnectionRequest,
    Message,
    Event,
    Job,
    Mentorship,
    VerificationRequest,
    JobApplication,
    System,
    Other(String),
}

impl NotificationType {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationType::ConnectionRequest => "connection_request",
            NotificationType::Message => "message",
            NotificationType::Event => "event",
            NotificationType::Job => "job",
            NotificationType::Mentorship => "mentorship",
            NotificationType::VerificationRequest => "verification_request",
            NotificationType::JobApplication => "job_application",
            NotificationType::System => "system",
            NotificationType::Other(raw) => raw,
        }
    }
}

impl From<String> for NotificationType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "connection_request" => NotificationType::ConnectionRequest,
            "message" => NotificationType::Message,
            "event" => NotificationType::Event,
            "job" => NotificationType::Job,
            "mentorship" => NotificationType::Mentorship,
            "verification_request" => NotificationType::VerificationRequest,
            "job_application" => NotificationType::JobApplication,
            "system" => NotificationType::System,
            _ => NotificationType::Other(raw),
        }
    }
}

impl From<NotificationType> for String {
    fn from(kind: NotificationType) -> Self {
        kind.as_str().to_string()
    }
}

impl std::str::FromStr for NotificationType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(NotificationType::from(s.to_string()))
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: NotificationId,
    pub notification_type: NotificationType,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub related_id: Option<NotificationId>,
    pub created_at: DateTime<Utc>,
}

/// Server-side filter for `GET /notifications`. Unset fields are omitted
/// from the query string.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListQuery {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<NotificationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Deserialize)]
pub struct UnreadCountResponse {
    pub unread_count: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub unread_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_accepts_integer_and_string() {
        let a: NotificationId = serde_json::from_value(json!(42)).unwrap();
        let b: NotificationId = serde_json::from_value(json!("42")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "42");
    }

    #[test]
    fn test_notification_decodes_store_record() {
        let record = json!({
            "notification_id": 12,
            "notification_type": "connection_request",
            "title": "New connection",
            "message": "Priya wants to connect",
            "is_read": false,
            "related_id": 381,
            "created_at": "2024-03-01T10:15:00Z"
        });
        let n: Notification = serde_json::from_value(record).unwrap();
        assert_eq!(n.notification_id, NotificationId::from(12));
        assert_eq!(n.notification_type, NotificationType::ConnectionRequest);
        assert_eq!(n.related_id, Some(NotificationId::from("381")));
        assert!(!n.is_read);
    }

    #[test]
    fn test_null_related_id_and_unknown_type() {
        let record = json!({
            "notification_id": "abc",
            "notification_type": "alumni_reunion",
            "title": "Reunion",
            "message": "",
            "is_read": true,
            "related_id": null,
            "created_at": "2024-03-01T10:15:00Z"
        });
        let n: Notification = serde_json::from_value(record).unwrap();
        assert_eq!(
            n.notification_type,
            NotificationType::Other("alumni_reunion".into())
        );
        assert!(n.related_id.is_none());
        assert_eq!(serde_json::to_value(&n.notification_type).unwrap(), "alumni_reunion");
    }

    #[test]
    fn test_list_response_without_array_is_empty() {
        let resp: ListResponse = serde_json::from_value(json!({})).unwrap();
        assert!(resp.notifications.is_empty());
    }

    #[test]
    fn test_delete_response_optional_count() {
        let with: DeleteResponse = serde_json::from_value(json!({"unread_count": 3})).unwrap();
        assert_eq!(with.unread_count, Some(3));
        let without: DeleteResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(without.unread_count, None);
    }
}
