use reqwest::StatusCode;
use thiserror::Error;

use crate::models::notification::NotificationId;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("notification store returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid notification store url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("notification {0} is not loaded")]
    NotFound(NotificationId),

    #[error("notification view is not active")]
    Inactive,
}

impl SyncError {
    /// True for failures that came from talking to the remote store.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_)
                | SyncError::Status { .. }
                | SyncError::Decode(_)
                | SyncError::InvalidUrl(_)
        )
    }

    /// Short user-facing text for a transient notice.
    pub fn user_message(&self, action: &str) -> String {
        match self {
            SyncError::Status { status, .. } if *status == StatusCode::UNAUTHORIZED => {
                format!("Failed to {}: please sign in again", action)
            }
            SyncError::Status { status, .. } if *status == StatusCode::NOT_FOUND => {
                format!("Failed to {}: notification no longer exists", action)
            }
            SyncError::NotFound(_) => format!("Failed to {}: notification not found", action),
            SyncError::Inactive => format!("Failed to {}: view is closed", action),
            _ => format!("Failed to {}", action),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_is_transport() {
        let err = SyncError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: "upstream down".into(),
        };
        assert!(err.is_transport());
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_inactive_is_not_transport() {
        assert!(!SyncError::Inactive.is_transport());
        assert!(!SyncError::NotFound(NotificationId::from("7")).is_transport());
    }

    #[test]
    fn test_user_message_mentions_action() {
        let err = SyncError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: String::new(),
        };
        assert_eq!(
            err.user_message("mark notification as read"),
            "Failed to mark notification as read"
        );

        let unauthorized = SyncError::Status {
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
        };
        assert!(unauthorized.user_message("delete").contains("sign in"));
    }
}
