pub mod http;
pub mod retry;

use async_trait::async_trait;

use crate::errors::SyncError;
use crate::models::notification::{ListQuery, Notification, NotificationId};

/// Remote notification store operations.
/// Implementations: HttpTransport (REST API); tests use an in-memory fake.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Fetch the full or filtered notification list, in store order.
    async fn list(&self, query: &ListQuery) -> Result<Vec<Notification>, SyncError>;

    /// Fetch the authoritative unread count.
    async fn fetch_unread_count(&self) -> Result<u64, SyncError>;

    async fn mark_read(&self, id: &NotificationId) -> Result<(), SyncError>;

    async fn mark_all_read(&self) -> Result<(), SyncError>;

    /// Delete one notification. Returns the post-delete unread count when the
    /// store supplies one.
    async fn delete_one(&self, id: &NotificationId) -> Result<Option<u64>, SyncError>;

    async fn delete_all(&self) -> Result<(), SyncError>;

    /// Unread count that never fails: any error reads as zero.
    /// A real outage is indistinguishable from "nothing unread" here; use
    /// `fetch_unread_count` when the difference matters.
    async fn unread_count(&self) -> u64 {
        match self.fetch_unread_count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "unread count fetch failed, reporting 0");
                0
            }
        }
    }
}
