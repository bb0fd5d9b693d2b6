//! REST transport for the notification store.
//!
//! Endpoints, relative to the configured base URL:
//! - `GET    notifications?{filters}`
//! - `GET    notifications/unread-count`
//! - `PUT    notifications/{id}/read`
//! - `PUT    notifications/mark-all-read`
//! - `DELETE notifications/{id}`
//! - `DELETE notifications/delete-all`

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::retry::{send_read, RetryConfig};
use super::NotificationTransport;
use crate::errors::SyncError;
use crate::models::notification::{
    DeleteResponse, ListQuery, ListResponse, Notification, NotificationId, UnreadCountResponse,
};

pub struct HttpTransport {
    base: Url,
    token: Option<String>,
    http: Client,
    retry: RetryConfig,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self, SyncError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("inbox/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base: normalize_base(base_url)?,
            token,
            http,
            retry,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, SyncError> {
        Ok(self.base.join(path)?)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn read(&self, op: &'static str, req: RequestBuilder) -> Result<Response, SyncError> {
        let resp = send_read(op, self.authorized(req), &self.retry).await?;
        check_status(resp).await
    }

    async fn write(&self, req: RequestBuilder) -> Result<Response, SyncError> {
        let resp = self.authorized(req).send().await?;
        check_status(resp).await
    }
}

/// `Url::join` drops the last segment unless the base ends with a slash.
fn normalize_base(base_url: &str) -> Result<Url, url::ParseError> {
    if base_url.ends_with('/') {
        Url::parse(base_url)
    } else {
        Url::parse(&format!("{}/", base_url))
    }
}

fn encode_id(id: &NotificationId) -> String {
    urlencoding::encode(id.as_str()).into_owned()
}

async fn check_status(resp: Response) -> Result<Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::Status { status, body })
}

#[async_trait]
impl NotificationTransport for HttpTransport {
    async fn list(&self, query: &ListQuery) -> Result<Vec<Notification>, SyncError> {
        let req = self.http.get(self.url("notifications")?).query(query);
        let resp = self.read("list", req).await?;
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let parsed: ListResponse = serde_json::from_str(&body)?;
        debug!(count = parsed.notifications.len(), "fetched notifications");
        Ok(parsed.notifications)
    }

    async fn fetch_unread_count(&self) -> Result<u64, SyncError> {
        let req = self.http.get(self.url("notifications/unread-count")?);
        let resp = self.read("unread_count", req).await?;
        let body = resp.text().await?;
        let parsed: UnreadCountResponse = serde_json::from_str(&body)?;
        Ok(parsed.unread_count)
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<(), SyncError> {
        let url = self.url(&format!("notifications/{}/read", encode_id(id)))?;
        self.write(self.http.put(url)).await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), SyncError> {
        let url = self.url("notifications/mark-all-read")?;
        self.write(self.http.put(url)).await?;
        Ok(())
    }

    async fn delete_one(&self, id: &NotificationId) -> Result<Option<u64>, SyncError> {
        let url = self.url(&format!("notifications/{}", encode_id(id)))?;
        let resp = self.write(self.http.delete(url)).await?;
        let body = resp.text().await.unwrap_or_default();
        if body.trim().is_empty() {
            return Ok(None);
        }
        // The count is a hint; an unexpected body must not fail a delete the
        // store already applied.
        match serde_json::from_str::<DeleteResponse>(&body) {
            Ok(parsed) => Ok(parsed.unread_count),
            Err(e) => {
                debug!(error = %e, "ignoring unparseable delete response");
                Ok(None)
            }
        }
    }

    async fn delete_all(&self) -> Result<(), SyncError> {
        let url = self.url("notifications/delete-all")?;
        self.write(self.http.delete(url)).await?;
        Ok(())
    }
}
