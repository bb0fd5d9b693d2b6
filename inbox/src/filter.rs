//! Client-side filtering over a cache snapshot. Never touches the store.

use std::fmt;
use std::str::FromStr;

use crate::models::notification::{Notification, NotificationType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadFilter {
    #[default]
    All,
    Unread,
    Read,
}

impl FromStr for ReadFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ReadFilter::All),
            "unread" => Ok(ReadFilter::Unread),
            "read" => Ok(ReadFilter::Read),
            other => Err(format!(
                "unknown read filter '{}', expected all, unread or read",
                other
            )),
        }
    }
}

impl fmt::Display for ReadFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReadFilter::All => "all",
            ReadFilter::Unread => "unread",
            ReadFilter::Read => "read",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFilter {
    pub kind: Option<NotificationType>,
    pub status: ReadFilter,
}

impl NotificationFilter {
    pub fn unread() -> Self {
        Self {
            kind: None,
            status: ReadFilter::Unread,
        }
    }

    pub fn of_kind(kind: NotificationType) -> Self {
        Self {
            kind: Some(kind),
            status: ReadFilter::All,
        }
    }

    pub fn matches(&self, n: &Notification) -> bool {
        let kind_ok = self
            .kind
            .as_ref()
            .map_or(true, |k| &n.notification_type == k);
        let status_ok = match self.status {
            ReadFilter::All => true,
            ReadFilter::Unread => !n.is_read,
            ReadFilter::Read => n.is_read,
        };
        kind_ok && status_ok
    }

    /// Matching items, in snapshot order.
    pub fn apply(&self, items: &[Notification]) -> Vec<Notification> {
        items.iter().filter(|n| self.matches(n)).cloned().collect()
    }
}
