//! Header unread badge.
//!
//! The badge is mounted for the whole session and runs its own poller
//! against the transport instead of following a page's cache. A page view and
//! the badge therefore hold separate counters that can disagree for up to one
//! polling interval.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::sync::poller::{self, PollerHandle};
use crate::transport::NotificationTransport;

pub struct UnreadBadge {
    id: Uuid,
    count: watch::Receiver<u64>,
    poller: Option<PollerHandle>,
}

impl UnreadBadge {
    /// Start polling right away and then every `period`.
    pub fn mount(transport: Arc<dyn NotificationTransport>, period: Duration) -> Self {
        let id = Uuid::new_v4();
        let (tx, rx) = watch::channel(0u64);
        let handle = poller::spawn(id, transport, period, true, move |count| {
            tx.send_replace(count);
        });
        info!(badge_id = %id, "unread badge mounted");
        Self {
            id,
            count: rx,
            poller: Some(handle),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn count(&self) -> u64 {
        *self.count.borrow()
    }

    /// Receiver that yields every new count.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.count.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.poller.is_some()
    }

    pub fn unmount(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.stop();
            info!(badge_id = %self.id, "unread badge unmounted");
        }
    }
}

impl Drop for UnreadBadge {
    fn drop(&mut self) {
        self.unmount();
    }
}
