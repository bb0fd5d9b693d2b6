//! Notification page sync engine.
//!
//! Keeps a [`NotificationCache`] eventually consistent with the store:
//! - activation loads the list, then the unread count, then starts polling
//!   the count only
//! - reads (single and bulk) are optimistic: local first, remote second
//! - deletes (single and bulk) are remote first, local only on success
//! - transport failures become a [`SyncEvent::Notice`] plus an `Err`; they
//!   never escape as panics
//!
//! The cache lives for one mount: [`SyncEngine::deactivate`] discards it, and
//! results that arrive afterwards are dropped.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::poller::{self, PollerHandle, DEFAULT_POLL_INTERVAL};
use crate::cache::NotificationCache;
use crate::errors::SyncError;
use crate::filter::NotificationFilter;
use crate::models::notification::{ListQuery, Notification, NotificationId};
use crate::transport::NotificationTransport;

const EVENT_CAPACITY: usize = 64;

/// What to do with an optimistic read when the store rejects it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MutationPolicy {
    /// Keep the optimistic state; the next refresh corrects it.
    #[default]
    Lenient,
    /// Revert the flag flip and give the counter back.
    Rollback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    ListRefreshed { total: usize },
    UnreadChanged(u64),
    Notice(Notice),
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub poll_interval: Duration,
    pub policy: MutationPolicy,
    /// Server-side filter for list fetches.
    pub query: ListQuery,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            policy: MutationPolicy::Lenient,
            query: ListQuery::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InboxSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
    pub derived_unread: u64,
    pub last_synced_at: Option<DateTime<Utc>>,
}

struct Shared {
    view_id: Uuid,
    transport: Arc<dyn NotificationTransport>,
    state: Arc<RwLock<NotificationCache>>,
    events: broadcast::Sender<SyncEvent>,
    active: Arc<AtomicBool>,
    poller: Mutex<Option<PollerHandle>>,
    options: EngineOptions,
}

/// Cheaply cloneable handle to one notification view. The poller is aborted
/// when the view is deactivated or the last handle is dropped.
#[derive(Clone)]
pub struct SyncEngine {
    shared: Arc<Shared>,
}

fn read_lock(state: &RwLock<NotificationCache>) -> RwLockReadGuard<'_, NotificationCache> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock(state: &RwLock<NotificationCache>) -> RwLockWriteGuard<'_, NotificationCache> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

impl SyncEngine {
    pub fn new(transport: Arc<dyn NotificationTransport>, options: EngineOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                view_id: Uuid::new_v4(),
                transport,
                state: Arc::new(RwLock::new(NotificationCache::new())),
                events,
                active: Arc::new(AtomicBool::new(false)),
                poller: Mutex::new(None),
                options,
            }),
        }
    }

    pub fn view_id(&self) -> Uuid {
        self.shared.view_id
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.shared
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|p| !p.is_finished())
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Mount the view: load the list, then the count, then start polling.
    ///
    /// Returns the number of loaded notifications. A failed list fetch is
    /// returned as `Err`, but the view stays active and polling still starts.
    pub async fn activate(&self) -> Result<usize, SyncError> {
        if self.shared.active.swap(true, Ordering::SeqCst) {
            debug!(view_id = %self.view_id(), "view already active");
            return Ok(read_lock(&self.shared.state).len());
        }
        info!(view_id = %self.view_id(), "activating notification view");

        let listed = self.refresh_list().await;
        let _ = self.refresh_unread().await;

        if self.is_active() {
            self.start_poller();
        }
        listed
    }

    /// Unmount the view: stop polling and discard the cache. In-flight
    /// results are dropped when they land.
    pub fn deactivate(&self) {
        if !self.shared.active.swap(false, Ordering::SeqCst) {
            return;
        }
        self.stop_poller();
        *write_lock(&self.shared.state) = NotificationCache::new();
        info!(view_id = %self.view_id(), "notification view deactivated");
    }

    fn start_poller(&self) {
        let state = Arc::clone(&self.shared.state);
        let events = self.shared.events.clone();
        let active = Arc::clone(&self.shared.active);

        let handle = poller::spawn(
            self.view_id(),
            Arc::clone(&self.shared.transport),
            self.shared.options.poll_interval,
            false,
            move |count| {
                if !active.load(Ordering::SeqCst) {
                    return;
                }
                write_lock(&state).set_unread(count);
                let _ = events.send(SyncEvent::UnreadChanged(count));
            },
        );

        *self
            .shared
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        // A deactivate that ran before the handle was stored found nothing
        // to stop.
        if !self.is_active() {
            self.stop_poller();
        }
    }

    fn stop_poller(&self) {
        let handle = self
            .shared
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop();
        }
    }

    fn ensure_active(&self) -> Result<(), SyncError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(SyncError::Inactive)
        }
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.shared.events.send(event);
    }

    fn notify_failure(&self, action: &str, err: &SyncError) {
        error!(view_id = %self.view_id(), error = %err, "failed to {}", action);
        self.emit(SyncEvent::Notice(Notice {
            level: NoticeLevel::Error,
            message: err.user_message(action),
        }));
    }

    fn notify_success(&self, message: &str) {
        self.emit(SyncEvent::Notice(Notice {
            level: NoticeLevel::Success,
            message: message.to_string(),
        }));
    }

    // ── Refresh ───────────────────────────────────────────────

    /// Re-fetch the list and replace the cache with it.
    pub async fn refresh_list(&self) -> Result<usize, SyncError> {
        self.ensure_active()?;

        let items = match self.shared.transport.list(&self.shared.options.query).await {
            Ok(items) => items,
            Err(e) => {
                self.notify_failure("load notifications", &e);
                return Err(e);
            }
        };

        if !self.is_active() {
            debug!(view_id = %self.view_id(), "discarding list fetched after deactivation");
            return Err(SyncError::Inactive);
        }

        let total = items.len();
        write_lock(&self.shared.state).replace(items);
        self.emit(SyncEvent::ListRefreshed { total });
        Ok(total)
    }

    /// Re-fetch the authoritative unread count. A failed fetch reads as 0.
    pub async fn refresh_unread(&self) -> Result<u64, SyncError> {
        self.ensure_active()?;

        let count = self.shared.transport.unread_count().await;

        if !self.is_active() {
            debug!(view_id = %self.view_id(), "discarding count fetched after deactivation");
            return Err(SyncError::Inactive);
        }

        write_lock(&self.shared.state).set_unread(count);
        self.emit(SyncEvent::UnreadChanged(count));
        Ok(count)
    }

    /// Explicit full refresh: list, then count.
    pub async fn refresh(&self) -> Result<usize, SyncError> {
        let total = self.refresh_list().await?;
        self.refresh_unread().await?;
        Ok(total)
    }

    // ── Reads ─────────────────────────────────────────────────

    /// Optimistically mark one notification read, then tell the store.
    ///
    /// Returns `Ok(false)` without a remote call when the item is already
    /// read. On a remote failure the optimistic state stays unless the
    /// policy is [`MutationPolicy::Rollback`].
    pub async fn mark_read(&self, id: &NotificationId) -> Result<bool, SyncError> {
        self.ensure_active()?;

        let (unread, epoch) = {
            let mut state = write_lock(&self.shared.state);
            match state.get(id) {
                None => return Err(SyncError::NotFound(id.clone())),
                Some(n) if n.is_read => return Ok(false),
                Some(_) => {}
            }
            state.mark_read(id);
            (state.unread(), state.count_epoch())
        };
        self.emit(SyncEvent::UnreadChanged(unread));

        match self.shared.transport.mark_read(id).await {
            Ok(()) => {
                debug!(view_id = %self.view_id(), notification_id = %id, "marked read");
                Ok(true)
            }
            Err(e) => {
                if self.shared.options.policy == MutationPolicy::Rollback && self.is_active() {
                    let unread = {
                        let mut state = write_lock(&self.shared.state);
                        state.revert_read(id, epoch);
                        state.unread()
                    };
                    warn!(notification_id = %id, "rolled back optimistic read");
                    self.emit(SyncEvent::UnreadChanged(unread));
                }
                self.notify_failure("mark notification as read", &e);
                Err(e)
            }
        }
    }

    /// User opened a notification: mark it read and hand it back for
    /// deep-linking. Remote failures have already been surfaced as a notice.
    pub async fn open(&self, id: &NotificationId) -> Option<Notification> {
        if let Err(e) = self.mark_read(id).await {
            debug!(notification_id = %id, error = %e, "open did not sync read state");
        }
        read_lock(&self.shared.state).get(id).cloned()
    }

    /// Optimistically mark everything read and zero the counter, then tell
    /// the store.
    pub async fn mark_all_read(&self) -> Result<(), SyncError> {
        self.ensure_active()?;

        let checkpoint = write_lock(&self.shared.state).mark_all_read();
        self.emit(SyncEvent::UnreadChanged(0));

        match self.shared.transport.mark_all_read().await {
            Ok(()) => {
                self.notify_success("All notifications marked as read");
                Ok(())
            }
            Err(e) => {
                if self.shared.options.policy == MutationPolicy::Rollback && self.is_active() {
                    let unread = {
                        let mut state = write_lock(&self.shared.state);
                        state.restore(checkpoint);
                        state.unread()
                    };
                    warn!(view_id = %self.view_id(), "rolled back optimistic mark-all-read");
                    self.emit(SyncEvent::UnreadChanged(unread));
                }
                self.notify_failure("mark all notifications as read", &e);
                Err(e)
            }
        }
    }

    // ── Deletes ───────────────────────────────────────────────

    /// Delete on the store first; drop from the cache only on success.
    pub async fn delete(&self, id: &NotificationId) -> Result<(), SyncError> {
        self.ensure_active()?;

        let authoritative = match self.shared.transport.delete_one(id).await {
            Ok(count) => count,
            Err(e) => {
                self.notify_failure("delete notification", &e);
                return Err(e);
            }
        };

        if !self.is_active() {
            debug!(notification_id = %id, "delete confirmed after deactivation");
            return Ok(());
        }

        let (unread, total) = {
            let mut state = write_lock(&self.shared.state);
            state.remove(id, authoritative);
            (state.unread(), state.len())
        };
        self.emit(SyncEvent::ListRefreshed { total });
        self.emit(SyncEvent::UnreadChanged(unread));
        self.notify_success("Notification deleted");
        Ok(())
    }

    /// Delete everything on the store; clear the cache only on success.
    pub async fn clear(&self) -> Result<(), SyncError> {
        self.ensure_active()?;

        if let Err(e) = self.shared.transport.delete_all().await {
            self.notify_failure("delete all notifications", &e);
            return Err(e);
        }

        if !self.is_active() {
            debug!(view_id = %self.view_id(), "delete-all confirmed after deactivation");
            return Ok(());
        }

        write_lock(&self.shared.state).clear();
        self.emit(SyncEvent::ListRefreshed { total: 0 });
        self.emit(SyncEvent::UnreadChanged(0));
        self.notify_success("All notifications deleted");
        Ok(())
    }

    // ── Views ─────────────────────────────────────────────────

    pub fn unread_count(&self) -> u64 {
        read_lock(&self.shared.state).unread()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        read_lock(&self.shared.state).items().to_vec()
    }

    pub fn snapshot(&self) -> InboxSnapshot {
        let state = read_lock(&self.shared.state);
        InboxSnapshot {
            notifications: state.items().to_vec(),
            unread_count: state.unread(),
            derived_unread: state.derived_unread(),
            last_synced_at: state.last_synced_at(),
        }
    }

    /// Filter the current cache contents. No remote call, no mutation.
    pub fn filtered(&self, filter: &NotificationFilter) -> Vec<Notification> {
        filter.apply(read_lock(&self.shared.state).items())
    }
}
