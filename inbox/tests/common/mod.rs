//! In-memory notification store used by the engine and poller tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use inbox::errors::SyncError;
use inbox::models::notification::{
    ListQuery, Notification, NotificationId, NotificationType,
};
use inbox::transport::NotificationTransport;

pub fn note(id: i64, read: bool) -> Notification {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    Notification {
        notification_id: NotificationId::from(id),
        notification_type: NotificationType::Message,
        title: format!("Message {}", id),
        message: format!("body {}", id),
        is_read: read,
        related_id: Some(NotificationId::from(100 + id)),
        created_at: base - ChronoDuration::minutes(id),
    }
}

pub fn id(n: i64) -> NotificationId {
    NotificationId::from(n)
}

fn unavailable() -> SyncError {
    SyncError::Status {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: "store down".into(),
    }
}

#[derive(Default)]
pub struct FakeTransport {
    items: Mutex<Vec<Notification>>,
    unread: AtomicU64,
    calls: Mutex<Vec<String>>,
    pub fail_list: AtomicBool,
    pub fail_count: AtomicBool,
    pub fail_mutations: AtomicBool,
    /// Count returned from `delete_one`, if any.
    delete_reply: Mutex<Option<u64>>,
    mark_read_gate: Mutex<Option<Arc<Notify>>>,
    list_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeTransport {
    pub fn with(items: Vec<Notification>, unread: u64) -> Arc<Self> {
        let fake = Self::default();
        *fake.items.lock().unwrap() = items;
        fake.unread.store(unread, Ordering::SeqCst);
        Arc::new(fake)
    }

    pub fn set_unread(&self, unread: u64) {
        self.unread.store(unread, Ordering::SeqCst);
    }

    pub fn remote_unread(&self) -> u64 {
        self.unread.load(Ordering::SeqCst)
    }

    pub fn remote_len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn reply_to_delete_with(&self, count: Option<u64>) {
        *self.delete_reply.lock().unwrap() = count;
    }

    pub fn fail_everything(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
        self.fail_count.store(true, Ordering::SeqCst);
        self.fail_mutations.store(true, Ordering::SeqCst);
    }

    /// Hold `mark_read` calls until the returned gate is notified.
    pub fn gate_mark_read(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.mark_read_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Hold `list` calls until the returned gate is notified.
    pub fn gate_list(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, op: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split(':').next() == Some(op))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn mutation_result(&self) -> Result<(), SyncError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NotificationTransport for FakeTransport {
    async fn list(&self, _query: &ListQuery) -> Result<Vec<Notification>, SyncError> {
        self.record("list".into());
        let gate = self.list_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.items.lock().unwrap().clone())
    }

    async fn fetch_unread_count(&self) -> Result<u64, SyncError> {
        self.record("unread_count".into());
        if self.fail_count.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.unread.load(Ordering::SeqCst))
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<(), SyncError> {
        self.record(format!("mark_read:{}", id));
        let gate = self.mark_read_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.mutation_result()?;
        let mut items = self.items.lock().unwrap();
        if let Some(n) = items.iter_mut().find(|n| &n.notification_id == id) {
            if !n.is_read {
                n.is_read = true;
                let _ = self
                    .unread
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |u| Some(u.saturating_sub(1)));
            }
        }
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), SyncError> {
        self.record("mark_all_read".into());
        self.mutation_result()?;
        for n in self.items.lock().unwrap().iter_mut() {
            n.is_read = true;
        }
        self.unread.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_one(&self, id: &NotificationId) -> Result<Option<u64>, SyncError> {
        self.record(format!("delete_one:{}", id));
        self.mutation_result()?;
        self.items
            .lock()
            .unwrap()
            .retain(|n| &n.notification_id != id);
        Ok(*self.delete_reply.lock().unwrap())
    }

    async fn delete_all(&self) -> Result<(), SyncError> {
        self.record("delete_all".into());
        self.mutation_result()?;
        self.items.lock().unwrap().clear();
        self.unread.store(0, Ordering::SeqCst);
        Ok(())
    }
}
