//! Background unread-count poller.
//!
//! Only the count is polled, never the full list. The task lives until its
//! [`PollerHandle`] is stopped or dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::transport::NotificationTransport;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Owns a running poll task. Dropping the handle aborts the task.
#[derive(Debug)]
pub struct PollerHandle {
    owner: Uuid,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn stop(self) {
        // Drop does the abort.
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
        debug!(owner = %self.owner, "unread poller stopped");
    }
}

/// Spawn a task that calls `unread_count()` every `period` and hands each
/// result to `sink`. With `immediate` the first fetch happens right away,
/// otherwise one period after spawning.
pub fn spawn<F>(
    owner: Uuid,
    transport: Arc<dyn NotificationTransport>,
    period: Duration,
    immediate: bool,
    sink: F,
) -> PollerHandle
where
    F: Fn(u64) + Send + Sync + 'static,
{
    // interval_at panics on a zero period
    let period = period.max(Duration::from_millis(1));
    let task = tokio::spawn(async move {
        let start = if immediate {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut interval = time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let count = transport.unread_count().await;
            debug!(owner = %owner, unread = count, "polled unread count");
            sink(count);
        }
    });

    info!(owner = %owner, period_secs = period.as_secs_f64(), "unread poller started");
    PollerHandle { owner, task }
}
