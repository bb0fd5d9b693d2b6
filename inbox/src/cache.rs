use chrono::{DateTime, Utc};

use crate::models::notification::{Notification, NotificationId};

/// Local mirror of the user's notifications.
///
/// Items keep the order the store returned them in. `unread` is the displayed
/// counter: it comes from the authoritative count endpoint and is adjusted by
/// optimistic decrements, so it can disagree with [`derived_unread`] when the
/// store holds notifications that were never loaded.
///
/// `count_epoch` advances every time the store dictates the counter. An
/// undo only gives back a decrement taken in the current epoch; a newer
/// authoritative count already includes it.
///
/// [`derived_unread`]: NotificationCache::derived_unread
#[derive(Debug, Clone, Default)]
pub struct NotificationCache {
    items: Vec<Notification>,
    unread: u64,
    count_epoch: u64,
    last_synced_at: Option<DateTime<Utc>>,
}

/// What `mark_all_read` changed, so a failed remote call can be undone.
#[derive(Debug, Clone, Default)]
pub struct MarkAllCheckpoint {
    flipped: Vec<NotificationId>,
    decremented: u64,
    epoch: u64,
}

impl NotificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.items.iter().find(|n| &n.notification_id == id)
    }

    pub fn unread(&self) -> u64 {
        self.unread
    }

    /// Number of loaded items with `is_read == false`.
    pub fn derived_unread(&self) -> u64 {
        self.items.iter().filter(|n| !n.is_read).count() as u64
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    /// Current counter epoch; pass it back to [`revert_read`].
    ///
    /// [`revert_read`]: NotificationCache::revert_read
    pub fn count_epoch(&self) -> u64 {
        self.count_epoch
    }

    fn overwrite_unread(&mut self, count: u64) {
        self.unread = count;
        self.count_epoch = self.count_epoch.wrapping_add(1);
    }

    /// Replace the list with a fresh fetch. Order is kept as given.
    pub fn replace(&mut self, items: Vec<Notification>) {
        self.items = items;
        self.last_synced_at = Some(Utc::now());
    }

    /// Apply an authoritative count from the store.
    pub fn set_unread(&mut self, count: u64) {
        self.overwrite_unread(count);
        self.last_synced_at = Some(Utc::now());
    }

    /// Flip one item to read. Returns false (and leaves the counter alone)
    /// when the item is missing or already read.
    pub fn mark_read(&mut self, id: &NotificationId) -> bool {
        match self.items.iter_mut().find(|n| &n.notification_id == id) {
            Some(item) if !item.is_read => {
                item.is_read = true;
                self.unread = self.unread.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    /// Undo an optimistic `mark_read` after the store rejected it. `epoch`
    /// is [`count_epoch`] as it was right after the optimistic flip; the
    /// counter is only given back if no authoritative count landed since.
    ///
    /// [`count_epoch`]: NotificationCache::count_epoch
    pub fn revert_read(&mut self, id: &NotificationId, epoch: u64) {
        let Some(item) = self.items.iter_mut().find(|n| &n.notification_id == id) else {
            return;
        };
        if !item.is_read {
            return;
        }
        item.is_read = false;
        if epoch == self.count_epoch {
            self.unread = self.unread.saturating_add(1);
        }
    }

    pub fn mark_all_read(&mut self) -> MarkAllCheckpoint {
        let flipped = self
            .items
            .iter_mut()
            .filter(|n| !n.is_read)
            .map(|n| {
                n.is_read = true;
                n.notification_id.clone()
            })
            .collect();
        let decremented = std::mem::take(&mut self.unread);
        MarkAllCheckpoint {
            flipped,
            decremented,
            epoch: self.count_epoch,
        }
    }

    /// Undo a `mark_all_read`. Items deleted in the meantime stay deleted.
    /// The counter gets back what was taken unless the store has reported a
    /// count since, which already reflects the failed mutation.
    pub fn restore(&mut self, checkpoint: MarkAllCheckpoint) {
        for item in self
            .items
            .iter_mut()
            .filter(|n| checkpoint.flipped.contains(&n.notification_id))
        {
            item.is_read = false;
        }
        if checkpoint.epoch == self.count_epoch {
            self.unread = self.unread.saturating_add(checkpoint.decremented);
        }
    }

    /// Drop one item after a confirmed delete. `authoritative` wins over the
    /// local decrement when the store supplied it.
    pub fn remove(
        &mut self,
        id: &NotificationId,
        authoritative: Option<u64>,
    ) -> Option<Notification> {
        let pos = self.items.iter().position(|n| &n.notification_id == id);
        let removed = pos.map(|i| self.items.remove(i));

        match authoritative {
            Some(count) => self.overwrite_unread(count),
            None => {
                if matches!(&removed, Some(n) if !n.is_read) {
                    self.unread = self.unread.saturating_sub(1);
                }
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.overwrite_unread(0);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::notification::NotificationType;

    pub(crate) fn note(id: i64, read: bool) -> Notification {
        Notification {
            notification_id: NotificationId::from(id),
            notification_type: NotificationType::Message,
            title: format!("title {}", id),
            message: format!("message {}", id),
            is_read: read,
            related_id: None,
            created_at: Utc::now(),
        }
    }

    fn cache(items: Vec<Notification>, unread: u64) -> NotificationCache {
        let mut c = NotificationCache::new();
        c.replace(items);
        c.set_unread(unread);
        c
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let mut c = cache(vec![note(1, false), note(2, false)], 2);
        assert!(c.mark_read(&NotificationId::from(1)));
        assert!(!c.mark_read(&NotificationId::from(1)));
        assert!(!c.mark_read(&NotificationId::from(1)));
        assert_eq!(c.unread(), 1);
    }

    #[test]
    fn test_mark_read_clamps_at_zero() {
        // counter already drained by an earlier refresh
        let mut c = cache(vec![note(1, false)], 0);
        assert!(c.mark_read(&NotificationId::from(1)));
        assert_eq!(c.unread(), 0);
    }

    #[test]
    fn test_unknown_id_does_nothing() {
        let mut c = cache(vec![note(1, false)], 1);
        assert!(!c.mark_read(&NotificationId::from(99)));
        assert_eq!(c.unread(), 1);
        assert!(c.remove(&NotificationId::from(99), None).is_none());
        assert_eq!(c.unread(), 1);
    }

    #[test]
    fn test_order_is_preserved() {
        let c = cache(vec![note(3, false), note(1, true), note(2, false)], 2);
        let ids: Vec<_> = c.items().iter().map(|n| n.notification_id.to_string()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_mark_all_and_restore() {
        let mut c = cache(vec![note(1, false), note(2, true), note(3, false)], 5);
        let checkpoint = c.mark_all_read();
        assert!(c.items().iter().all(|n| n.is_read));
        assert_eq!(c.unread(), 0);

        c.restore(checkpoint);
        assert_eq!(c.unread(), 5);
        assert!(!c.get(&NotificationId::from(1)).unwrap().is_read);
        assert!(c.get(&NotificationId::from(2)).unwrap().is_read);
        assert!(!c.get(&NotificationId::from(3)).unwrap().is_read);
    }

    #[test]
    fn test_remove_prefers_authoritative_count() {
        let mut c = cache(vec![note(1, false), note(2, false)], 10);
        c.remove(&NotificationId::from(1), Some(4));
        assert_eq!(c.unread(), 4);
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_remove_read_item_keeps_counter() {
        let mut c = cache(vec![note(1, true), note(2, false)], 1);
        c.remove(&NotificationId::from(1), None);
        assert_eq!(c.unread(), 1);
    }

    #[test]
    fn test_derived_count_can_differ_from_displayed() {
        let c = cache(vec![note(1, false)], 7);
        assert_eq!(c.derived_unread(), 1);
        assert_eq!(c.unread(), 7);
    }

    #[test]
    fn test_revert_read() {
        let mut c = cache(vec![note(1, false)], 1);
        c.mark_read(&NotificationId::from(1));
        let epoch = c.count_epoch();
        c.revert_read(&NotificationId::from(1), epoch);
        assert_eq!(c.unread(), 1);
        assert!(!c.get(&NotificationId::from(1)).unwrap().is_read);
    }

    #[test]
    fn test_revert_after_fresh_count_keeps_store_value() {
        let mut c = cache(vec![note(1, false), note(2, false)], 5);
        c.mark_read(&NotificationId::from(1));
        let epoch = c.count_epoch();

        // the store still counts item 1 as unread
        c.set_unread(5);
        c.revert_read(&NotificationId::from(1), epoch);

        assert_eq!(c.unread(), 5);
        assert!(!c.get(&NotificationId::from(1)).unwrap().is_read);
    }

    #[test]
    fn test_restore_after_fresh_count_keeps_store_value() {
        let mut c = cache(vec![note(1, false), note(2, false)], 4);
        let checkpoint = c.mark_all_read();
        c.set_unread(4);

        c.restore(checkpoint);
        assert_eq!(c.unread(), 4);
        assert_eq!(c.derived_unread(), 2);
    }
}
