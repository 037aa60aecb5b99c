use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::transaction::{Address, TransactionDetails};

/// Newest entries kept by `NotificationLog`.
pub const NOTIFICATION_LOG_CAPACITY: usize = 100;

/// Sent to admins whenever a `reward` transaction is queued.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminNotification {
    pub admins: Vec<Address>,
    pub transaction: TransactionDetails,
    pub timestamp: DateTime<Utc>,
}

/// Receiver for admin notifications (dashboard, mailer, ...).
pub trait AdminNotifier: Send + Sync {
    fn notify(&self, notification: AdminNotification);
}

/// In-memory notifier keeping the newest `NOTIFICATION_LOG_CAPACITY` entries,
/// newest first.
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Mutex<VecDeque<AdminNotification>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recent(&self) -> Vec<AdminNotification> {
        self.entries
            .lock()
            .expect("mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AdminNotifier for NotificationLog {
    fn notify(&self, notification: AdminNotification) {
        info!(
            "ADMIN - reward {} -> {} ({} coins)",
            notification.transaction.hash, notification.transaction.to, notification.transaction.amount
        );
        let mut entries = self.entries.lock().expect("mutex poisoned");
        entries.push_front(notification);
        entries.truncate(NOTIFICATION_LOG_CAPACITY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Transaction, TxBody};

    fn notification(amount: u64) -> AdminNotification {
        let tx = Transaction::mint("A".into(), amount, TxBody::MiningReward { block_number: 0 });
        AdminNotification {
            admins: vec!["ADMIN".into()],
            transaction: tx.details(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn log_is_newest_first_and_capped() {
        let log = NotificationLog::new();
        for i in 0..(NOTIFICATION_LOG_CAPACITY as u64 + 5) {
            log.notify(notification(i));
        }
        let recent = log.recent();
        assert_eq!(recent.len(), NOTIFICATION_LOG_CAPACITY);
        assert_eq!(recent[0].transaction.amount, NOTIFICATION_LOG_CAPACITY as u64 + 4);
    }
}
