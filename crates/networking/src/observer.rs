//! Notifications for the UI.

use crate::tracker::TransferStatistics;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Load progress of the primary document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LoadProgress {
    /// Percentage, 0 to 100.
    Percent(u8),
    /// Total size not known yet.
    Indeterminate,
}

impl LoadProgress {
    pub fn from_bytes(received: u64, total: Option<u64>) -> Self {
        match total {
            Some(total) if total > 0 => {
                let percent = (received.saturating_mul(100) / total).min(100);
                LoadProgress::Percent(percent as u8)
            }
            _ => LoadProgress::Indeterminate,
        }
    }
}

/// Receives network manager notifications. Every method defaults to doing
/// nothing.
pub trait NetworkObserver: Send + Sync {
    fn status_changed(&self, _statistics: &TransferStatistics) {}

    fn document_progress_changed(&self, _progress: LoadProgress) {}

    fn message_changed(&self, _message: &str) {}
}

/// Observer subscription token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registered observers, notified synchronously in subscription order.
#[derive(Default)]
pub struct Observers {
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn NetworkObserver>)>>,
    next_id: AtomicU64,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn NetworkObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Snapshot so observers may subscribe or unsubscribe while notified.
    fn snapshot(&self) -> Vec<Arc<dyn NetworkObserver>> {
        self.observers.read().iter().map(|(_, o)| o.clone()).collect()
    }

    pub fn status_changed(&self, statistics: &TransferStatistics) {
        for observer in self.snapshot() {
            observer.status_changed(statistics);
        }
    }

    pub fn document_progress_changed(&self, progress: LoadProgress) {
        for observer in self.snapshot() {
            observer.document_progress_changed(progress);
        }
    }

    pub fn message_changed(&self, message: &str) {
        for observer in self.snapshot() {
            observer.message_changed(message);
        }
    }
}
