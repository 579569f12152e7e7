//! Periodic status ticks.

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Identifies a running periodic timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Schedules periodic ticks. The embedder routes each tick back to the
/// manager that started the timer.
pub trait TickScheduler: Send + Sync {
    fn start(&self, interval: Duration) -> TimerId;
    fn cancel(&self, id: TimerId);
}

/// Ticker running on the tokio runtime. Ticks are delivered as [`TimerId`]s
/// on the receiver returned by [`TokioTicker::new`].
pub struct TokioTicker {
    sender: mpsc::UnboundedSender<TimerId>,
    tasks: Mutex<IndexMap<u64, JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl TokioTicker {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerId>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let ticker = Self {
            sender,
            tasks: Mutex::new(IndexMap::new()),
            next_id: AtomicU64::new(1),
        };
        (ticker, receiver)
    }

    /// Number of timers currently running.
    pub fn active(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl TickScheduler for TokioTicker {
    fn start(&self, interval: Duration) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Status timer not started, no tokio runtime: {}", e);
                return id;
            }
        };

        let sender = self.sender.clone();
        let task = runtime.spawn(async move {
            let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                ticks.tick().await;
                if sender.send(id).is_err() {
                    break;
                }
            }
        });

        trace!("Started status timer {:?}", id);
        self.tasks.lock().insert(id.0, task);
        id
    }

    fn cancel(&self, id: TimerId) {
        if let Some(task) = self.tasks.lock().shift_remove(&id.0) {
            trace!("Cancelled status timer {:?}", id);
            task.abort();
        }
    }
}

impl Drop for TokioTicker {
    fn drop(&mut self) {
        for (_, task) in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

/// Ticker that never fires on its own; the embedder delivers ticks.
#[derive(Debug, Default)]
pub struct ManualTicker {
    active: Mutex<IndexMap<u64, Duration>>,
    next_id: AtomicU64,
    started: AtomicUsize,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers started and not yet cancelled, oldest first.
    pub fn active(&self) -> Vec<TimerId> {
        self.active.lock().keys().map(|id| TimerId(*id)).collect()
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.active.lock().contains_key(&id.0)
    }

    pub fn interval(&self, id: TimerId) -> Option<Duration> {
        self.active.lock().get(&id.0).copied()
    }

    /// Number of timers ever started.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::Relaxed)
    }
}

impl TickScheduler for ManualTicker {
    fn start(&self, interval: Duration) -> TimerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.started.fetch_add(1, Ordering::Relaxed);
        self.active.lock().insert(id, interval);
        TimerId(id)
    }

    fn cancel(&self, id: TimerId) {
        self.active.lock().shift_remove(&id.0);
    }
}
