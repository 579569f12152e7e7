//! Transfer statistics for one browsing context.
//!
//! The tracker owns the set of in-flight operations, aggregates their byte
//! counts and recomputes the transfer speed on a fixed cadence. Status is
//! published through [`Observers`].

use crate::observer::{LoadProgress, Observers};
use crate::request::display_host;
use crate::timer::{TickScheduler, TimerId};
use crate::transport::OperationHandle;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// Snapshot of the transfer counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TransferStatistics {
    pub finished_requests: u64,
    pub started_requests: u64,
    pub bytes_received: u64,
    pub bytes_total: u64,
    /// Bytes per second over the last tick.
    pub speed: u64,
}

/// An operation being tracked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InFlightRequest {
    pub url: Url,
    pub bytes_received: u64,
    /// Whether the announced size was added to the total.
    pub total_announced: bool,
    pub is_primary: bool,
}

/// Tracks in-flight operations and aggregates their progress.
pub struct TransferTracker {
    requests: IndexMap<OperationHandle, InFlightRequest>,
    primary: Option<OperationHandle>,
    statistics: TransferStatistics,
    bytes_since_tick: u64,
    timer: Option<TimerId>,
    ticker: Arc<dyn TickScheduler>,
    interval: Duration,
    observers: Arc<Observers>,
}

impl TransferTracker {
    pub fn new(ticker: Arc<dyn TickScheduler>, interval: Duration, observers: Arc<Observers>) -> Self {
        Self {
            requests: IndexMap::new(),
            primary: None,
            statistics: TransferStatistics::default(),
            bytes_since_tick: 0,
            timer: None,
            ticker,
            interval,
            observers,
        }
    }

    pub fn statistics(&self) -> TransferStatistics {
        self.statistics
    }

    /// The primary document request, until it redirects or is reset.
    pub fn primary(&self) -> Option<OperationHandle> {
        self.primary
    }

    pub fn is_primary(&self, handle: OperationHandle) -> bool {
        self.primary == Some(handle)
    }

    pub fn is_tracked(&self, handle: OperationHandle) -> bool {
        self.requests.contains_key(&handle)
    }

    pub fn request(&self, handle: OperationHandle) -> Option<&InFlightRequest> {
        self.requests.get(&handle)
    }

    pub fn in_flight(&self) -> usize {
        self.requests.len()
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    /// Count an intercepted request.
    pub fn request_started(&mut self) {
        self.statistics.started_requests += 1;
    }

    /// Start tracking a submitted operation. The first one tracked while no
    /// primary is set becomes primary.
    pub fn track(&mut self, handle: OperationHandle, url: Url) -> bool {
        let is_primary = self.primary.is_none();
        if is_primary {
            debug!("Primary request {} to {}", handle, url);
            self.primary = Some(handle);
        }

        self.requests.insert(
            handle,
            InFlightRequest {
                url,
                bytes_received: 0,
                total_announced: false,
                is_primary,
            },
        );

        if self.timer.is_none() {
            self.timer = Some(self.ticker.start(self.interval));
        }

        is_primary
    }

    /// Progress report from the transport. `redirected` is whether the
    /// response carries a `Location` header.
    pub fn on_progress(&mut self, handle: OperationHandle, received: u64, total: Option<u64>, redirected: bool) {
        if self.is_primary(handle) {
            if redirected {
                debug!("Primary request {} redirected", handle);
                self.primary = None;
                if let Some(request) = self.requests.get_mut(&handle) {
                    request.is_primary = false;
                }
            } else {
                self.observers
                    .document_progress_changed(LoadProgress::from_bytes(received, total));
            }
        }

        let Some(request) = self.requests.get_mut(&handle) else {
            trace!("Ignoring progress for untracked operation {}", handle);
            return;
        };

        self.observers
            .message_changed(&format!("Receiving data from {}…", display_host(&request.url)));

        let previous = request.bytes_received;
        request.bytes_received = received;

        if let Some(total) = total.filter(|total| *total > 0) {
            if !request.total_announced {
                request.total_announced = true;
                self.statistics.bytes_total = self.statistics.bytes_total.saturating_add(total);
            }
        }

        if received > previous {
            let difference = received - previous;
            self.statistics.bytes_received = self.statistics.bytes_received.saturating_add(difference);
            self.bytes_since_tick = self.bytes_since_tick.saturating_add(difference);
        }
    }

    /// Completion, successful or not. Returns whether the operation was
    /// tracked.
    pub fn on_finished(&mut self, handle: OperationHandle) -> bool {
        let Some(request) = self.requests.shift_remove(&handle) else {
            trace!("Ignoring completion of untracked operation {}", handle);
            return false;
        };

        self.statistics.finished_requests += 1;

        if self.requests.is_empty() {
            self.update_status();
            self.cancel_timer();
        }

        self.observers
            .message_changed(&format!("Completed request to {}", display_host(&request.url)));
        true
    }

    /// Periodic recomputation. Ticks from a cancelled timer are ignored.
    pub fn on_tick(&mut self, id: TimerId) -> bool {
        if self.timer != Some(id) {
            trace!("Ignoring stale status tick {:?}", id);
            return false;
        }
        self.update_status();
        true
    }

    /// Forget everything, as when a new navigation begins.
    pub fn reset(&mut self) {
        self.update_status();
        self.cancel_timer();

        self.requests.clear();
        self.primary = None;
        self.statistics = TransferStatistics::default();
        self.bytes_since_tick = 0;
    }

    fn update_status(&mut self) {
        let interval_ms = self.interval.as_millis().max(1) as u64;
        self.statistics.speed = self.bytes_since_tick.saturating_mul(1000) / interval_ms;
        self.bytes_since_tick = 0;

        self.observers.status_changed(&self.statistics);
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            self.ticker.cancel(timer);
        }
    }
}

impl Drop for TransferTracker {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingObserver;
    use crate::timer::ManualTicker;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn setup() -> (TransferTracker, Arc<ManualTicker>, Arc<RecordingObserver>) {
        let ticker = Arc::new(ManualTicker::new());
        let observers = Arc::new(Observers::new());
        let observer = Arc::new(RecordingObserver::default());
        observers.subscribe(observer.clone());
        let tracker = TransferTracker::new(ticker.clone(), Duration::from_millis(500), observers);
        (tracker, ticker, observer)
    }

    #[test]
    fn test_two_operations_aggregate() {
        let (mut tracker, ticker, _) = setup();
        let a = OperationHandle(1);
        let b = OperationHandle(2);

        for (handle, path) in [(a, "a"), (b, "b")] {
            tracker.request_started();
            tracker.track(handle, url(&format!("https://example.com/{}", path)));
        }
        assert_eq!(ticker.active().len(), 1);

        tracker.on_progress(a, 200, Some(1000), false);
        tracker.on_progress(a, 500, Some(1000), false);
        tracker.on_progress(b, 200, Some(400), false);
        tracker.on_finished(a);
        tracker.on_finished(b);

        let stats = tracker.statistics();
        assert_eq!(stats.bytes_received, 700);
        assert_eq!(stats.bytes_total, 1400);
        assert_eq!(stats.finished_requests, 2);
        assert_eq!(stats.started_requests, 2);
        assert!(ticker.active().is_empty());
    }

    #[test]
    fn test_negative_delta_ignored() {
        let (mut tracker, _, _) = setup();
        let handle = OperationHandle(1);
        tracker.track(handle, url("https://example.com/"));

        tracker.on_progress(handle, 300, None, false);
        tracker.on_progress(handle, 100, None, false);
        tracker.on_progress(handle, 150, None, false);

        assert_eq!(tracker.statistics().bytes_received, 350);
        assert_eq!(tracker.statistics().bytes_total, 0);
    }

    #[test]
    fn test_oversized_lengths_saturate() {
        let (mut tracker, ticker, _) = setup();
        let a = OperationHandle(1);
        let b = OperationHandle(2);
        tracker.track(a, url("https://example.com/huge"));
        tracker.track(b, url("https://example.com/small"));

        tracker.on_progress(a, u64::MAX, Some(u64::MAX), false);
        tracker.on_progress(b, 2, Some(2), false);

        let stats = tracker.statistics();
        assert_eq!(stats.bytes_total, u64::MAX);
        assert_eq!(stats.bytes_received, u64::MAX);

        assert!(tracker.on_tick(ticker.active()[0]));
        assert_eq!(tracker.statistics().speed, u64::MAX / 500);
    }

    #[test]
    fn test_speed_per_tick() {
        let (mut tracker, ticker, observer) = setup();
        let handle = OperationHandle(1);
        tracker.track(handle, url("https://example.com/"));
        let timer = ticker.active()[0];

        tracker.on_progress(handle, 1024, Some(4096), false);
        assert!(tracker.on_tick(timer));
        assert_eq!(tracker.statistics().speed, 2048);

        assert!(tracker.on_tick(timer));
        assert_eq!(tracker.statistics().speed, 0);
        assert_eq!(observer.statuses().len(), 2);
    }

    #[test]
    fn test_stale_tick_ignored() {
        let (mut tracker, ticker, observer) = setup();
        let handle = OperationHandle(1);
        tracker.track(handle, url("https://example.com/"));
        let timer = ticker.active()[0];
        tracker.on_finished(handle);

        let before = observer.statuses().len();
        assert!(!tracker.on_tick(timer));
        assert_eq!(observer.statuses().len(), before);
    }

    #[test]
    fn test_single_recompute_when_set_empties() {
        let (mut tracker, ticker, observer) = setup();
        tracker.track(OperationHandle(1), url("https://example.com/a"));
        tracker.track(OperationHandle(2), url("https://example.com/b"));

        tracker.on_finished(OperationHandle(1));
        assert!(observer.statuses().is_empty());

        tracker.on_finished(OperationHandle(2));
        assert_eq!(observer.statuses().len(), 1);
        assert!(ticker.active().is_empty());
        assert_eq!(tracker.timer(), None);
    }

    #[test]
    fn test_primary_progress_and_redirect() {
        let (mut tracker, _, observer) = setup();
        let primary = OperationHandle(1);
        let image = OperationHandle(2);
        assert!(tracker.track(primary, url("https://example.com/")));
        assert!(!tracker.track(image, url("https://example.com/logo.png")));

        tracker.on_progress(primary, 50, Some(200), false);
        tracker.on_progress(primary, 60, None, false);
        tracker.on_progress(image, 10, Some(20), false);
        assert_eq!(
            observer.progress(),
            vec![LoadProgress::Percent(25), LoadProgress::Indeterminate]
        );

        tracker.on_progress(primary, 70, Some(200), true);
        assert_eq!(tracker.primary(), None);
        assert_eq!(observer.progress().len(), 2);

        // A request tracked after the redirect becomes primary.
        assert!(tracker.track(OperationHandle(3), url("https://www.example.com/")));
    }

    #[test]
    fn test_messages_use_localhost_for_files() {
        let (mut tracker, _, observer) = setup();
        let handle = OperationHandle(1);
        tracker.track(handle, url("file:///tmp/a.txt"));
        tracker.on_progress(handle, 10, Some(10), false);
        tracker.on_finished(handle);

        assert_eq!(
            observer.messages(),
            vec!["Receiving data from localhost…", "Completed request to localhost"]
        );
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let (mut tracker, ticker, observer) = setup();
        tracker.request_started();
        tracker.track(OperationHandle(1), url("https://example.com/"));
        tracker.on_progress(OperationHandle(1), 100, Some(300), false);

        tracker.reset();

        assert_eq!(tracker.statistics(), TransferStatistics::default());
        assert_eq!(tracker.in_flight(), 0);
        assert_eq!(tracker.primary(), None);
        assert!(ticker.active().is_empty());
        assert_eq!(observer.statuses().len(), 1);

        // Late notifications for the old operation are ignored.
        tracker.on_progress(OperationHandle(1), 200, Some(300), false);
        assert!(!tracker.on_finished(OperationHandle(1)));
        assert_eq!(tracker.statistics(), TransferStatistics::default());
    }

    #[test]
    fn test_statistics_serialize() {
        let stats = TransferStatistics {
            finished_requests: 1,
            started_requests: 2,
            bytes_received: 3,
            bytes_total: 4,
            speed: 5,
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["bytes_total"], 4);
        assert_eq!(json["speed"], 5);
    }

    #[test]
    fn test_drop_cancels_timer() {
        let (mut tracker, ticker, _) = setup();
        tracker.track(OperationHandle(1), url("https://example.com/"));
        drop(tracker);
        assert!(ticker.active().is_empty());
    }
}
