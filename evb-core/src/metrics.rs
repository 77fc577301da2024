//! Lightweight atomic counters for observability.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters for one [`EventBuilder`](crate::builder::EventBuilder), cheap enough to
/// bump on every fragment and read only on demand.
pub struct Metrics {
    pub fragments_accepted: AtomicU64,
    pub fragments_duplicate: AtomicU64,
    pub events_completed: AtomicU64,
    pub events_timed_out: AtomicU64,
    pub results_emitted: AtomicU64,
    pub batches_closed: AtomicU64,
    pub destinations_posted: AtomicU64,
    pub pool_backpressure_events: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            fragments_accepted: AtomicU64::new(0),
            fragments_duplicate: AtomicU64::new(0),
            events_completed: AtomicU64::new(0),
            events_timed_out: AtomicU64::new(0),
            results_emitted: AtomicU64::new(0),
            batches_closed: AtomicU64::new(0),
            destinations_posted: AtomicU64::new(0),
            pool_backpressure_events: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_fragment(&self, accepted: bool) {
        if accepted {
            self.fragments_accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fragments_duplicate.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_completion(&self, timed_out: bool) {
        self.results_emitted.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.events_timed_out.fetch_add(1, Ordering::Relaxed);
        } else {
            self.events_completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_batch_closed(&self, destinations: u64) {
        self.batches_closed.fetch_add(1, Ordering::Relaxed);
        self.destinations_posted.fetch_add(destinations, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_backpressure(&self) {
        self.pool_backpressure_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fragments_accepted: self.fragments_accepted.load(Ordering::Relaxed),
            fragments_duplicate: self.fragments_duplicate.load(Ordering::Relaxed),
            events_completed: self.events_completed.load(Ordering::Relaxed),
            events_timed_out: self.events_timed_out.load(Ordering::Relaxed),
            results_emitted: self.results_emitted.load(Ordering::Relaxed),
            batches_closed: self.batches_closed.load(Ordering::Relaxed),
            destinations_posted: self.destinations_posted.load(Ordering::Relaxed),
            pool_backpressure_events: self.pool_backpressure_events.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub fragments_accepted: u64,
    pub fragments_duplicate: u64,
    pub events_completed: u64,
    pub events_timed_out: u64,
    pub results_emitted: u64,
    pub batches_closed: u64,
    pub destinations_posted: u64,
    pub pool_backpressure_events: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fragments={} dup={} completed={} timed_out={} results={} batches={} posts={} backpressure={}",
            self.fragments_accepted,
            self.fragments_duplicate,
            self.events_completed,
            self.events_timed_out,
            self.results_emitted,
            self.batches_closed,
            self.destinations_posted,
            self.pool_backpressure_events,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let metrics = Metrics::new();
        metrics.record_fragment(true);
        metrics.record_fragment(false);
        metrics.record_completion(false);
        metrics.record_batch_closed(2);
        metrics.record_backpressure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.fragments_accepted, 1);
        assert_eq!(snapshot.fragments_duplicate, 1);
        assert_eq!(snapshot.events_completed, 1);
        assert_eq!(snapshot.destinations_posted, 2);
        assert_eq!(snapshot.pool_backpressure_events, 1);
    }
}
