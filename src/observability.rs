//! Counters for store activity
//!
//! Plain atomics with a `tracing` event per increment; snapshots are cheap to
//! take and serialisable for `fsstore info`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Store level counters.
#[derive(Debug, Default)]
pub struct Metrics {
    appends: AtomicU64,
    append_failures: AtomicU64,
    trimmed: AtomicU64,
    misses: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn appended(&self) {
        self.appends.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "appends", "Metric incremented");
    }

    pub fn append_failed(&self) {
        self.append_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "append_failures", "Metric incremented");
    }

    pub fn trimmed(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.trimmed.fetch_add(count, Ordering::Relaxed);
        tracing::debug!(counter = "trimmed", count, "Metric incremented");
    }

    pub fn missed(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "misses", "Metric incremented");
    }

    pub fn snapshot(&self, head: SpinSnapshot, tail: SpinSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            appends: self.appends.load(Ordering::Relaxed),
            append_failures: self.append_failures.load(Ordering::Relaxed),
            trimmed: self.trimmed.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            head,
            tail,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub appends: u64,
    pub append_failures: u64,
    pub trimmed: u64,
    pub misses: u64,
    pub head: SpinSnapshot,
    pub tail: SpinSnapshot,
}

/// Contention counters of one transactional value.
#[derive(Debug, Default)]
pub struct SpinStats {
    updates: AtomicU64,
    spins: AtomicU64,
    max_spins: AtomicU64,
    helped: AtomicU64,
    stale_reads: AtomicU64,
}

impl SpinStats {
    /// An update of ours committed after `spins` tries.
    pub fn updated(&self, spins: u64) {
        self.updates.fetch_add(1, Ordering::Relaxed);
        self.spins.fetch_add(spins, Ordering::Relaxed);
        self.max_spins.fetch_max(spins, Ordering::Relaxed);
    }

    pub fn helped(&self) {
        self.helped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "helped", "Metric incremented");
    }

    pub fn stale_read(&self) {
        self.stale_reads.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "stale_reads", "Metric incremented");
    }

    pub fn snapshot(&self) -> SpinSnapshot {
        SpinSnapshot {
            updates: self.updates.load(Ordering::Relaxed),
            spins: self.spins.load(Ordering::Relaxed),
            max_spins: self.max_spins.load(Ordering::Relaxed),
            helped: self.helped.load(Ordering::Relaxed),
            stale_reads: self.stale_reads.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpinSnapshot {
    pub updates: u64,
    pub spins: u64,
    pub max_spins: u64,
    pub helped: u64,
    pub stale_reads: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spin_stats() {
        let stats = SpinStats::default();
        stats.updated(1);
        stats.updated(7);
        stats.helped();
        stats.stale_read();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.updates, 2);
        assert_eq!(snapshot.spins, 8);
        assert_eq!(snapshot.max_spins, 7);
        assert_eq!(snapshot.helped, 1);
        assert_eq!(snapshot.stale_reads, 1);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = Metrics::new();
        metrics.appended();
        metrics.appended();
        metrics.append_failed();
        metrics.trimmed(0);
        metrics.trimmed(3);
        metrics.missed();

        let snapshot = metrics.snapshot(SpinSnapshot::default(), SpinSnapshot::default());
        assert_eq!(snapshot.appends, 2);
        assert_eq!(snapshot.append_failures, 1);
        assert_eq!(snapshot.trimmed, 3);
        assert_eq!(snapshot.misses, 1);
    }
}
