use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct BridgeMetrics {
    inner: Arc<BridgeMetricsInner>,
}

#[derive(Default)]
struct BridgeMetricsInner {
    delivered: AtomicU64,
    undelivered: AtomicU64,
    timeouts: AtomicU64,
    rejected: AtomicU64,
    backup_writes: AtomicU64,
    backup_evictions: AtomicU64,
}

impl BridgeMetrics {
    pub fn record_delivered(&self) {
        self.inner.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_undelivered(&self, timed_out: bool) {
        self.inner.undelivered.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.inner.timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rejected(&self) {
        self.inner.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backup(&self, evicted: bool) {
        self.inner.backup_writes.fetch_add(1, Ordering::Relaxed);
        if evicted {
            self.inner.backup_evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> BridgeMetricSnapshot {
        BridgeMetricSnapshot {
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            undelivered: self.inner.undelivered.load(Ordering::Relaxed),
            timeouts: self.inner.timeouts.load(Ordering::Relaxed),
            rejected: self.inner.rejected.load(Ordering::Relaxed),
            backup_writes: self.inner.backup_writes.load(Ordering::Relaxed),
            backup_evictions: self.inner.backup_evictions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BridgeMetricSnapshot {
    pub delivered: u64,
    pub undelivered: u64,
    pub timeouts: u64,
    pub rejected: u64,
    pub backup_writes: u64,
    pub backup_evictions: u64,
}
