use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct BusMetrics {
    published: AtomicU64,
    delivered: AtomicU64,
    unregistered: AtomicU64,
    malformed: AtomicU64,
    lagged: AtomicU64,
}

impl BusMetrics {
    pub(crate) fn inc_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_unregistered(&self) {
        self.unregistered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_lagged(&self, skipped: u64) {
        self.lagged.fetch_add(skipped, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BusMetricsSnapshot {
        BusMetricsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            unregistered: self.unregistered.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            lagged: self.lagged.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusMetricsSnapshot {
    pub published: u64,
    pub delivered: u64,
    pub unregistered: u64,
    pub malformed: u64,
    /// Messages skipped because the listener fell behind the channel.
    pub lagged: u64,
}
