use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    requests_issued: AtomicU64,
    windows_fetched: AtomicU64,
    rows_fetched: AtomicU64,
    retry_count: AtomicU64,
    failure_count: AtomicU64,
}

/// Counters shared by every fetch a client issues.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_issued: u64,
    pub windows_fetched: u64,
    pub rows_fetched: u64,
    pub retry_count: u64,
    pub failure_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_requests(&self, count: u64) {
        self.inner
            .requests_issued
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_windows(&self, count: u64) {
        self.inner
            .windows_fetched
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_rows(&self, count: u64) {
        self.inner.rows_fetched.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failures(&self, count: u64) {
        self.inner.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_issued: self.inner.requests_issued.load(Ordering::Relaxed),
            windows_fetched: self.inner.windows_fetched.load(Ordering::Relaxed),
            rows_fetched: self.inner.rows_fetched.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
            failure_count: self.inner.failure_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let metrics = Metrics::new();
        let other = metrics.clone();

        metrics.increment_rows(10);
        other.increment_rows(5);
        other.increment_retries(1);

        let snap = metrics.snapshot();
        assert_eq!(snap.rows_fetched, 15);
        assert_eq!(snap.retry_count, 1);
        assert_eq!(snap.failure_count, 0);
    }
}
