//! In-process counters (metrics export is not wired up)

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    qr_generated: AtomicU64,
    uploads_enqueued: AtomicU64,
    uploads_dropped: AtomicU64,
    uploads_succeeded: AtomicU64,
    uploads_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn qr_generated(&self) {
        self.qr_generated.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "qr_generated", "Metric incremented");
    }

    pub fn upload_enqueued(&self) {
        self.uploads_enqueued.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "uploads_enqueued", "Metric incremented");
    }

    /// Upload never reached a worker
    pub fn upload_dropped(&self) {
        self.uploads_dropped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "uploads_dropped", "Metric incremented");
    }

    pub fn upload_succeeded(&self) {
        self.uploads_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "uploads_succeeded", "Metric incremented");
    }

    pub fn upload_failed(&self) {
        self.uploads_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "uploads_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            qr_generated: self.qr_generated.load(Ordering::Relaxed),
            uploads_enqueued: self.uploads_enqueued.load(Ordering::Relaxed),
            uploads_dropped: self.uploads_dropped.load(Ordering::Relaxed),
            uploads_succeeded: self.uploads_succeeded.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub qr_generated: u64,
    pub uploads_enqueued: u64,
    pub uploads_dropped: u64,
    pub uploads_succeeded: u64,
    pub uploads_failed: u64,
}
