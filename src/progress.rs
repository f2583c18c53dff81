//! Progress tracking for archive exports.
//!
//! Each pool worker gets its own [`WorkerMetrics`] so workers never contend on
//! a shared counter; the tracker sums them when a snapshot is requested.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Per-worker counters.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    entries_processed: AtomicU64,
    bytes_read: AtomicU64,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one realized entry and the bytes read for it.
    pub fn record_entry(&self, bytes: u64) {
        self.entries_processed.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn entries_processed(&self) -> u64 {
        self.entries_processed.load(Ordering::Relaxed)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }
}

/// A snapshot of an export in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    pub total_entries: u64,
    pub processed_entries: u64,
    pub total_bytes: u64,
    pub processed_bytes: u64,
    pub elapsed: Duration,
    pub speed_mbps: f32,
    pub percent: f32,
}

pub type ProgressCallback = dyn Fn(ExportProgress) + Send + Sync;

/// Aggregates worker metrics and forwards throttled snapshots to a callback.
pub struct ProgressTracker {
    workers: Vec<Arc<WorkerMetrics>>,
    total_entries: u64,
    total_bytes: u64,
    start: Instant,
    last_emit: Mutex<Instant>,
    interval: Duration,
    callback: Option<Arc<ProgressCallback>>,
}

impl ProgressTracker {
    pub fn new(workers: usize, total_entries: u64, total_bytes: u64, interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            workers: (0..workers).map(|_| Arc::new(WorkerMetrics::new())).collect(),
            total_entries,
            total_bytes,
            start: now,
            last_emit: Mutex::new(now),
            interval,
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: Option<Arc<ProgressCallback>>) -> Self {
        self.callback = callback;
        self
    }

    pub fn worker(&self, id: usize) -> Option<Arc<WorkerMetrics>> {
        self.workers.get(id).cloned()
    }

    pub fn snapshot(&self) -> ExportProgress {
        let (processed_entries, processed_bytes) = self
            .workers
            .iter()
            .fold((0u64, 0u64), |(e, b), m| (e + m.entries_processed(), b + m.bytes_read()));
        let elapsed = self.start.elapsed();

        let speed_mbps = if elapsed.as_secs_f32() > 0.0 {
            (processed_bytes as f32 / (1024.0 * 1024.0)) / elapsed.as_secs_f32()
        } else {
            0.0
        };
        let percent = if self.total_entries > 0 {
            (processed_entries as f32 / self.total_entries as f32 * 100.0).min(100.0)
        } else {
            100.0
        };

        ExportProgress {
            total_entries: self.total_entries,
            processed_entries,
            total_bytes: self.total_bytes,
            processed_bytes,
            elapsed,
            speed_mbps,
            percent,
        }
    }

    /// Emits a snapshot if the callback is set and the interval has passed.
    pub fn maybe_emit(&self) {
        let Some(callback) = &self.callback else { return };
        let now = Instant::now();
        {
            let mut last = self.last_emit.lock().unwrap_or_else(PoisonError::into_inner);
            if now.duration_since(*last) < self.interval {
                return;
            }
            *last = now;
        }
        callback(self.snapshot());
    }

    /// Emits a final snapshot unconditionally.
    pub fn finish(&self) {
        if let Some(callback) = &self.callback {
            callback(self.snapshot());
        }
    }
}
