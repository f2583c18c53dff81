//! # Export Pipeline
//!
//! Builds a zip archive from a directory subtree in three stages:
//!
//! 1. [`planner`] walks the source once and produces an ordered job list.
//! 2. [`pool`] reads file contents on a fixed number of worker threads.
//! 3. [`writer`] serializes payloads into the container on the calling thread.
//!
//! Workers hand payloads over a channel bounded to the worker count, so a slow
//! writer holds them back. Payloads arrive in any order; the writer restores
//! planner order before writing, which makes the entry order of the archive
//! independent of scheduling. If any file cannot be read, or writing fails,
//! the partially written archive is removed and the error returned.

pub mod job;
pub mod planner;
pub mod pool;
pub mod writer;

pub use job::{ArchiveJob, Payload};
pub use planner::{plan, plan_excluding};
pub use pool::{WorkerPool, DEFAULT_WORKERS};
pub use writer::{write_archive, ArchiveTotals, ArchiveWriter, ReorderBuffer};

use crate::error::{Error, Result};
use crate::progress::{ProgressCallback, ProgressTracker};
use crossbeam_channel::bounded;
use std::fmt;
use std::fs;
use std::io::{Seek, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Holds all configuration options for an export.
#[derive(Clone)]
pub struct ExportOptions {
    /// Number of reader threads. `0` selects [`DEFAULT_WORKERS`].
    pub workers: usize,
    /// Called with throttled progress snapshots and once at the end.
    pub progress: Option<Arc<ProgressCallback>>,
    pub progress_interval: Duration,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            progress: None,
            progress_interval: Duration::from_millis(100),
        }
    }
}

impl fmt::Debug for ExportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportOptions")
            .field("workers", &self.workers)
            .field("progress", &self.progress.is_some())
            .field("progress_interval", &self.progress_interval)
            .finish()
    }
}

/// What a successful export wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub entries: u64,
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Exports `source` into a new zip archive at `destination` using `workers`
/// reader threads (`0` for the default).
pub fn export_archive(source: impl AsRef<Path>, destination: impl AsRef<Path>, workers: usize) -> Result<ExportSummary> {
    Exporter::new(ExportOptions { workers, ..ExportOptions::default() }).export(source, destination)
}

#[derive(Debug, Clone, Default)]
pub struct Exporter {
    options: ExportOptions,
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Runs planner, pool and writer to completion.
    ///
    /// Planning errors are returned before the destination is touched.
    pub fn export(&self, source: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<ExportSummary> {
        let (source, destination) = (source.as_ref(), destination.as_ref());
        let start = Instant::now();

        let jobs = plan_excluding(source, Some(destination))?;
        let pool = WorkerPool::new(self.options.workers);
        let total_bytes = jobs.iter().map(|j| j.size).sum();
        let tracker = ProgressTracker::new(pool.workers(), jobs.len() as u64, total_bytes, self.options.progress_interval)
            .with_callback(self.options.progress.clone());
        info!(
            source = %source.display(),
            destination = %destination.display(),
            entries = jobs.len(),
            workers = pool.workers(),
            "exporting archive"
        );

        let mut writer = ArchiveWriter::create(destination)?;
        let outcome = stream(&pool, jobs, &mut writer, &tracker).and_then(|()| writer.finish());

        match outcome {
            Ok((_, totals)) => {
                tracker.finish();
                let summary = ExportSummary {
                    entries: totals.entries,
                    files: totals.files,
                    directories: totals.directories,
                    bytes: totals.bytes,
                    elapsed: start.elapsed(),
                };
                info!(entries = summary.entries, bytes = summary.bytes, elapsed = ?summary.elapsed, "archive written");
                Ok(summary)
            }
            Err(err) => {
                discard(destination);
                Err(err)
            }
        }
    }
}

/// Feeds the pool's output into `writer` in planner order.
fn stream<W: Write + Seek>(pool: &WorkerPool, jobs: Vec<ArchiveJob>, writer: &mut ArchiveWriter<W>, tracker: &ProgressTracker) -> Result<()> {
    thread::scope(|s| {
        let (sender, receiver) = bounded::<Result<Payload>>(pool.workers());
        let workers = s.spawn(move || pool.run(jobs, sender, Some(tracker)));

        let mut reorder = ReorderBuffer::new();
        let mut failures = Vec::new();
        for result in receiver {
            tracker.maybe_emit();
            match result {
                // Once something failed the archive is discarded anyway; keep
                // draining so workers can finish, but stop buffering content.
                Ok(_) if !failures.is_empty() => {}
                Ok(payload) => {
                    reorder.push(payload);
                    while let Some(ready) = reorder.pop_ready() {
                        writer.add(&ready)?;
                    }
                }
                Err(err) => failures.push(err),
            }
        }

        workers.join().map_err(|_| Error::WorkerPanicked)??;
        if !failures.is_empty() {
            return Err(Error::ReadFailures { failures });
        }
        debug_assert_eq!(reorder.pending(), 0);
        debug!(written = writer.totals().entries, "all payloads written");
        Ok(())
    })
}

fn discard(destination: &Path) {
    if let Err(e) = fs::remove_file(destination) {
        warn!(path = %destination.display(), error = %e, "could not remove incomplete archive");
    }
}
