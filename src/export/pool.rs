//! Fixed-size pool of threads that turn [`ArchiveJob`]s into [`Payload`]s.

use super::job::{ArchiveJob, Payload};
use crate::error::{Error, Result};
use crate::progress::ProgressTracker;
use crossbeam_channel::{unbounded, Sender};
use std::fs;
use std::thread;
use tracing::{debug, warn};

/// Worker count used when none (zero) is configured.
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// A pool of `workers` threads; `0` selects [`DEFAULT_WORKERS`].
    pub fn new(workers: usize) -> Self {
        let workers = if workers == 0 { DEFAULT_WORKERS } else { workers };
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Realizes every job and sends one result per job to `output`, in no
    /// particular order. Directories become marker payloads; files are read
    /// into memory whole.
    ///
    /// Workers share nothing but the job queue and `output`. Returns once
    /// every worker has exited; a panicking worker is reported as
    /// [`Error::WorkerPanicked`]. If `output` is disconnected, workers stop early.
    pub fn run(&self, jobs: Vec<ArchiveJob>, output: Sender<Result<Payload>>, progress: Option<&ProgressTracker>) -> Result<()> {
        let (job_sender, job_receiver) = unbounded::<ArchiveJob>();
        for job in jobs {
            // The receiver is alive right here, so this cannot fail.
            let _ = job_sender.send(job);
        }
        drop(job_sender);

        thread::scope(|s| {
            let handles: Vec<_> = (0..self.workers)
                .map(|worker_id| {
                    let job_receiver = job_receiver.clone();
                    let output = output.clone();
                    let metrics = progress.and_then(|p| p.worker(worker_id));

                    s.spawn(move || {
                        let mut realized = 0usize;
                        for job in job_receiver {
                            let result = realize(&job);
                            if let Some(metrics) = &metrics {
                                let bytes = result.as_ref().map(|p| p.original_size).unwrap_or(0);
                                metrics.record_entry(bytes);
                            }
                            if output.send(result).is_err() {
                                debug!(worker_id, "output closed, worker stopping");
                                break;
                            }
                            realized += 1;
                        }
                        debug!(worker_id, realized, "worker finished");
                    })
                })
                .collect();

            let mut panicked = false;
            for handle in handles {
                panicked |= handle.join().is_err();
            }
            if panicked {
                Err(Error::WorkerPanicked)
            } else {
                Ok(())
            }
        })
    }

    /// Runs the pool to completion and returns the payloads in planner order.
    ///
    /// Every read failure is collected; if there was at least one, the
    /// payloads are discarded and [`Error::ReadFailures`] is returned.
    pub fn read_all(&self, jobs: Vec<ArchiveJob>) -> Result<Vec<Payload>> {
        let (sender, receiver) = unbounded();
        self.run(jobs, sender, None)?;

        let mut payloads = Vec::new();
        let mut failures = Vec::new();
        for result in receiver {
            match result {
                Ok(payload) => payloads.push(payload),
                Err(err) => failures.push(err),
            }
        }
        if !failures.is_empty() {
            return Err(Error::ReadFailures { failures });
        }
        payloads.sort_by_key(|p| p.seq);
        Ok(payloads)
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

fn realize(job: &ArchiveJob) -> Result<Payload> {
    if job.is_dir {
        return Ok(Payload::directory(job));
    }
    match fs::read(&job.source_path) {
        Ok(content) => Ok(Payload::file(job, content)),
        Err(e) => {
            let err = Error::from_io(&job.source_path, e);
            warn!(error = %err, "could not read file for archive");
            Err(err)
        }
    }
}
