use std::path::PathBuf;
use std::time::SystemTime;

/// One planned archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveJob {
    /// Position in planner order; used to put entries back in that order.
    pub seq: usize,
    pub source_path: PathBuf,
    /// Root-relative, `/`-separated, never `.`.
    pub relative_path: String,
    pub is_dir: bool,
    /// Size reported by the walk; only used for progress totals.
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// A job after the worker pool realized it: directory marker or file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub seq: usize,
    pub relative_path: String,
    pub is_dir: bool,
    /// Empty for directories.
    pub content: Vec<u8>,
    pub original_size: u64,
    pub modified: Option<SystemTime>,
}

impl Payload {
    pub fn directory(job: &ArchiveJob) -> Self {
        Self {
            seq: job.seq,
            relative_path: job.relative_path.clone(),
            is_dir: true,
            content: Vec::new(),
            original_size: 0,
            modified: job.modified,
        }
    }

    pub fn file(job: &ArchiveJob, content: Vec<u8>) -> Self {
        Self {
            seq: job.seq,
            relative_path: job.relative_path.clone(),
            is_dir: false,
            original_size: content.len() as u64,
            content,
            modified: job.modified,
        }
    }

    /// Entry name inside the archive; directories carry a trailing `/`.
    pub fn entry_name(&self) -> String {
        if self.is_dir {
            format!("{}/", self.relative_path)
        } else {
            self.relative_path.clone()
        }
    }
}
