//! Turns a source directory into an ordered list of [`ArchiveJob`]s.

use super::job::ArchiveJob;
use crate::error::{Error, Result};
use std::io;
use std::path::{Component, Path};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

/// Walks `source` once and returns one job per entry below it.
///
/// Directories come before their contents and siblings are visited in file
/// name order, so the plan is stable for an unchanged tree. Symbolic links
/// are followed, matching what navigation shows; a dangling link or a link
/// back to an ancestor is a filesystem error. The first such error aborts
/// the walk.
pub fn plan(source: impl AsRef<Path>) -> Result<Vec<ArchiveJob>> {
    plan_excluding(source, None)
}

/// Like [`plan`], but leaves out `exclude` (typically the archive being
/// written, when it lives inside the source tree).
pub fn plan_excluding(source: impl AsRef<Path>, exclude: Option<&Path>) -> Result<Vec<ArchiveJob>> {
    let source = source.as_ref();
    let source = std::path::absolute(source).map_err(|e| Error::from_io(source, e))?;
    let exclude = match exclude {
        Some(p) => Some(std::path::absolute(p).map_err(|e| Error::from_io(p, e))?),
        None => None,
    };

    let mut jobs = Vec::new();
    for entry in WalkDir::new(&source).follow_links(true).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(&source).to_path_buf();
            Error::from_io(path, e.into())
        })?;
        if exclude.as_deref() == Some(entry.path()) {
            continue;
        }
        let relative = entry.path().strip_prefix(&source).map_err(|_| Error::Io {
            path: entry.path().to_path_buf(),
            source: Arc::new(io::Error::new(io::ErrorKind::InvalidInput, "entry lies outside the source tree")),
        })?;
        let metadata = entry.metadata().map_err(|e| {
            let path = entry.path().to_path_buf();
            Error::from_io(&path, e.into())
        })?;

        jobs.push(ArchiveJob {
            seq: jobs.len(),
            source_path: entry.path().to_path_buf(),
            relative_path: to_archive_path(relative),
            is_dir: entry.file_type().is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            modified: metadata.modified().ok(),
        });
    }

    debug!(source = %source.display(), jobs = jobs.len(), "planned archive");
    Ok(jobs)
}

/// Joins the normal components of `relative` with `/`, whatever the host separator.
fn to_archive_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
