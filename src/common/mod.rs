//! Entry metadata shared by the navigation tree and the export pipeline.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Descriptive attributes of one filesystem entry, captured by a single stat.
///
/// Never refreshed: a value describes the entry as it was when it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Final path component, or the whole path for filesystem roots.
    pub name: String,
    /// Absolute path of the entry.
    pub path: PathBuf,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Stats `path` and returns its metadata.
///
/// Symlinks are followed the way `std::fs::metadata` follows them. A relative
/// `path` is made absolute against the current directory without touching the
/// filesystem.
pub fn read(path: impl AsRef<Path>) -> Result<EntryMetadata> {
    let path = path.as_ref();
    let path = std::path::absolute(path).map_err(|e| Error::from_io(path, e))?;
    let md = fs::metadata(&path).map_err(|e| Error::from_io(&path, e))?;

    Ok(EntryMetadata {
        name: display_name(&path),
        is_dir: md.is_dir(),
        size: md.len(),
        modified: md.modified().ok(),
        path,
    })
}

fn display_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.display().to_string(),
    }
}
