use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// The primary error type for all operations in the `treepack` crate.
///
/// The enum is `Clone` so that a directory's load error can be stored once in
/// the tree and handed out again on every later listing. Foreign error types
/// are kept behind an `Arc` for that reason.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The filesystem object does not exist.
    #[error("'{}' not found", path.display())]
    NotFound { path: PathBuf },

    /// The filesystem refused access to the object.
    #[error("permission denied on '{}'", path.display())]
    PermissionDenied { path: PathBuf },

    /// Any other I/O failure while reading metadata, listing, reading or writing.
    #[error("I/O error on path '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// An attempt was made to enter an entry that is not a directory.
    #[error("'{name}' is not a directory")]
    NotADirectory { name: String },

    /// A selection index did not refer to an existing child.
    #[error("index {index} is out of range for {len} entries")]
    IndexOutOfRange { index: usize, len: usize },

    /// The cursor is already at the root and cannot ascend.
    #[error("already at root directory")]
    AlreadyAtRoot,

    /// A navigation path that is anchored at a filesystem root or drive
    /// instead of the current directory.
    #[error("'{}' is not relative to the current directory", path.display())]
    NotRelative { path: PathBuf },

    /// A node handle that was not issued by this cache.
    #[error("node #{id} does not belong to this tree")]
    UnknownNode { id: usize },

    /// A directory was listed, but some of its entries could not be stat'ed
    /// and were left out of the tree.
    #[error("{} of the entries under '{}' could not be read", skipped.len(), path.display())]
    PartialLoad { path: PathBuf, skipped: Vec<Error> },

    /// The zip container could not be written.
    #[error("archive error on '{}': {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: Arc<zip::result::ZipError>,
    },

    /// One or more files could not be read while building an archive.
    #[error("{} file(s) could not be read, first failure: {}", failures.len(), failures.first().map(ToString::to_string).unwrap_or_default())]
    ReadFailures { failures: Vec<Error> },

    /// A worker thread panicked while building an archive.
    #[error("an archive worker thread panicked")]
    WorkerPanicked,
}

impl Error {
    /// Classifies an I/O error for `path` into the crate's error kinds.
    pub fn from_io(path: impl AsRef<Path>, err: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound { path },
            io::ErrorKind::PermissionDenied => Error::PermissionDenied { path },
            _ => Error::Io { path, source: Arc::new(err) },
        }
    }

    pub(crate) fn from_zip(path: impl AsRef<Path>, err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io_err) => Error::from_io(path, io_err),
            other => Error::Archive { path: path.as_ref().to_path_buf(), source: Arc::new(other) },
        }
    }

    /// True for the `NotFound` kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_classified_by_kind() {
        let missing = Error::from_io("/nope", io::Error::from(io::ErrorKind::NotFound));
        assert!(missing.is_not_found());

        let denied = Error::from_io("/root/secret", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, Error::PermissionDenied { ref path } if path == Path::new("/root/secret")));

        let other = Error::from_io("/dev/full", io::Error::new(io::ErrorKind::Other, "disk full"));
        assert!(matches!(other, Error::Io { .. }));
        assert!(other.to_string().contains("disk full"));
    }

    #[test]
    fn partial_load_message_counts_entries() {
        let err = Error::PartialLoad {
            path: PathBuf::from("/data"),
            skipped: vec![Error::NotFound { path: PathBuf::from("/data/a") }],
        };
        assert_eq!(err.to_string(), "1 of the entries under '/data' could not be read");
    }
}
