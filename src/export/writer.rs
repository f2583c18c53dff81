//! Serializes payloads into a zip container.
//!
//! Entries are stored, never compressed: directories as zero-length entries
//! whose name ends in `/`, files verbatim under their relative path.
//!
//! [`ReorderBuffer`] restores planner order but does not bound memory; see
//! its docs.

use super::job::Payload;
use crate::error::{Error, Result};
use chrono::{Datelike, Local, Timelike};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entries at or above this size need zip64 extensions.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Counts of what went into an archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveTotals {
    pub entries: u64,
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// Writes payloads one by one into a zip stream.
pub struct ArchiveWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    path: PathBuf,
    totals: ArchiveTotals,
}

impl ArchiveWriter<BufWriter<File>> {
    /// Creates (or truncates) the archive file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::from_io(path, e))?;
        Ok(Self::new(BufWriter::with_capacity(1024 * 1024, file), path))
    }
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Wraps `inner`; `path` only labels errors.
    pub fn new(inner: W, path: impl Into<PathBuf>) -> Self {
        Self { zip: ZipWriter::new(inner), path: path.into(), totals: ArchiveTotals::default() }
    }

    /// Appends one entry for `payload`.
    pub fn add(&mut self, payload: &Payload) -> Result<()> {
        let options = entry_options(payload);
        if payload.is_dir {
            self.zip.add_directory(payload.entry_name(), options).map_err(|e| Error::from_zip(&self.path, e))?;
            self.totals.directories += 1;
        } else {
            self.zip.start_file(payload.entry_name(), options).map_err(|e| Error::from_zip(&self.path, e))?;
            self.zip.write_all(&payload.content).map_err(|e| Error::from_io(&self.path, e))?;
            self.totals.files += 1;
            self.totals.bytes += payload.original_size;
        }
        self.totals.entries += 1;
        Ok(())
    }

    pub fn totals(&self) -> ArchiveTotals {
        self.totals
    }

    /// Writes the central directory and flushes the underlying stream.
    pub fn finish(mut self) -> Result<(W, ArchiveTotals)> {
        let mut inner = self.zip.finish().map_err(|e| Error::from_zip(&self.path, e))?;
        inner.flush().map_err(|e| Error::from_io(&self.path, e))?;
        Ok((inner, self.totals))
    }
}

/// Writes `payloads`, in iteration order, into a new archive at `destination`.
pub fn write_archive(payloads: impl IntoIterator<Item = Payload>, destination: impl AsRef<Path>) -> Result<ArchiveTotals> {
    let mut writer = ArchiveWriter::create(destination)?;
    for payload in payloads {
        writer.add(&payload)?;
    }
    let (_, totals) = writer.finish()?;
    Ok(totals)
}

fn entry_options(payload: &Payload) -> FileOptions {
    FileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(zip_timestamp(payload.modified))
        .large_file(payload.original_size >= ZIP64_THRESHOLD)
}

/// Local calendar time of `modified`; the zip epoch (1980-01-01) when unknown
/// or not representable.
fn zip_timestamp(modified: Option<SystemTime>) -> zip::DateTime {
    let Some(modified) = modified else {
        return zip::DateTime::default();
    };
    let local: chrono::DateTime<Local> = modified.into();
    u16::try_from(local.year())
        .ok()
        .and_then(|year| {
            zip::DateTime::from_date_and_time(
                year,
                local.month() as u8,
                local.day() as u8,
                local.hour() as u8,
                local.minute() as u8,
                local.second() as u8,
            )
            .ok()
        })
        .unwrap_or_default()
}

/// Puts payloads that arrive out of order back into planner order.
///
/// Payloads are held until every payload with a lower sequence number has
/// been released. Nothing caps how many are held: while one early file is
/// still being read, every later payload the workers finish waits here with
/// its full content in memory, up to the rest of the export in the worst case.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    next: usize,
    pending: BTreeMap<usize, Payload>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, payload: Payload) {
        self.pending.insert(payload.seq, payload);
    }

    /// The next payload in sequence, if it has arrived.
    pub fn pop_ready(&mut self) -> Option<Payload> {
        let payload = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(payload)
    }

    /// Payloads waiting for an earlier one.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
