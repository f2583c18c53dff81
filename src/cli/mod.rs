use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::tree::SortOrder;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// List a directory, optionally descending into a sub-path first.
    #[command(alias = "ls")]
    List {
        /// Root of the tree to browse.
        #[arg(required = true)]
        root: PathBuf,

        /// Path below the root to descend into, one directory at a time (e.g. `src/bin`).
        #[arg(long)]
        path: Option<PathBuf>,

        /// Order in which entries are shown.
        #[arg(long, value_enum, default_value_t = SortMode::DirsFirst)]
        sort: SortMode,

        /// Only show entries whose name contains this text (case-insensitive).
        #[arg(long)]
        filter: Option<String>,
    },

    /// Export a directory subtree into a zip archive.
    #[command(alias = "x")]
    Export {
        /// Directory whose contents go into the archive.
        #[arg(required = true)]
        source: PathBuf,

        /// The path for the output archive (e.g., backup.zip). Overwritten if it exists.
        #[arg(short, long)]
        output: PathBuf,

        /// Number of reader threads. Falls back to TREEPACK_WORKERS, then to 4. [0 = default]
        #[arg(long)]
        workers: Option<usize>,
    },
}

/// Listing order as chosen on the command line.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum SortMode {
    /// Filesystem enumeration order.
    Native,
    /// By name.
    Name,
    /// Directories first, then files, each by name.
    DirsFirst,
}

impl From<SortMode> for SortOrder {
    fn from(mode: SortMode) -> Self {
        match mode {
            SortMode::Native => SortOrder::Native,
            SortMode::Name => SortOrder::Name,
            SortMode::DirsFirst => SortOrder::DirectoriesFirst,
        }
    }
}

pub const WORKERS_ENV: &str = "TREEPACK_WORKERS";

/// Gets the worker count from the command-line option or the `TREEPACK_WORKERS` environment variable.
///
/// Priority:
/// 1. `--workers` command-line argument.
/// 2. `TREEPACK_WORKERS` environment variable.
/// 3. `0`, which lets the pool pick its default.
pub fn workers_from_opt_or_env(workers_opt: Option<usize>) -> Result<usize, std::num::ParseIntError> {
    if let Some(workers) = workers_opt {
        return Ok(workers);
    }
    match std::env::var(WORKERS_ENV) {
        Ok(value) => value.trim().parse(),
        Err(_) => Ok(0),
    }
}

/// Formats a byte count the way the listing shows it: `512 B`, `1.5 KB`, `3.0 MB`, ...
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, prefix)
}

/// Parses command-line arguments using `clap` and returns the command to execute.
pub fn run() -> Result<Commands, clap::Error> {
    let args = Args::try_parse()?;
    Ok(args.command)
}
