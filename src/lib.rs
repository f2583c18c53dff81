//! # treepack
//!
//! Browse a directory hierarchy through a lazily loaded, thread-safe cache and
//! export any subtree as a zip archive built by a parallel reader pool.
//!
//! ## Key Modules
//!
//! - [`cache`]: the navigation cache (cursor, listing, search).
//! - [`tree`]: the node arena and the one-shot lazy-load algorithm behind the cache.
//! - [`export`]: planner, worker pool and writer of the archive pipeline.
//! - [`progress`]: progress reporting for exports.
//! - [`common`]: entry metadata shared by both halves.
//!
//! ## Examples
//!
//! ```no_run
//! use treepack::{export_archive, NavigationCache};
//!
//! let cache = NavigationCache::new("/srv/data")?;
//! for entry in cache.search("report") {
//!     println!("{}", entry.name());
//! }
//! export_archive("/srv/data/reports", "/tmp/reports.zip", 4)?;
//! # Ok::<(), treepack::Error>(())
//! ```

pub mod cache;
pub mod cli;
pub mod common;
pub mod error;
pub mod export;
pub mod progress;
pub mod tree;

pub use cache::{CacheOptions, Listing, NavigationCache, NodeRef};
pub use common::EntryMetadata;
pub use error::{Error, Result};
pub use export::{export_archive, ExportOptions, ExportSummary, Exporter};
pub use tree::{NodeId, SortOrder};
