//! Thread-safe navigation over a lazily loaded directory tree.
//!
//! [`NavigationCache`] owns a [`Tree`] and a cursor. Every public operation
//! takes the cache's single mutex for its whole duration, lazy loads
//! included, so navigation is serialized rather than parallel.

use crate::common::{self, EntryMetadata};
use crate::error::{Error, Result};
use crate::tree::{NodeId, SortOrder, Tree};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A handle to one node of a cache's tree, with its metadata attached.
#[derive(Debug, Clone)]
pub struct NodeRef {
    id: NodeId,
    metadata: Arc<EntryMetadata>,
}

impl NodeRef {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn path(&self) -> &Path {
        &self.metadata.path
    }

    pub fn is_dir(&self) -> bool {
        self.metadata.is_dir
    }
}

/// Children of the cursor together with the error recorded when they were loaded.
#[derive(Debug, Clone)]
pub struct Listing {
    pub entries: Vec<NodeRef>,
    /// Sticky: the same error is returned on every listing of this directory.
    pub error: Option<Error>,
}

impl Listing {
    /// Treats any recorded load error, partial ones included, as a failure.
    pub fn into_result(self) -> Result<Vec<NodeRef>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.entries),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    pub sort: SortOrder,
}

struct CacheState {
    tree: Tree,
    cursor: NodeId,
    sort: SortOrder,
}

impl CacheState {
    fn node_ref(&self, id: NodeId) -> NodeRef {
        NodeRef { id, metadata: Arc::clone(self.tree.node(id).metadata()) }
    }

    fn load_cursor(&mut self) {
        self.tree.ensure_loaded(self.cursor, self.sort);
    }

    fn cursor_children(&self) -> Vec<NodeRef> {
        self.tree.node(self.cursor).children().iter().map(|&id| self.node_ref(id)).collect()
    }
}

/// Lazily materialized directory tree plus a "current directory" cursor.
pub struct NavigationCache {
    state: Mutex<CacheState>,
}

impl NavigationCache {
    /// Opens a cache rooted at `root` with default options.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(root, CacheOptions::default())
    }

    pub fn with_options(root: impl AsRef<Path>, options: CacheOptions) -> Result<Self> {
        let metadata = common::read(root)?;
        debug!(root = %metadata.path.display(), sort = ?options.sort, "opened navigation cache");
        Ok(Self {
            state: Mutex::new(CacheState {
                tree: Tree::new(metadata),
                cursor: Tree::ROOT,
                sort: options.sort,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Every mutation leaves the tree consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lists the cursor's children, loading them on first access.
    pub fn list(&self) -> Listing {
        let mut state = self.lock();
        state.load_cursor();
        Listing {
            entries: state.cursor_children(),
            error: state.tree.node(state.cursor).load_error().cloned(),
        }
    }

    /// Moves the cursor into its `index`-th child, which must be a directory.
    pub fn enter(&self, index: usize) -> Result<()> {
        let mut state = self.lock();
        state.load_cursor();
        let children = state.tree.node(state.cursor).children();
        let child = *children.get(index).ok_or(Error::IndexOutOfRange { index, len: children.len() })?;
        let metadata = state.tree.node(child).metadata();
        if !metadata.is_dir {
            return Err(Error::NotADirectory { name: metadata.name.clone() });
        }
        state.cursor = child;
        Ok(())
    }

    /// Moves the cursor into the child directory called `name`.
    pub fn enter_by_name(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        state.load_cursor();
        let cursor = state.cursor;
        let child = state
            .tree
            .node(cursor)
            .children()
            .iter()
            .copied()
            .find(|&id| state.tree.node(id).metadata().name == name)
            .ok_or_else(|| Error::NotFound { path: state.tree.node(cursor).metadata().path.join(name) })?;
        let metadata = state.tree.node(child).metadata();
        if !metadata.is_dir {
            return Err(Error::NotADirectory { name: metadata.name.clone() });
        }
        state.cursor = child;
        Ok(())
    }

    /// Moves the cursor to its parent.
    pub fn up(&self) -> Result<()> {
        let mut state = self.lock();
        let parent = state.tree.node(state.cursor).parent().ok_or(Error::AlreadyAtRoot)?;
        state.cursor = parent;
        Ok(())
    }

    /// Jumps straight to a node obtained earlier from this cache, such as a
    /// search result. Handles issued by another cache are rejected.
    pub fn change_directory(&self, node: &NodeRef) -> Result<()> {
        let mut state = self.lock();
        let owned = state
            .tree
            .get(node.id)
            .is_some_and(|n| Arc::ptr_eq(n.metadata(), &node.metadata));
        if !owned {
            return Err(Error::UnknownNode { id: node.id.index() });
        }
        state.cursor = node.id;
        Ok(())
    }

    /// Case-insensitive substring search over the cursor's direct children.
    ///
    /// An empty query matches everything. Results keep the listing order.
    pub fn search(&self, query: &str) -> Vec<NodeRef> {
        let mut state = self.lock();
        state.load_cursor();
        let needle = query.to_lowercase();
        state
            .tree
            .node(state.cursor)
            .children()
            .iter()
            .filter(|&&id| state.tree.node(id).metadata().name.to_lowercase().contains(&needle))
            .map(|&id| state.node_ref(id))
            .collect()
    }

    /// The node under the cursor.
    /// Follows a relative path from the cursor, one component at a time:
    /// `..` goes up, `.` stays put, and every other part is entered by name.
    ///
    /// On failure the cursor is left where it started.
    pub fn enter_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let start = self.current();
        let walked = path.components().try_for_each(|part| match part {
            Component::Normal(name) => self.enter_by_name(&name.to_string_lossy()),
            Component::ParentDir => self.up(),
            Component::CurDir => Ok(()),
            Component::RootDir | Component::Prefix(_) => Err(Error::NotRelative { path: path.to_path_buf() }),
        });
        if walked.is_err() {
            self.lock().cursor = start.id;
        }
        walked
    }

    pub fn current(&self) -> NodeRef {
        let state = self.lock();
        state.node_ref(state.cursor)
    }

    pub fn root(&self) -> NodeRef {
        self.lock().node_ref(Tree::ROOT)
    }

    pub fn current_path(&self) -> PathBuf {
        self.current().path().to_path_buf()
    }

    /// Nodes from the root down to the cursor.
    pub fn breadcrumbs(&self) -> Vec<NodeRef> {
        let state = self.lock();
        state.tree.ancestry(state.cursor).into_iter().map(|id| state.node_ref(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sorted(root: &Path) -> NavigationCache {
        NavigationCache::with_options(root, CacheOptions { sort: SortOrder::Name }).unwrap()
    }

    #[test]
    fn enter_and_up_move_the_cursor() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs/api")).unwrap();
        let cache = sorted(dir.path());

        cache.enter(0).unwrap();
        assert_eq!(cache.current().name(), "docs");
        cache.enter(0).unwrap();
        assert_eq!(cache.current().name(), "api");
        assert_eq!(
            cache.breadcrumbs().iter().map(|n| n.name().to_string()).collect::<Vec<_>>()[1..],
            ["docs", "api"]
        );

        cache.up().unwrap();
        cache.up().unwrap();
        assert_eq!(cache.current().id(), cache.root().id());
        assert!(matches!(cache.up(), Err(Error::AlreadyAtRoot)));
    }

    #[test]
    fn enter_rejects_bad_indices_without_moving() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("only.txt"), b"x").unwrap();
        let cache = sorted(dir.path());

        match cache.enter(5) {
            Err(Error::IndexOutOfRange { index: 5, len: 1 }) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cache.current().id(), cache.root().id());
    }

    #[test]
    fn enter_path_understands_dot_components() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::create_dir_all(dir.path().join("b/c")).unwrap();
        let cache = NavigationCache::new(dir.path()).unwrap();

        cache.enter_path("a/../b/./c").unwrap();
        assert_eq!(cache.current_path(), dir.path().join("b").join("c"));
        cache.enter_path("../..").unwrap();
        assert_eq!(cache.current_path(), cache.root().path());
    }

    #[test]
    fn failed_enter_path_leaves_cursor_in_place() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        let cache = NavigationCache::new(dir.path()).unwrap();
        cache.enter_by_name("a").unwrap();

        assert!(matches!(cache.enter_path("../../a"), Err(Error::AlreadyAtRoot)));
        assert_eq!(cache.current().name(), "a");
        assert!(cache.enter_path("../missing").unwrap_err().is_not_found());
        assert_eq!(cache.current().name(), "a");
        assert!(matches!(cache.enter_path(dir.path()), Err(Error::NotRelative { .. })));
        assert_eq!(cache.current().name(), "a");
    }

    #[test]
    fn enter_by_name_finds_directories_only() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("README"), b"").unwrap();
        let cache = NavigationCache::new(dir.path()).unwrap();

        assert!(matches!(cache.enter_by_name("README"), Err(Error::NotADirectory { .. })));
        assert!(cache.enter_by_name("missing").unwrap_err().is_not_found());
        cache.enter_by_name("src").unwrap();
        assert_eq!(cache.current_path(), dir.path().join("src"));
    }

    #[test]
    fn handles_from_another_cache_are_rejected() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        let first = sorted(dir.path());
        let second = sorted(dir.path());

        let foreign = first.list().entries.remove(0);
        second.list();
        assert!(matches!(second.change_directory(&foreign), Err(Error::UnknownNode { id: 1 })));
        first.change_directory(&foreign).unwrap();
        assert_eq!(first.current().name(), "a");
    }

    #[test]
    fn cache_is_shareable_across_threads() {
        let dir = tempdir().unwrap();
        for i in 0..8 {
            fs::create_dir(dir.path().join(format!("d{i}"))).unwrap();
        }
        let cache = Arc::new(sorted(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.list().entries.len())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 8);
        }
    }
}
