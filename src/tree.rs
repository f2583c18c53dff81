//! Arena-backed directory tree with one-shot lazy loading.
//!
//! Nodes live in a flat `Vec<Node>` and refer to each other by [`NodeId`].
//! A node owns its children through their ids; the parent link is a plain
//! back-index used for ascending only. Nodes are never removed, so an id
//! stays valid for as long as the tree exists.

use crate::common::{self, EntryMetadata};
use crate::error::Error;
use std::fs;
use std::sync::Arc;
use tracing::{debug, warn};

/// Stable handle of a node inside one [`Tree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Order in which a freshly loaded directory's children are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Whatever order the filesystem enumerates entries in.
    #[default]
    Native,
    /// Byte-wise by name.
    Name,
    /// Directories before files, each group by name.
    DirectoriesFirst,
}

impl SortOrder {
    fn apply(self, entries: &mut [EntryMetadata]) {
        match self {
            SortOrder::Native => {}
            SortOrder::Name => entries.sort_by(|a, b| a.name.cmp(&b.name)),
            SortOrder::DirectoriesFirst => {
                entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)))
            }
        }
    }
}

/// Lazy-load state of a node. An unloaded node has no children and no error.
#[derive(Debug, Clone)]
pub enum LoadState {
    Unloaded,
    Loaded { error: Option<Error> },
}

#[derive(Debug)]
pub struct Node {
    metadata: Arc<EntryMetadata>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    state: LoadState,
}

impl Node {
    fn new(metadata: EntryMetadata, parent: Option<NodeId>) -> Self {
        Self {
            metadata: Arc::new(metadata),
            parent,
            children: Vec::new(),
            state: LoadState::Unloaded,
        }
    }

    pub fn metadata(&self) -> &Arc<EntryMetadata> {
        &self.metadata
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, LoadState::Loaded { .. })
    }

    /// Error recorded by the one and only load attempt, if any.
    pub fn load_error(&self) -> Option<&Error> {
        match &self.state {
            LoadState::Loaded { error } => error.as_ref(),
            LoadState::Unloaded => None,
        }
    }
}

/// The node arena. Dropping the tree drops every node.
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub const ROOT: NodeId = NodeId(0);

    pub fn new(root: EntryMetadata) -> Self {
        Self { nodes: vec![Node::new(root, None)] }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Ids handed out by this tree are always in bounds.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Materializes the children of `id` on first call; later calls are no-ops.
    ///
    /// A directory that cannot be listed ends up loaded, empty and carrying the
    /// listing error. Entries that cannot be stat'ed are skipped and reported
    /// together as [`Error::PartialLoad`]. Non-directories are left untouched.
    pub fn ensure_loaded(&mut self, id: NodeId, sort: SortOrder) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        if node.is_loaded() || !node.metadata.is_dir {
            return;
        }
        let dir = node.metadata.path.clone();

        let read_dir = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) => {
                let err = Error::from_io(&dir, e);
                warn!(path = %dir.display(), error = %err, "directory could not be listed");
                self.nodes[id.0].state = LoadState::Loaded { error: Some(err) };
                return;
            }
        };

        let mut entries = Vec::new();
        let mut skipped = Vec::new();
        for entry in read_dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    skipped.push(Error::from_io(&dir, e));
                    continue;
                }
            };
            match common::read(entry.path()) {
                Ok(md) => entries.push(md),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    skipped.push(err);
                }
            }
        }
        sort.apply(&mut entries);

        let first = self.nodes.len();
        for md in entries {
            self.nodes.push(Node::new(md, Some(id)));
        }
        let children: Vec<NodeId> = (first..self.nodes.len()).map(NodeId).collect();
        debug!(path = %dir.display(), children = children.len(), skipped = skipped.len(), "loaded directory");

        let error = (!skipped.is_empty()).then(|| Error::PartialLoad { path: dir, skipped });
        let node = &mut self.nodes[id.0];
        node.children = children;
        node.state = LoadState::Loaded { error };
    }

    /// Ids from the root down to `id`, both included. Empty when `id` is not
    /// part of this tree.
    pub fn ancestry(&self, id: NodeId) -> Vec<NodeId> {
        if self.get(id).is_none() {
            return Vec::new();
        }
        let mut chain = vec![id];
        let mut cur = id;
        while let Some(parent) = self.nodes[cur.0].parent {
            chain.push(parent);
            cur = parent;
        }
        chain.reverse();
        chain
    }
}
