//! Inode numbering for the FUSE adapter.
//!
//! The kernel addresses nodes by number, so each path it looks up gets one.
//! The table maps numbers to paths and nothing else: no attributes, sizes
//! or listings live here. Numbers are never reused.
//!
//! Only `lookup` adds entries, and every entry carries the kernel reference
//! that a later `forget` gives back. Readdir never adds entries.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Reserved inode for the root directory.
pub const ROOT_INO: u64 = 1;

/// Set on every number from [`InodeTable::unmapped_ino`]. Table numbers
/// count up from [`ROOT_INO`] and never get near it.
const UNMAPPED_BIT: u64 = 1 << 63;

struct Node {
    path: String,
    /// Outstanding kernel lookups; the node is dropped when this reaches zero.
    lookups: u64,
}

/// Bidirectional path/inode mapping.
pub struct InodeTable {
    path_to_ino: RwLock<HashMap<String, u64>>,
    nodes: RwLock<HashMap<u64, Node>>,
    next_ino: AtomicU64,
}

impl InodeTable {
    /// Create a table holding only the root.
    pub fn new() -> Self {
        let mut path_to_ino = HashMap::new();
        let mut nodes = HashMap::new();
        path_to_ino.insert("/".to_string(), ROOT_INO);
        nodes.insert(
            ROOT_INO,
            Node {
                path: "/".to_string(),
                lookups: 1,
            },
        );

        InodeTable {
            path_to_ino: RwLock::new(path_to_ino),
            nodes: RwLock::new(nodes),
            next_ino: AtomicU64::new(ROOT_INO + 1),
        }
    }

    /// Path for an inode, if the kernel still knows it.
    pub fn get_path(&self, ino: u64) -> Option<String> {
        self.nodes.read().get(&ino).map(|n| n.path.clone())
    }

    /// Inode already assigned to `path`, if any.
    pub fn get_ino(&self, path: &str) -> Option<u64> {
        self.path_to_ino.read().get(path).copied()
    }

    /// Number reported in readdir for a path the kernel has not looked up.
    ///
    /// Stable for a given path and never assigned by the table, so the
    /// kernel can tell entries apart without the table keeping them.
    pub fn unmapped_ino(path: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        hasher.finish() | UNMAPPED_BIT
    }

    /// Inode for `path`, counting one kernel lookup against it.
    pub fn remember(&self, path: &str) -> u64 {
        if let Some(ino) = self.get_ino(path) {
            if let Some(node) = self.nodes.write().get_mut(&ino) {
                node.lookups += 1;
                return ino;
            }
        }

        let mut path_to_ino = self.path_to_ino.write();
        let mut nodes = self.nodes.write();

        // Another thread may have assigned it between the two locks.
        if let Some(&ino) = path_to_ino.get(path) {
            if let Some(node) = nodes.get_mut(&ino) {
                node.lookups += 1;
            }
            return ino;
        }

        let ino = self.next_ino.fetch_add(1, Ordering::Relaxed);
        path_to_ino.insert(path.to_string(), ino);
        nodes.insert(
            ino,
            Node {
                path: path.to_string(),
                lookups: 1,
            },
        );
        ino
    }

    /// The kernel dropped `nlookup` references to `ino`.
    pub fn forget(&self, ino: u64, nlookup: u64) {
        if ino == ROOT_INO {
            return;
        }

        let mut path_to_ino = self.path_to_ino.write();
        let mut nodes = self.nodes.write();
        let remove = match nodes.get_mut(&ino) {
            Some(node) => {
                node.lookups = node.lookups.saturating_sub(nlookup);
                node.lookups == 0
            }
            None => false,
        };
        if remove {
            if let Some(node) = nodes.remove(&ino) {
                path_to_ino.remove(&node.path);
            }
        }
    }

    /// Number of live inodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
