use std::sync::Arc;

use bucketfs_config::DirectoryPolicy;
use bucketfs_store::{ListOptions, ObjectStore, StoreError};
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::error::CoreError;
use crate::translator::{directory_prefix, is_root, marker_key, path_to_key};

/// What a path resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Attributes of a resolved path.
///
/// Directories carry no meaningful size or modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAttributes {
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl PathAttributes {
    pub fn directory() -> Self {
        PathAttributes {
            kind: EntryKind::Directory,
            size: 0,
            modified: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Decides whether a path names a file, a directory, or nothing.
#[derive(Clone)]
pub struct AttributeResolver {
    store: Arc<dyn ObjectStore>,
    policy: DirectoryPolicy,
}

impl AttributeResolver {
    pub fn new(store: Arc<dyn ObjectStore>, policy: DirectoryPolicy) -> Self {
        AttributeResolver { store, policy }
    }

    pub fn policy(&self) -> DirectoryPolicy {
        self.policy
    }

    /// Resolve `path`.
    ///
    /// An object at the exact key wins over a directory of the same name.
    #[instrument(skip(self))]
    pub async fn resolve(&self, path: &str) -> Result<PathAttributes, CoreError> {
        if is_root(path) {
            return Ok(PathAttributes::directory());
        }

        match self.store.attributes(path_to_key(path)).await {
            Ok(attrs) => {
                return Ok(PathAttributes {
                    kind: EntryKind::File,
                    size: attrs.size,
                    modified: attrs.modified,
                })
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(transport(path, e)),
        }

        match self.store.attributes(&marker_key(path)).await {
            Ok(_) => return Ok(PathAttributes::directory()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(transport(path, e)),
        }

        if self.policy == DirectoryPolicy::Prefix && self.has_children(path).await? {
            return Ok(PathAttributes::directory());
        }

        debug!("no object, marker or children");
        Err(CoreError::NotFound(path.to_string()))
    }

    /// Bounded probe: pull at most one entry below the directory prefix.
    async fn has_children(&self, path: &str) -> Result<bool, CoreError> {
        let mut cursor = self
            .store
            .list(ListOptions::one_level(directory_prefix(path)))
            .await
            .map_err(|e| transport(path, e))?;

        let first = cursor.next().await.map_err(|e| transport(path, e))?;
        Ok(first.is_some())
    }
}

fn transport(path: &str, source: StoreError) -> CoreError {
    warn!(path = %path, error = %source, "store request failed during resolve");
    CoreError::Transport {
        path: path.to_string(),
        source,
    }
}
