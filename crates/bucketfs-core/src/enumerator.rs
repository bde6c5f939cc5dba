use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use bucketfs_store::{ListCursor, ListOptions, ObjectStore, DELIMITER};
use tracing::{debug, error};

use crate::error::CoreError;
use crate::resolver::EntryKind;
use crate::translator::{directory_prefix, key_to_child_name};

/// One child of a directory. Names never contain a separator.
///
/// `kind` is a hint read off the key's shape (a trailing delimiter means a
/// directory); it is not a resolved attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        DirEntry {
            name: name.into(),
            kind,
        }
    }

    fn dot(name: &str) -> Self {
        DirEntry::new(name, EntryKind::Directory)
    }

    /// Whether this is `.` or `..`.
    pub fn is_dot(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

enum ListingState {
    /// Next pull yields `.`.
    SelfDot,
    /// Next pull yields `..`.
    ParentDot,
    /// Dots are out; the cursor has not been opened yet.
    Unopened,
    Open(Box<dyn ListCursor>),
    Exhausted,
    Failed,
}

impl fmt::Debug for ListingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListingState::SelfDot => "SelfDot",
            ListingState::ParentDot => "ParentDot",
            ListingState::Unopened => "Unopened",
            ListingState::Open(_) => "Open",
            ListingState::Exhausted => "Exhausted",
            ListingState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// A lazy, forward-only listing of a directory's children.
///
/// Yields `.` and `..` before touching the store. Each name is yielded at
/// most once: when a key is both an object and a prefix, the object comes
/// first in key order and the prefix is dropped. Once it reports the end
/// or an error it keeps returning `Ok(None)`. The cursor is owned by the
/// listing and released when the listing ends or is dropped.
pub struct DirectoryListing {
    store: Arc<dyn ObjectStore>,
    path: String,
    prefix: String,
    state: ListingState,
    seen: HashSet<String>,
}

impl fmt::Debug for DirectoryListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryListing")
            .field("store", &self.store.describe())
            .field("path", &self.path)
            .field("state", &self.state)
            .finish()
    }
}

impl DirectoryListing {
    pub fn new(store: Arc<dyn ObjectStore>, path: &str) -> Self {
        DirectoryListing {
            store,
            prefix: directory_prefix(path),
            path: path.to_string(),
            state: ListingState::SelfDot,
            seen: HashSet::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the listing has reached `Exhausted` or `Failed`.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, ListingState::Exhausted | ListingState::Failed)
    }

    /// Pull the next child.
    pub async fn next_entry(&mut self) -> Result<Option<DirEntry>, CoreError> {
        loop {
            match &mut self.state {
                ListingState::SelfDot => {
                    self.state = ListingState::ParentDot;
                    return Ok(Some(DirEntry::dot(".")));
                }
                ListingState::ParentDot => {
                    self.state = ListingState::Unopened;
                    return Ok(Some(DirEntry::dot("..")));
                }
                ListingState::Unopened => {
                    match self.store.list(ListOptions::one_level(self.prefix.clone())).await {
                        Ok(cursor) => self.state = ListingState::Open(cursor),
                        Err(source) => {
                            error!(path = %self.path, error = %source, "failed to open listing");
                            self.state = ListingState::Failed;
                            return Err(CoreError::Transport {
                                path: self.path.clone(),
                                source,
                            });
                        }
                    }
                }
                ListingState::Open(cursor) => match cursor.next().await {
                    Ok(Some(entry)) => {
                        let name = match key_to_child_name(&entry.key, &self.prefix) {
                            Some(name) => name,
                            None => {
                                debug!(key = %entry.key, "skipping directory's own marker");
                                continue;
                            }
                        };
                        if !self.seen.insert(name.to_string()) {
                            debug!(key = %entry.key, "skipping prefix shadowed by an object");
                            continue;
                        }

                        let kind = if entry.is_prefix || entry.key.ends_with(DELIMITER) {
                            EntryKind::Directory
                        } else {
                            EntryKind::File
                        };
                        return Ok(Some(DirEntry::new(name, kind)));
                    }
                    Ok(None) => {
                        self.state = ListingState::Exhausted;
                        return Ok(None);
                    }
                    Err(source) => {
                        error!(path = %self.path, error = %source, "listing failed part-way");
                        self.state = ListingState::Failed;
                        return Err(CoreError::Iteration {
                            path: self.path.clone(),
                            source,
                        });
                    }
                },
                ListingState::Exhausted | ListingState::Failed => return Ok(None),
            }
        }
    }

    /// Drain the listing. Fails on the first error, discarding what came before.
    pub async fn collect(mut self) -> Result<Vec<DirEntry>, CoreError> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry().await? {
            entries.push(entry);
        }
        Ok(entries)
    }
}
