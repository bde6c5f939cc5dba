use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

use crate::error::StoreError;

/// Delimiter used to emulate one level of directory nesting.
pub const DELIMITER: &str = "/";

/// Attributes of a single object, as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectAttributes {
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, when the store reports one.
    pub modified: Option<DateTime<Utc>>,
}

/// One item yielded by a listing cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Full key, relative to the bucket (or its configured scope).
    pub key: String,
    /// Size in bytes (0 for collapsed prefixes).
    pub size: u64,
    /// Last modification time, when known.
    pub modified: Option<DateTime<Utc>>,
    /// Whether this entry is a common prefix collapsed by the delimiter.
    pub is_prefix: bool,
}

impl ListEntry {
    /// Create an entry for an object.
    pub fn object(key: impl Into<String>, size: u64, modified: Option<DateTime<Utc>>) -> Self {
        ListEntry {
            key: key.into(),
            size,
            modified,
            is_prefix: false,
        }
    }

    /// Create an entry for a collapsed common prefix. The key ends with the delimiter.
    pub fn prefix(key: impl Into<String>) -> Self {
        ListEntry {
            key: key.into(),
            size: 0,
            modified: None,
            is_prefix: true,
        }
    }
}

/// Options for a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only keys starting with this prefix are listed.
    pub prefix: String,
    /// When set, keys containing the delimiter after the prefix collapse into one prefix entry.
    pub delimiter: Option<String>,
}

impl ListOptions {
    /// List one level below `prefix`, grouping deeper keys by [`DELIMITER`].
    pub fn one_level(prefix: impl Into<String>) -> Self {
        ListOptions {
            prefix: prefix.into(),
            delimiter: Some(DELIMITER.to_string()),
        }
    }

    /// List every key below `prefix`.
    pub fn recursive(prefix: impl Into<String>) -> Self {
        ListOptions {
            prefix: prefix.into(),
            delimiter: None,
        }
    }
}

/// A forward-only listing handle.
///
/// `Ok(None)` means the listing is exhausted. An `Err` means the listing
/// failed; callers must not treat it as the end of the listing.
/// Dropping the cursor releases whatever it holds.
#[async_trait]
pub trait ListCursor: Send {
    /// Pull the next entry.
    async fn next(&mut self) -> Result<Option<ListEntry>, StoreError>;
}

/// A byte stream over part of an object. Dropping it closes the stream.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// The operations bucketfs needs from an object store.
///
/// Implementations must be safe to share between concurrent callers.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Short human-readable description, used in logs.
    fn describe(&self) -> String;

    /// Fetch the attributes of the object stored at `key`.
    async fn attributes(&self, key: &str) -> Result<ObjectAttributes, StoreError>;

    /// Open a listing cursor.
    async fn list(&self, options: ListOptions) -> Result<Box<dyn ListCursor>, StoreError>;

    /// Open a reader over at most `length` bytes of `key` starting at `offset`.
    ///
    /// An offset at or past the end of the object yields an empty stream.
    async fn open_range_reader(
        &self,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<ObjectReader, StoreError>;

    /// Release the connection. Called once at shutdown.
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A cursor over entries that were already fetched in one go.
pub struct VecCursor {
    entries: std::vec::IntoIter<ListEntry>,
}

impl VecCursor {
    pub fn new(entries: Vec<ListEntry>) -> Self {
        VecCursor {
            entries: entries.into_iter(),
        }
    }
}

#[async_trait]
impl ListCursor for VecCursor {
    async fn next(&mut self) -> Result<Option<ListEntry>, StoreError> {
        Ok(self.entries.next())
    }
}

/// Group `keys` (sorted, each starting with `options.prefix`) into list entries.
///
/// Keys with a delimiter after the prefix collapse into a single prefix entry,
/// emitted once, in key order.
pub fn group_by_delimiter<I>(options: &ListOptions, keys: I) -> Vec<ListEntry>
where
    I: IntoIterator<Item = ListEntry>,
{
    let mut out: Vec<ListEntry> = Vec::new();

    for entry in keys {
        let rest = match entry.key.strip_prefix(options.prefix.as_str()) {
            Some(rest) => rest,
            None => continue,
        };

        let collapsed = options
            .delimiter
            .as_deref()
            .filter(|d| !d.is_empty())
            .and_then(|d| rest.find(d).map(|idx| idx + d.len()))
            .map(|end| format!("{}{}", options.prefix, &rest[..end]));

        match collapsed {
            Some(prefix) => {
                if out.last().map(|e| e.key.as_str()) != Some(prefix.as_str()) {
                    out.push(ListEntry::prefix(prefix));
                }
            }
            None => out.push(entry),
        }
    }

    out
}
