//! Translation layer between filesystem calls and a flat object store.
//!
//! Nothing here is cached: every call goes to the store.

mod enumerator;
mod error;
mod reader;
mod resolver;
pub mod translator;

use std::sync::Arc;

use bucketfs_config::DirectoryPolicy;
use bucketfs_store::{ObjectStore, StoreError};
use tracing::info;

pub use enumerator::{DirEntry, DirectoryListing};
pub use error::CoreError;
pub use reader::RangeReader;
pub use resolver::{AttributeResolver, EntryKind, PathAttributes};

/// The bucket as a read-only tree of paths.
///
/// Clones share the store connection.
#[derive(Clone)]
pub struct BucketFs {
    store: Arc<dyn ObjectStore>,
    resolver: AttributeResolver,
    reader: RangeReader,
}

impl BucketFs {
    pub fn new(store: Arc<dyn ObjectStore>, policy: DirectoryPolicy) -> Self {
        BucketFs {
            resolver: AttributeResolver::new(store.clone(), policy),
            reader: RangeReader::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn policy(&self) -> DirectoryPolicy {
        self.resolver.policy()
    }

    /// Stat a path.
    pub async fn resolve(&self, path: &str) -> Result<PathAttributes, CoreError> {
        self.resolver.resolve(path).await
    }

    /// Start listing the children of `path`. No store call happens until
    /// the third pull.
    pub fn list_children(&self, path: &str) -> DirectoryListing {
        DirectoryListing::new(self.store.clone(), path)
    }

    pub async fn read_range(&self, path: &str, offset: u64, length: usize) -> Result<Vec<u8>, CoreError> {
        self.reader.read_range(path, offset, length).await
    }

    pub async fn read_into(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<usize, CoreError> {
        self.reader.read_into(path, offset, buf).await
    }

    /// Release the store connection.
    pub async fn close(&self) -> Result<(), StoreError> {
        info!(store = %self.store.describe(), "closing bucket");
        self.store.close().await
    }
}
