#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bucketfs_store::{
    ListCursor, ListEntry, ListOptions, MemoryStore, ObjectAttributes, ObjectReader, ObjectStore,
    StoreError,
};

/// Fault switches for [`FaultyStore`].
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// Every `attributes` call fails with a transport error.
    pub fail_attributes: bool,
    /// Cursors fail after yielding this many entries.
    pub fail_list_after: Option<usize>,
}

/// Counts of store calls and cursors still alive.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub attributes: AtomicUsize,
    pub lists: AtomicUsize,
    pub reads: AtomicUsize,
    pub open_cursors: AtomicUsize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.attributes.load(Ordering::SeqCst)
            + self.lists.load(Ordering::SeqCst)
            + self.reads.load(Ordering::SeqCst)
    }
}

/// A store wrapper that counts calls and injects faults.
pub struct FaultyStore {
    inner: MemoryStore,
    config: FaultConfig,
    counts: Arc<CallCounts>,
}

impl FaultyStore {
    pub fn new(objects: &[(&str, &str)], config: FaultConfig) -> Self {
        FaultyStore {
            inner: MemoryStore::with_objects(objects.iter().copied()),
            config,
            counts: Arc::new(CallCounts::default()),
        }
    }

    /// A store that only counts.
    pub fn counting(objects: &[(&str, &str)]) -> Self {
        Self::new(objects, FaultConfig::default())
    }

    pub fn counts(&self) -> Arc<CallCounts> {
        self.counts.clone()
    }
}

fn injected(operation: &str) -> StoreError {
    StoreError::transport(operation, "[fault-injected] connection reset")
}

struct FaultyCursor {
    inner: Box<dyn ListCursor>,
    yielded: usize,
    fail_after: Option<usize>,
    counts: Arc<CallCounts>,
}

#[async_trait]
impl ListCursor for FaultyCursor {
    async fn next(&mut self) -> Result<Option<ListEntry>, StoreError> {
        if self.fail_after == Some(self.yielded) {
            return Err(injected("list"));
        }
        let entry = self.inner.next().await?;
        if entry.is_some() {
            self.yielded += 1;
        }
        Ok(entry)
    }
}

impl Drop for FaultyCursor {
    fn drop(&mut self) {
        self.counts.open_cursors.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    fn describe(&self) -> String {
        "faulty+mem://".to_string()
    }

    async fn attributes(&self, key: &str) -> Result<ObjectAttributes, StoreError> {
        self.counts.attributes.fetch_add(1, Ordering::SeqCst);
        if self.config.fail_attributes {
            return Err(injected("attributes"));
        }
        self.inner.attributes(key).await
    }

    async fn list(&self, options: ListOptions) -> Result<Box<dyn ListCursor>, StoreError> {
        self.counts.lists.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.list(options).await?;
        self.counts.open_cursors.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FaultyCursor {
            inner,
            yielded: 0,
            fail_after: self.config.fail_list_after,
            counts: self.counts.clone(),
        }))
    }

    async fn open_range_reader(
        &self,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<ObjectReader, StoreError> {
        self.counts.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.open_range_reader(key, offset, length).await
    }
}
