use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::traits::{
    group_by_delimiter, ListCursor, ListEntry, ListOptions, ObjectAttributes, ObjectReader,
    ObjectStore, VecCursor,
};

/// In-memory object store for tests and demos.
///
/// Keys are kept sorted, so listings come back in lexicographic order like
/// the real stores return them.
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        MemoryStore {
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a store holding the given objects.
    pub fn with_objects<K, V, I>(objects: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let store = Self::new();
        for (key, content) in objects {
            store.put(key, content);
        }
        store
    }

    /// Store `content` under `key`, replacing any previous object.
    pub fn put(&self, key: impl Into<String>, content: impl Into<Vec<u8>>) {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        objects.insert(key.into(), (content.into(), Utc::now()));
    }

    /// Store `content` under `key` with an explicit modification time.
    pub fn put_with_mtime(
        &self,
        key: impl Into<String>,
        content: impl Into<Vec<u8>>,
        modified: DateTime<Utc>,
    ) {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        objects.insert(key.into(), (content.into(), modified));
    }

    /// Remove an object. Returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        objects.remove(key).is_some()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn describe(&self) -> String {
        "mem://".to_string()
    }

    async fn attributes(&self, key: &str) -> Result<ObjectAttributes, StoreError> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        objects
            .get(key)
            .map(|(content, modified)| ObjectAttributes {
                size: content.len() as u64,
                modified: Some(*modified),
            })
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn list(&self, options: ListOptions) -> Result<Box<dyn ListCursor>, StoreError> {
        // Snapshot the matching keys so the cursor holds no lock.
        let matching: Vec<ListEntry> = {
            let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
            objects
                .range(options.prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(&options.prefix))
                .map(|(key, (content, modified))| {
                    ListEntry::object(key.clone(), content.len() as u64, Some(*modified))
                })
                .collect()
        };

        Ok(Box::new(VecCursor::new(group_by_delimiter(&options, matching))))
    }

    async fn open_range_reader(
        &self,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<ObjectReader, StoreError> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        let (content, _) = objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let len = content.len() as u64;
        let start = offset.min(len) as usize;
        let end = offset.saturating_add(length).min(len) as usize;

        Ok(Box::new(Cursor::new(content[start..end].to_vec())))
    }
}
