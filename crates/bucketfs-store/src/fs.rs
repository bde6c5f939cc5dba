use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::traits::{
    group_by_delimiter, ListCursor, ListEntry, ListOptions, ObjectAttributes, ObjectReader,
    ObjectStore, VecCursor, DELIMITER,
};

/// A local directory served as a bucket (`file:///path`).
///
/// Files are objects; every directory counts as a marker object `dir/`.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open the directory at `root`. It must already exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().canonicalize()?;
        if !root.is_dir() {
            return Err(StoreError::InvalidUrl(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(FileStore { root })
    }

    /// Map a key to a path under the root.
    ///
    /// Keys that would escape the root never name a stored object, so they
    /// resolve to `NotFound`.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(key.trim_end_matches('/'));
        for component in rel.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(StoreError::NotFound(key.to_string())),
            }
        }
        Ok(self.root.join(rel))
    }

    /// Collect object keys under `dir` (relative key prefix `base`).
    /// With `recurse` off, subdirectories are reported as markers only.
    async fn walk(&self, dir: PathBuf, base: String, recurse: bool) -> Result<Vec<ListEntry>, StoreError> {
        let mut out = Vec::new();
        let mut pending = vec![(dir, base)];

        while let Some((dir, base)) = pending.pop() {
            let mut read_dir = match fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) if !dir.is_dir() => {
                    debug!(dir = %dir.display(), error = %e, "prefix is not a directory");
                    continue;
                }
                Err(e) => return Err(StoreError::Io(e)),
            };

            while let Some(entry) = read_dir.next_entry().await? {
                let name = match entry.file_name().into_string() {
                    Ok(name) => name,
                    Err(raw) => {
                        debug!(name = ?raw, "skipping non-UTF-8 file name");
                        continue;
                    }
                };
                let metadata = match fs::metadata(entry.path()).await {
                    Ok(m) => m,
                    Err(e) => {
                        debug!(name = %name, error = %e, "skipping unreadable entry");
                        continue;
                    }
                };
                let key = format!("{}{}", base, name);

                if metadata.is_dir() {
                    let marker = format!("{}{}", key, DELIMITER);
                    out.push(ListEntry::object(marker.clone(), 0, modified_of(&metadata)));
                    if recurse {
                        pending.push((entry.path(), marker));
                    }
                } else if metadata.is_file() {
                    out.push(ListEntry::object(key, metadata.len(), modified_of(&metadata)));
                }
            }
        }

        Ok(out)
    }
}

fn modified_of(metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

fn not_found_or_io(key: &str, e: std::io::Error) -> StoreError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Io(e)
    }
}

#[async_trait]
impl ObjectStore for FileStore {
    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }

    #[instrument(skip(self), fields(store = "file", key = %key))]
    async fn attributes(&self, key: &str) -> Result<ObjectAttributes, StoreError> {
        let path = self.resolve(key)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| not_found_or_io(key, e))?;

        let is_marker = key.ends_with(DELIMITER);
        match (is_marker, metadata.is_dir()) {
            (true, true) if !key.trim_end_matches('/').is_empty() => Ok(ObjectAttributes {
                size: 0,
                modified: modified_of(&metadata),
            }),
            (false, false) if metadata.is_file() => Ok(ObjectAttributes {
                size: metadata.len(),
                modified: modified_of(&metadata),
            }),
            _ => Err(StoreError::NotFound(key.to_string())),
        }
    }

    #[instrument(skip(self), fields(store = "file", prefix = %options.prefix))]
    async fn list(&self, options: ListOptions) -> Result<Box<dyn ListCursor>, StoreError> {
        // Start at the deepest directory the prefix fully names.
        let base = match options.prefix.rfind('/') {
            Some(idx) => options.prefix[..=idx].to_string(),
            None => String::new(),
        };
        let dir = match self.resolve(&base) {
            Ok(dir) => dir,
            Err(_) => return Ok(Box::new(VecCursor::new(Vec::new()))),
        };

        let one_level = options.delimiter.as_deref() == Some(DELIMITER);
        let mut entries = self.walk(dir, base, !one_level).await?;
        entries.retain(|e| e.key.starts_with(&options.prefix));
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        debug!(count = entries.len(), "listed directory");
        Ok(Box::new(VecCursor::new(group_by_delimiter(&options, entries))))
    }

    #[instrument(skip(self), fields(store = "file"))]
    async fn open_range_reader(
        &self,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<ObjectReader, StoreError> {
        if key.ends_with(DELIMITER) {
            return Err(StoreError::NotFound(key.to_string()));
        }
        let path = self.resolve(key)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| not_found_or_io(key, e))?;
        if !metadata.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }

        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_io(key, e))?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;

        Ok(Box::new(file.take(length)))
    }
}
