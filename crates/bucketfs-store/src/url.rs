use std::path::PathBuf;
use std::sync::Arc;

use bucketfs_config::MountConfig;
use tracing::info;

use crate::error::StoreError;
use crate::fs::FileStore;
use crate::gcs::GcsStore;
use crate::memory::MemoryStore;
use crate::traits::ObjectStore;

/// A parsed bucket URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketUrl {
    /// `gs://bucket[/prefix]`
    Gcs { bucket: String, prefix: String },
    /// `s3://bucket[/prefix]`
    S3 { bucket: String, prefix: String },
    /// `file:///absolute/path`
    File(PathBuf),
    /// `mem://` (an empty in-memory bucket)
    Memory,
}

impl BucketUrl {
    pub fn parse(url: &str) -> Result<Self, StoreError> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| StoreError::InvalidUrl(format!("{}: missing scheme", url)))?;

        match scheme {
            "gs" | "s3" => {
                let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
                if bucket.is_empty() {
                    return Err(StoreError::InvalidUrl(format!("{}: missing bucket name", url)));
                }
                let bucket = bucket.to_string();
                let prefix = prefix.to_string();
                Ok(if scheme == "gs" {
                    BucketUrl::Gcs { bucket, prefix }
                } else {
                    BucketUrl::S3 { bucket, prefix }
                })
            }
            "file" => {
                if !rest.starts_with('/') {
                    return Err(StoreError::InvalidUrl(format!(
                        "{}: file URLs need an absolute path",
                        url
                    )));
                }
                Ok(BucketUrl::File(PathBuf::from(rest)))
            }
            "mem" => Ok(BucketUrl::Memory),
            other => Err(StoreError::Unsupported(other.to_string())),
        }
    }
}

/// Open the bucket named by `url`, using client settings from `config`.
pub async fn open_bucket(url: &str, config: &MountConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    let store: Arc<dyn ObjectStore> = match BucketUrl::parse(url)? {
        BucketUrl::Gcs { bucket, prefix } => Arc::new(GcsStore::new(&bucket, &prefix, &config.gcs)?),
        BucketUrl::S3 { bucket, prefix } => open_s3(&bucket, &prefix, config).await?,
        BucketUrl::File(root) => Arc::new(FileStore::new(root)?),
        BucketUrl::Memory => Arc::new(MemoryStore::new()),
    };

    info!(store = %store.describe(), "opened bucket");
    Ok(store)
}

#[cfg(feature = "s3")]
async fn open_s3(
    bucket: &str,
    prefix: &str,
    config: &MountConfig,
) -> Result<Arc<dyn ObjectStore>, StoreError> {
    Ok(Arc::new(crate::s3::S3Store::new(bucket, prefix, &config.s3).await?))
}

#[cfg(not(feature = "s3"))]
async fn open_s3(
    _bucket: &str,
    _prefix: &str,
    _config: &MountConfig,
) -> Result<Arc<dyn ObjectStore>, StoreError> {
    Err(StoreError::Unsupported(
        "s3 (rebuild with --features s3)".to_string(),
    ))
}
