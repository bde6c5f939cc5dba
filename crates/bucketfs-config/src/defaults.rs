use crate::types::MountConfig;

const DEFAULT_FS_NAME: &str = "bucketfs";

impl MountConfig {
    /// Apply default inference rules to the configuration.
    /// This mutates the config in place.
    pub fn apply_defaults(&mut self) {
        if self.fuse.fs_name.is_none() {
            self.fuse.fs_name = Some(match self.bucket.as_deref() {
                Some(url) => derive_fs_name(url),
                None => DEFAULT_FS_NAME.to_string(),
            });
        }
    }

    /// Returns a new config with all defaults applied.
    pub fn effective(&self) -> MountConfig {
        let mut config = self.clone();
        config.apply_defaults();
        config
    }

    /// Replace the bucket URL, typically with the one given on the command line.
    pub fn with_bucket(mut self, url: impl Into<String>) -> Self {
        self.bucket = Some(url.into());
        self
    }
}

/// Derive the filesystem name from a bucket URL.
/// `gs://photos/2024` -> "bucketfs:photos"
/// `file:///srv/data` -> "bucketfs:data"
fn derive_fs_name(url: &str) -> String {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let name = if url.starts_with("file://") {
        rest.trim_end_matches('/').rsplit('/').next().unwrap_or("")
    } else {
        rest.split('/').next().unwrap_or("")
    };

    if name.is_empty() {
        DEFAULT_FS_NAME.to_string()
    } else {
        format!("{}:{}", DEFAULT_FS_NAME, name)
    }
}
