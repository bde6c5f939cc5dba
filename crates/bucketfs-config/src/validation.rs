use crate::types::MountConfig;
use crate::ConfigError;

/// URL schemes a bucket may be opened with.
pub const SUPPORTED_SCHEMES: &[&str] = &["gs", "s3", "file", "mem"];

impl MountConfig {
    /// Validate the configuration and return a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if let Some(url) = &self.bucket {
            if let Err(e) = validate_bucket_url(url) {
                errors.push(e);
            }
        }

        if self.runtime.worker_threads == 0 {
            errors.push(ConfigError::InvalidConfig(
                "runtime.worker_threads must be at least 1".to_string(),
            ));
        }

        if let Some(name) = &self.fuse.fs_name {
            if name.is_empty() || name.contains(|c: char| c == ',' || c.is_whitespace()) {
                errors.push(ConfigError::InvalidConfig(format!(
                    "fuse.fs_name '{}' must be non-empty and contain no commas or whitespace",
                    name
                )));
            }
        }

        for option in &self.fuse.options {
            if option.trim().is_empty() {
                errors.push(ConfigError::InvalidMountOption(option.clone()));
            }
            if matches!(option.trim(), "rw" | "suid" | "dev") {
                errors.push(ConfigError::InvalidMountOption(format!(
                    "{} (the mount is always read-only)",
                    option
                )));
            }
        }

        for (field, endpoint) in [
            ("gcs.endpoint", &self.gcs.endpoint),
            ("s3.endpoint", &self.s3.endpoint),
        ] {
            if let Some(endpoint) = endpoint {
                if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                    errors.push(ConfigError::InvalidConfig(format!(
                        "{} must be an http(s) URL, got '{}'",
                        field, endpoint
                    )));
                }
            }
        }

        if self.s3.access_key_id.is_some() != self.s3.secret_access_key.is_some() {
            errors.push(ConfigError::InvalidConfig(
                "s3.access_key_id and s3.secret_access_key must be set together".to_string(),
            ));
        }

        errors
    }

    /// Validate and return Ok(()) if valid, or Err with the first error.
    pub fn validate_or_err(&self) -> Result<(), ConfigError> {
        match self.validate().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Check that a bucket URL has a supported scheme and names a bucket.
pub fn validate_bucket_url(url: &str) -> Result<(), ConfigError> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| ConfigError::InvalidBucketUrl(url.to_string(), "missing scheme".to_string()))?;

    if !SUPPORTED_SCHEMES.contains(&scheme) {
        return Err(ConfigError::InvalidBucketUrl(
            url.to_string(),
            format!("unsupported scheme '{}'", scheme),
        ));
    }

    match scheme {
        "gs" | "s3" if rest.split('/').next().unwrap_or("").is_empty() => Err(
            ConfigError::InvalidBucketUrl(url.to_string(), "missing bucket name".to_string()),
        ),
        "file" if !rest.starts_with('/') => Err(ConfigError::InvalidBucketUrl(
            url.to_string(),
            "file URLs need an absolute path".to_string(),
        )),
        _ => Ok(()),
    }
}
