mod defaults;
mod env;
pub mod types;
mod validation;

use std::path::Path;

pub use types::*;
pub use validation::{validate_bucket_url, SUPPORTED_SCHEMES};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing environment variables: {0:?}")]
    MissingEnvVars(Vec<String>),

    #[error("Invalid bucket URL '{0}': {1}")]
    InvalidBucketUrl(String, String),

    #[error("Invalid mount option: {0}")]
    InvalidMountOption(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MountConfig {
    /// Parse a mount configuration from a YAML string.
    /// Environment variables in the format `${VAR_NAME}` will be interpolated.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let interpolated = env::interpolate_env(yaml)?;

        // An empty or comment-only file means "all defaults".
        if interpolated.lines().all(|l| l.trim().is_empty() || l.trim_start().starts_with('#')) {
            return Ok(MountConfig::default());
        }

        let config: MountConfig = serde_yaml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Load a mount configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
