use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a stat of a path decides whether it names a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryPolicy {
    /// Only an explicit marker object (`key/`) makes a directory visible to stat.
    Marker,
    /// Fall back to a one-entry prefix listing when no marker exists.
    #[default]
    Prefix,
}

/// Human-readable duration (e.g., "200ms", "5m", "1h", "1d").
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HumanDuration(pub std::time::Duration);

impl HumanDuration {
    pub fn as_duration(&self) -> std::time::Duration {
        self.0
    }
}

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("Duration is missing a unit: {}", s))?;
        let (num_str, unit) = s.split_at(split);

        let num: u64 = num_str
            .parse()
            .map_err(|_| format!("Invalid number in duration: {}", s))?;

        let secs_per_unit = match unit {
            "ms" => return Ok(HumanDuration(std::time::Duration::from_millis(num))),
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            "d" => 86400,
            _ => return Err(format!("Unknown duration unit: {}", unit)),
        };
        let secs = num
            .checked_mul(secs_per_unit)
            .ok_or_else(|| format!("Duration too large: {}", s))?;
        let duration = std::time::Duration::from_secs(secs);

        Ok(HumanDuration(duration))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0.as_millis();
        let secs = self.0.as_secs();

        if millis % 1000 != 0 {
            write!(f, "{}ms", millis)
        } else if secs % 3600 == 0 && secs != 0 {
            write!(f, "{}h", secs / 3600)
        } else if secs % 60 == 0 && secs != 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{}s", secs)
        }
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HumanDuration::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A credential string that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// Returns the wrapped value. Keep the result out of log statements.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// FUSE mount settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuseConfig {
    /// Filesystem name shown in `mount` output. Derived from the bucket when unset.
    #[serde(default)]
    pub fs_name: Option<String>,
    #[serde(default)]
    pub allow_other: bool,
    #[serde(default = "default_auto_unmount")]
    pub auto_unmount: bool,
    /// Kernel attribute and entry TTL. Zero keeps every stat a store round trip.
    #[serde(default)]
    pub attr_ttl: HumanDuration,
    /// Extra mount options in `-o` syntax (`noatime`, `subtype=gcs`, ...).
    #[serde(default)]
    pub options: Vec<String>,
}

fn default_auto_unmount() -> bool {
    true
}

impl Default for FuseConfig {
    fn default() -> Self {
        FuseConfig {
            fs_name: None,
            allow_other: false,
            auto_unmount: default_auto_unmount(),
            attr_ttl: HumanDuration::default(),
            options: Vec::new(),
        }
    }
}

/// Async runtime settings for the FUSE bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

fn default_worker_threads() -> usize {
    4
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            worker_threads: default_worker_threads(),
        }
    }
}

/// Google Cloud Storage client settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GcsSettings {
    /// API endpoint, for emulators. Defaults to `https://storage.googleapis.com`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// OAuth2 bearer token. Public buckets need none.
    #[serde(default)]
    pub access_token: Option<Secret>,
}

/// S3 client settings. Credentials come from the default AWS provider chain
/// unless both keys are set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct S3Settings {
    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint for S3-compatible services such as MinIO.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<Secret>,
    #[serde(default)]
    pub secret_access_key: Option<Secret>,
}

/// Top-level mount configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MountConfig {
    /// Bucket URL (`gs://`, `s3://`, `file://`, `mem://`). The command line wins over this.
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub directories: DirectoryPolicy,
    #[serde(default)]
    pub fuse: FuseConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub gcs: GcsSettings,
    #[serde(default)]
    pub s3: S3Settings,
}
