//! Key scoping for buckets opened below a prefix (`gs://bucket/some/prefix`).

/// Maps keys seen by callers to keys stored in the bucket and back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyScope {
    /// Empty, or a prefix ending in `/`.
    prefix: String,
}

impl KeyScope {
    /// Build a scope from a raw prefix. Leading and trailing slashes are normalized.
    pub fn new(prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        if trimmed.is_empty() {
            KeyScope::default()
        } else {
            KeyScope {
                prefix: format!("{}/", trimmed),
            }
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key as stored in the bucket.
    pub fn apply(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Key as seen by callers. Keys outside the scope are returned unchanged.
    pub fn strip<'a>(&self, stored: &'a str) -> &'a str {
        stored.strip_prefix(self.prefix.as_str()).unwrap_or(stored)
    }
}
