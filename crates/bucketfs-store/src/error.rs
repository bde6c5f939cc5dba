/// Errors that can occur at the object-store boundary.
///
/// Absence of a key and failure to reach the store are separate variants so
/// callers never have to guess which one they are looking at.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Key does not exist in the bucket.
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The request did not complete: network failure, unexpected status, bad response body.
    #[error("Store request '{operation}' failed")]
    Transport {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out for key: {key}")]
    Timeout { operation: String, key: String },

    /// The bucket URL could not be parsed.
    #[error("Invalid bucket URL: {0}")]
    InvalidUrl(String),

    /// The bucket URL names a store this build does not include.
    #[error("Unsupported store: {0}")]
    Unsupported(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other store-specific error.
    #[error("Store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Build a transport error from any error source.
    pub fn transport<E>(operation: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StoreError::Transport {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Returns true if the key is absent, as opposed to the store being unreachable.
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound(_) => true,
            StoreError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Returns true if this error is transient and the operation may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transport { .. } => true,
            StoreError::Timeout { .. } => true,
            StoreError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
