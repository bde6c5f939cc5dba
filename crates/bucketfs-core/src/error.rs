use bucketfs_store::StoreError;

/// Errors produced by path-level operations.
///
/// `NotFound` is only ever produced when the store answered that nothing
/// exists; a store that could not be reached is always `Transport`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Neither an object nor a directory exists at the path.
    #[error("Path not found: {0}")]
    NotFound(String),

    /// A store request failed while handling the path.
    #[error("Store request failed for path: {path}")]
    Transport {
        path: String,
        #[source]
        source: StoreError,
    },

    /// A listing cursor failed after enumeration had started.
    #[error("Listing failed part-way through: {path}")]
    Iteration {
        path: String,
        #[source]
        source: StoreError,
    },
}

impl CoreError {
    /// Classify a store error raised while handling `path`.
    pub(crate) fn from_store(path: &str, source: StoreError) -> Self {
        if source.is_not_found() {
            CoreError::NotFound(path.to_string())
        } else {
            CoreError::Transport {
                path: path.to_string(),
                source,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound(_))
    }
}
