use std::sync::Arc;

use bucketfs_store::{ObjectStore, StoreError};
use tokio::io::AsyncReadExt;
use tracing::{error, instrument};

use crate::error::CoreError;
use crate::translator::{is_root, path_to_key};

/// Serves byte ranges of objects.
#[derive(Clone)]
pub struct RangeReader {
    store: Arc<dyn ObjectStore>,
}

impl RangeReader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        RangeReader { store }
    }

    /// Read up to `length` bytes at `offset`. Returns fewer bytes near the
    /// end of the object and none at or past it.
    pub async fn read_range(&self, path: &str, offset: u64, length: usize) -> Result<Vec<u8>, CoreError> {
        let mut buf = vec![0u8; length];
        let n = self.read_into(path, offset, &mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Fill `buf` from `offset`, stopping early only at the end of the object.
    #[instrument(skip(self, buf), fields(length = buf.len()))]
    pub async fn read_into(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<usize, CoreError> {
        if buf.is_empty() {
            return Ok(0);
        }
        if is_root(path) {
            return Err(CoreError::NotFound(path.to_string()));
        }

        let mut stream = self
            .store
            .open_range_reader(path_to_key(path), offset, buf.len() as u64)
            .await
            .map_err(|e| {
                if !e.is_not_found() {
                    error!(path = %path, error = %e, "failed to open range");
                }
                CoreError::from_store(path, e)
            })?;

        let mut filled = 0;
        while filled < buf.len() {
            let n = stream.read(&mut buf[filled..]).await.map_err(|e| {
                error!(path = %path, error = %e, "range stream failed");
                CoreError::Transport {
                    path: path.to_string(),
                    source: StoreError::Io(e),
                }
            })?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        Ok(filled)
    }
}
