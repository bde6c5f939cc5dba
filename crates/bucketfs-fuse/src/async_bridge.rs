//! Bridge between synchronous FUSE callbacks and the async store.
//!
//! FUSE callbacks run on the session thread and block it until the store
//! answers; the futures themselves run on one process-wide runtime.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Runtime};

/// Global tokio runtime for FUSE callbacks.
///
/// Stores the result of runtime creation so that initialization errors are
/// propagated without panicking.
static RUNTIME: OnceLock<Result<Runtime, String>> = OnceLock::new();

/// Errors from the runtime bridge itself.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to create FUSE async runtime: {0}")]
    Build(String),
    #[error("FUSE runtime not initialized - call init_runtime first")]
    NotInitialized,
}

/// Initialize the async runtime with `worker_threads` workers.
///
/// Only the first call builds the runtime; later calls return it unchanged.
pub fn init_runtime(worker_threads: usize) -> Result<&'static Runtime, BridgeError> {
    let result = RUNTIME.get_or_init(|| {
        Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("bucketfs-worker")
            .enable_all()
            .build()
            .map_err(|e| e.to_string())
    });
    match result {
        Ok(rt) => Ok(rt),
        Err(e) => Err(BridgeError::Build(e.clone())),
    }
}

/// Get the runtime, returning an error if not initialized.
pub fn runtime() -> Result<&'static Runtime, BridgeError> {
    match RUNTIME.get() {
        Some(Ok(rt)) => Ok(rt),
        Some(Err(e)) => Err(BridgeError::Build(e.clone())),
        None => Err(BridgeError::NotInitialized),
    }
}

/// Run an async operation to completion on the bridge runtime.
///
/// Must not be called from inside an async context.
pub fn block_on<F, T>(future: F) -> Result<T, BridgeError>
where
    F: Future<Output = T>,
{
    let rt = runtime()?;
    Ok(rt.block_on(future))
}
