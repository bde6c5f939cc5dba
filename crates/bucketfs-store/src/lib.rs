mod error;
mod fs;
mod gcs;
mod memory;
mod scope;
mod traits;
mod url;

#[cfg(feature = "s3")]
mod s3;

pub use error::StoreError;
pub use fs::FileStore;
pub use gcs::GcsStore;
pub use memory::MemoryStore;
pub use scope::KeyScope;
pub use traits::{
    group_by_delimiter, ListCursor, ListEntry, ListOptions, ObjectAttributes, ObjectReader,
    ObjectStore, VecCursor, DELIMITER,
};
pub use url::{open_bucket, BucketUrl};

#[cfg(feature = "s3")]
pub use s3::S3Store;
