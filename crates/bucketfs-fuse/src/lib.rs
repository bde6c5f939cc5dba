//! Read-only FUSE adapter for bucketfs.
//!
//! Translates kernel requests (lookup, getattr, readdir, read) into calls on
//! a [`BucketFs`](bucketfs_core::BucketFs). Every mutating request fails with
//! `EROFS`.
//!
//! # Architecture
//!
//! - `common` holds `BucketFsCore`, the platform-neutral request logic
//! - `unix_fuse` is the `fuser::Filesystem` impl for macOS/Linux
//! - `inode` maps kernel inode numbers to paths
//! - `async_bridge` runs store futures from the synchronous callbacks
//!
//! # Example
//!
//! ```ignore
//! use bucketfs_fuse::{init_runtime, BucketFsCore};
//!
//! init_runtime(4)?;
//! let core = BucketFsCore::new(fs, Duration::ZERO);
//! core.mount(Path::new("/mnt/bucket"), &config.fuse, "bucketfs:photos")?;
//! ```

mod async_bridge;
mod common;
mod inode;
#[cfg(unix)]
mod options;
#[cfg(unix)]
mod unix_fuse;

pub use async_bridge::{block_on, init_runtime, runtime, BridgeError};
#[cfg(unix)]
pub use common::MountError;
pub use common::{BucketFsCore, FsOpError, ReaddirEntry};
pub use inode::{InodeTable, ROOT_INO};
#[cfg(unix)]
pub use options::{mount_options, parse_option, split_options, OptionError};
#[cfg(unix)]
pub use unix_fuse::UnixFuse;
