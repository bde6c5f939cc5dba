//! Platform-neutral FUSE core logic.
//!
//! Every operation maps an inode back to a path and asks the bucket again.
//! Nothing but the path/inode mapping survives between calls.

#[cfg(unix)]
use std::path::Path;
use std::time::{Duration, SystemTime};

use bucketfs_core::translator::child_path;
use bucketfs_core::{BucketFs, CoreError, EntryKind, PathAttributes};
#[cfg(unix)]
use bucketfs_config::FuseConfig;
use tracing::{debug, error, info, warn};

use crate::async_bridge::{block_on, BridgeError};
use crate::inode::{InodeTable, ROOT_INO};

/// Errors returned by filesystem operations.
#[derive(Debug, PartialEq, Eq)]
pub enum FsOpError {
    /// File or directory not found.
    NotFound,
    /// The mount is read-only.
    ReadOnly,
    /// Invalid argument (e.g., bad filename encoding).
    InvalidArg,
    /// Store or runtime failure. Detail stays in the logs.
    Io(String),
    /// Expected a directory.
    NotDir,
    /// Expected a file.
    IsDir,
}

impl From<CoreError> for FsOpError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NotFound(_) => FsOpError::NotFound,
            other => FsOpError::Io(other.to_string()),
        }
    }
}

impl From<BridgeError> for FsOpError {
    fn from(e: BridgeError) -> Self {
        FsOpError::Io(e.to_string())
    }
}

/// Errors that stop a mount from starting.
#[cfg(unix)]
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error(transparent)]
    Options(#[from] crate::options::OptionError),
    #[error("mount failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One entry handed to a readdir reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaddirEntry {
    pub ino: u64,
    /// 1-based position; the kernel passes it back as the next offset.
    pub offset: i64,
    pub kind: EntryKind,
    pub name: String,
}

/// Core FUSE filesystem logic, platform-independent.
pub struct BucketFsCore {
    fs: BucketFs,
    inodes: InodeTable,
    ttl: Duration,
    mounted_at: SystemTime,
}

impl BucketFsCore {
    /// Wrap `fs`. `ttl` is how long the kernel may keep entries and attributes.
    pub fn new(fs: BucketFs, ttl: Duration) -> Self {
        BucketFsCore {
            fs,
            inodes: InodeTable::new(),
            ttl,
            mounted_at: SystemTime::now(),
        }
    }

    pub fn bucket(&self) -> &BucketFs {
        &self.fs
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Timestamp reported for directories and for objects without an mtime.
    pub fn mounted_at(&self) -> SystemTime {
        self.mounted_at
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    fn path_of(&self, ino: u64) -> Result<String, FsOpError> {
        self.inodes.get_path(ino).ok_or(FsOpError::NotFound)
    }

    fn resolve(&self, path: &str) -> Result<PathAttributes, FsOpError> {
        let result = block_on(self.fs.resolve(path))?;
        result.map_err(|e| {
            if !e.is_not_found() {
                warn!(path = %path, error = %e, "resolve failed");
            }
            FsOpError::from(e)
        })
    }

    /// Perform a lookup operation. Counts as one kernel reference.
    pub fn do_lookup(&self, parent: u64, name: &str) -> Result<(u64, PathAttributes), FsOpError> {
        let parent_path = self.path_of(parent)?;
        let path = child_path(&parent_path, name);

        let attrs = self.resolve(&path)?;
        let ino = self.inodes.remember(&path);
        Ok((ino, attrs))
    }

    /// Perform a getattr operation.
    pub fn do_getattr(&self, ino: u64) -> Result<PathAttributes, FsOpError> {
        let path = self.path_of(ino)?;
        self.resolve(&path)
    }

    /// The kernel dropped `nlookup` references to `ino`.
    pub fn do_forget(&self, ino: u64, nlookup: u64) {
        self.inodes.forget(ino, nlookup);
    }

    /// Check that `ino` can be opened with `flags`.
    pub fn do_open(&self, ino: u64, flags: i32) -> Result<(), FsOpError> {
        if wants_write(flags) {
            return Err(FsOpError::ReadOnly);
        }
        match self.do_getattr(ino)?.kind {
            EntryKind::File => Ok(()),
            EntryKind::Directory => Err(FsOpError::IsDir),
        }
    }

    /// Check that `ino` is a directory.
    pub fn do_opendir(&self, ino: u64) -> Result<(), FsOpError> {
        match self.do_getattr(ino)?.kind {
            EntryKind::Directory => Ok(()),
            EntryKind::File => Err(FsOpError::NotDir),
        }
    }

    /// Check access. Any write request fails on a read-only mount.
    pub fn do_access(&self, ino: u64, write: bool) -> Result<(), FsOpError> {
        if write {
            return Err(FsOpError::ReadOnly);
        }
        self.do_getattr(ino).map(|_| ())
    }

    /// Perform a read operation.
    pub fn do_read(&self, ino: u64, offset: i64, size: u32) -> Result<Vec<u8>, FsOpError> {
        if offset < 0 {
            return Err(FsOpError::InvalidArg);
        }
        let path = self.path_of(ino)?;

        let result = block_on(self.fs.read_range(&path, offset as u64, size as usize))?;
        result.map_err(|e| {
            if !e.is_not_found() {
                error!(path = %path, offset, size, error = %e, "read failed");
            }
            FsOpError::from(e)
        })
    }

    /// Enumerate `ino` from scratch and feed entries past `offset` to `add`.
    ///
    /// `add` returns `true` once the reply buffer is full. Returns how many
    /// entries were added. A listing that fails part-way still succeeds if at
    /// least one entry made it into the reply.
    pub fn do_readdir<F>(&self, ino: u64, offset: i64, mut add: F) -> Result<usize, FsOpError>
    where
        F: FnMut(ReaddirEntry) -> bool,
    {
        let path = self.path_of(ino)?;
        let parent_ino = if ino == ROOT_INO {
            ROOT_INO
        } else {
            self.listed_ino(&parent_path(&path))
        };
        let skip = offset.max(0) as usize;

        let result = block_on(async {
            let mut listing = self.fs.list_children(&path);
            let mut position = 0usize;
            let mut added = 0usize;

            loop {
                let entry = match listing.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => return Ok(added),
                    Err(e) if added > 0 => {
                        warn!(path = %path, error = %e, added, "returning partial listing");
                        return Ok(added);
                    }
                    Err(e) => return Err(e),
                };

                position += 1;
                if position <= skip {
                    continue;
                }

                let entry_ino = match entry.name.as_str() {
                    "." => ino,
                    ".." => parent_ino,
                    name => self.listed_ino(&child_path(&path, name)),
                };
                let full = add(ReaddirEntry {
                    ino: entry_ino,
                    offset: position as i64,
                    kind: entry.kind,
                    name: entry.name,
                });
                if full {
                    return Ok(added);
                }
                added += 1;
            }
        })?;

        result.map_err(|e| {
            error!(path = %path, error = %e, "readdir failed");
            FsOpError::from(e)
        })
    }

    /// Inode reported in readdir. Paths the kernel never looked up get a
    /// number outside the table and leave no entry behind.
    fn listed_ino(&self, path: &str) -> u64 {
        self.inodes
            .get_ino(path)
            .unwrap_or_else(|| InodeTable::unmapped_ino(path))
    }

    /// Mount the filesystem and serve requests until it is unmounted.
    #[cfg(unix)]
    pub fn mount(
        self,
        mountpoint: &Path,
        config: &FuseConfig,
        fs_name: &str,
    ) -> Result<(), MountError> {
        use crate::unix_fuse::UnixFuse;

        let options = crate::options::mount_options(config, fs_name)?;
        debug!(?options, "mount options");

        info!("Mounting {} at {:?}", fs_name, mountpoint);
        fuser::mount2(UnixFuse::new(self), mountpoint, &options)?;
        info!("{} unmounted", fs_name);

        Ok(())
    }
}

/// Parent directory of a path. Root is its own parent.
fn parent_path(path: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

#[cfg(unix)]
fn wants_write(flags: i32) -> bool {
    let access = flags & libc::O_ACCMODE;
    access == libc::O_WRONLY || access == libc::O_RDWR || flags & libc::O_TRUNC != 0
}

#[cfg(not(unix))]
fn wants_write(flags: i32) -> bool {
    flags & 0b11 != 0
}
