//! Unix FUSE implementation using the `fuser` crate.

use std::ffi::OsStr;
use std::path::Path;
use std::time::SystemTime;

use bucketfs_core::{EntryKind, PathAttributes};
use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use tracing::debug;

use crate::common::{BucketFsCore, FsOpError};

const DIR_PERM: u16 = 0o555;
const FILE_PERM: u16 = 0o444;
const BLOCK_SIZE: u32 = 4096;
/// Longest object name the common stores accept.
const MAX_NAME_LEN: u32 = 1024;

/// Unix FUSE filesystem wrapper around `BucketFsCore`.
pub struct UnixFuse {
    core: BucketFsCore,
    uid: u32,
    gid: u32,
}

impl UnixFuse {
    pub fn new(core: BucketFsCore) -> Self {
        UnixFuse {
            core,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
        }
    }

    pub(crate) fn error_to_errno(e: &FsOpError) -> i32 {
        match e {
            FsOpError::NotFound => libc::ENOENT,
            FsOpError::ReadOnly => libc::EROFS,
            FsOpError::InvalidArg => libc::EINVAL,
            FsOpError::Io(_) => libc::EIO,
            FsOpError::NotDir => libc::ENOTDIR,
            FsOpError::IsDir => libc::EISDIR,
        }
    }

    fn file_attr(&self, ino: u64, attrs: &PathAttributes) -> FileAttr {
        path_attr_to_file_attr(ino, attrs, self.core.mounted_at(), self.uid, self.gid)
    }
}

/// Convert resolved attributes into what the kernel expects.
pub(crate) fn path_attr_to_file_attr(
    ino: u64,
    attrs: &PathAttributes,
    mounted_at: SystemTime,
    uid: u32,
    gid: u32,
) -> FileAttr {
    let (kind, perm, size, mtime) = match attrs.kind {
        EntryKind::Directory => (FileType::Directory, DIR_PERM, 0, mounted_at),
        EntryKind::File => (
            FileType::RegularFile,
            FILE_PERM,
            attrs.size,
            attrs.modified.map(SystemTime::from).unwrap_or(mounted_at),
        ),
    };

    FileAttr {
        ino,
        size,
        blocks: size.div_ceil(512),
        atime: mtime,
        mtime,
        ctime: mtime,
        crtime: mtime,
        kind,
        perm,
        nlink: 1,
        uid,
        gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

fn file_type(kind: EntryKind) -> FileType {
    match kind {
        EntryKind::File => FileType::RegularFile,
        EntryKind::Directory => FileType::Directory,
    }
}

macro_rules! name_or_einval {
    ($name:expr, $reply:expr) => {
        match $name.to_str() {
            Some(n) => n,
            None => {
                $reply.error(libc::EINVAL);
                return;
            }
        }
    };
}

impl Filesystem for UnixFuse {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name_str = name_or_einval!(name, reply);
        debug!("lookup: parent={}, name={}", parent, name_str);

        match self.core.do_lookup(parent, name_str) {
            Ok((ino, attrs)) => {
                let file_attr = self.file_attr(ino, &attrs);
                reply.entry(&self.core.ttl(), &file_attr, 0);
            }
            Err(e) => {
                debug!("lookup failed: {:?}", e);
                reply.error(Self::error_to_errno(&e));
            }
        }
    }

    fn forget(&mut self, _req: &Request, ino: u64, nlookup: u64) {
        debug!("forget: ino={}, nlookup={}", ino, nlookup);
        self.core.do_forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        debug!("getattr: ino={}", ino);

        match self.core.do_getattr(ino) {
            Ok(attrs) => {
                let file_attr = self.file_attr(ino, &attrs);
                reply.attr(&self.core.ttl(), &file_attr);
            }
            Err(e) => reply.error(Self::error_to_errno(&e)),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
        debug!("open: ino={}, flags={:#o}", ino, flags);

        match self.core.do_open(ino, flags) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(Self::error_to_errno(&e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        debug!("read: ino={}, offset={}, size={}", ino, offset, size);

        match self.core.do_read(ino, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => {
                debug!("read failed: {:?}", e);
                reply.error(Self::error_to_errno(&e));
            }
        }
    }

    fn opendir(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!("opendir: ino={}", ino);

        match self.core.do_opendir(ino) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(Self::error_to_errno(&e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!("readdir: ino={}, offset={}", ino, offset);

        let result = self.core.do_readdir(ino, offset, |entry| {
            reply.add(entry.ino, entry.offset, file_type(entry.kind), &entry.name)
        });

        match result {
            Ok(_) => reply.ok(),
            Err(e) => {
                debug!("readdir failed: {:?}", e);
                reply.error(Self::error_to_errno(&e));
            }
        }
    }

    fn access(&mut self, _req: &Request, ino: u64, mask: i32, reply: ReplyEmpty) {
        match self.core.do_access(ino, mask & libc::W_OK != 0) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(Self::error_to_errno(&e)),
        }
    }

    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        reply.statfs(0, 0, 0, 0, 0, BLOCK_SIZE, MAX_NAME_LEN, BLOCK_SIZE);
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        _offset: i64,
        _data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        debug!("write rejected: ino={}", ino);
        reply.error(libc::EROFS);
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        debug!("create rejected: parent={}, name={:?}", parent, name);
        reply.error(libc::EROFS);
    }

    fn mknod(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        debug!("mknod rejected: parent={}, name={:?}", parent, name);
        reply.error(libc::EROFS);
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        debug!("mkdir rejected: parent={}, name={:?}", parent, name);
        reply.error(libc::EROFS);
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!("unlink rejected: parent={}, name={:?}", parent, name);
        reply.error(libc::EROFS);
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!("rmdir rejected: parent={}, name={:?}", parent, name);
        reply.error(libc::EROFS);
    }

    fn symlink(
        &mut self,
        _req: &Request,
        parent: u64,
        link_name: &OsStr,
        _target: &Path,
        reply: ReplyEntry,
    ) {
        debug!("symlink rejected: parent={}, name={:?}", parent, link_name);
        reply.error(libc::EROFS);
    }

    fn link(
        &mut self,
        _req: &Request,
        ino: u64,
        _newparent: u64,
        _newname: &OsStr,
        reply: ReplyEntry,
    ) {
        debug!("link rejected: ino={}", ino);
        reply.error(libc::EROFS);
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _newparent: u64,
        _newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        debug!("rename rejected: parent={}, name={:?}", parent, name);
        reply.error(libc::EROFS);
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        debug!("setattr rejected: ino={}", ino);
        reply.error(libc::EROFS);
    }
}
