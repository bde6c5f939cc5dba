//! Adapter tests against an in-memory bucket, without a kernel mount.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bucketfs_config::DirectoryPolicy;
use bucketfs_core::{BucketFs, EntryKind};
use bucketfs_fuse::{init_runtime, BucketFsCore, FsOpError, InodeTable, ReaddirEntry, ROOT_INO};
use bucketfs_store::{
    ListCursor, ListEntry, ListOptions, MemoryStore, ObjectAttributes, ObjectReader, ObjectStore,
    StoreError,
};

fn core_with(store: Arc<dyn ObjectStore>, policy: DirectoryPolicy) -> BucketFsCore {
    init_runtime(2).unwrap();
    BucketFsCore::new(BucketFs::new(store, policy), Duration::ZERO)
}

fn core_over(objects: &[(&str, &str)], policy: DirectoryPolicy) -> BucketFsCore {
    let store = MemoryStore::with_objects(objects.iter().copied());
    core_with(Arc::new(store), policy)
}

fn readdir_all(core: &BucketFsCore, ino: u64, offset: i64) -> Vec<ReaddirEntry> {
    let mut entries = Vec::new();
    core.do_readdir(ino, offset, |entry| {
        entries.push(entry);
        false
    })
    .unwrap();
    entries
}

fn names(entries: &[ReaddirEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

/// Lists like a memory store but fails after `fail_after` entries.
struct BrokenListing {
    inner: MemoryStore,
    fail_after: usize,
}

struct BrokenCursor {
    inner: Box<dyn ListCursor>,
    remaining: usize,
}

#[async_trait]
impl ListCursor for BrokenCursor {
    async fn next(&mut self) -> Result<Option<ListEntry>, StoreError> {
        if self.remaining == 0 {
            return Err(StoreError::transport("list", "connection reset"));
        }
        self.remaining -= 1;
        self.inner.next().await
    }
}

#[async_trait]
impl ObjectStore for BrokenListing {
    fn describe(&self) -> String {
        "broken-listing".to_string()
    }

    async fn attributes(&self, key: &str) -> Result<ObjectAttributes, StoreError> {
        self.inner.attributes(key).await
    }

    async fn list(&self, options: ListOptions) -> Result<Box<dyn ListCursor>, StoreError> {
        let inner = self.inner.list(options).await?;
        Ok(Box::new(BrokenCursor {
            inner,
            remaining: self.fail_after,
        }))
    }

    async fn open_range_reader(
        &self,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<ObjectReader, StoreError> {
        self.inner.open_range_reader(key, offset, length).await
    }
}

#[test]
fn test_lookup_then_getattr() {
    let core = core_over(&[("docs/readme.md", "hello")], DirectoryPolicy::Prefix);

    let (docs, attrs) = core.do_lookup(ROOT_INO, "docs").unwrap();
    assert_eq!(attrs.kind, EntryKind::Directory);

    let (readme, attrs) = core.do_lookup(docs, "readme.md").unwrap();
    assert_eq!(attrs.kind, EntryKind::File);
    assert_eq!(attrs.size, 5);

    assert_eq!(core.do_getattr(readme).unwrap().size, 5);
    assert_eq!(core.do_lookup(ROOT_INO, "missing"), Err(FsOpError::NotFound));
}

#[test]
fn test_getattr_sees_store_changes() {
    let store = Arc::new(MemoryStore::with_objects([("a.txt", "one")]));
    let core = core_with(store.clone(), DirectoryPolicy::Prefix);

    let (ino, _) = core.do_lookup(ROOT_INO, "a.txt").unwrap();
    store.put("a.txt", "three");
    assert_eq!(core.do_getattr(ino).unwrap().size, 5);

    store.remove("a.txt");
    assert_eq!(core.do_getattr(ino), Err(FsOpError::NotFound));
}

#[test]
fn test_forgotten_inode_is_unknown() {
    let core = core_over(&[("a.txt", "x")], DirectoryPolicy::Prefix);
    let (ino, _) = core.do_lookup(ROOT_INO, "a.txt").unwrap();
    core.do_forget(ino, 1);
    assert_eq!(core.do_getattr(ino), Err(FsOpError::NotFound));
}

#[test]
fn test_readdir_root() {
    let core = core_over(
        &[("a.txt", "1"), ("dir/b.txt", "2"), ("dir/c/d.txt", "3")],
        DirectoryPolicy::Prefix,
    );

    let entries = readdir_all(&core, ROOT_INO, 0);
    assert_eq!(names(&entries), vec![".", "..", "a.txt", "dir"]);
    assert_eq!(entries[0].ino, ROOT_INO);
    assert_eq!(entries[1].ino, ROOT_INO);
    assert_eq!(entries[2].kind, EntryKind::File);
    assert_eq!(entries[3].kind, EntryKind::Directory);

    let offsets: Vec<i64> = entries.iter().map(|e| e.offset).collect();
    assert_eq!(offsets, vec![1, 2, 3, 4]);
}

#[test]
fn test_readdir_leaves_inode_table_untouched() {
    let keys: Vec<String> = (0..500).map(|i| format!("f{:04}", i)).collect();
    let objects: Vec<(&str, &str)> = keys.iter().map(|k| (k.as_str(), "x")).collect();
    let core = core_over(&objects, DirectoryPolicy::Prefix);

    let entries = readdir_all(&core, ROOT_INO, 0);
    assert_eq!(entries.len(), 502);
    assert_eq!(core.inodes().len(), 1);

    let listed = entries[2].ino;
    assert_eq!(listed, InodeTable::unmapped_ino("/f0000"));
    assert!(core.do_getattr(listed).is_err());
    assert!(readdir_all(&core, ROOT_INO, 0).iter().all(|e| e.ino != 0));
    assert_eq!(core.inodes().len(), 1);
}

#[test]
fn test_readdir_reports_looked_up_inodes() {
    let core = core_over(&[("a.txt", "1"), ("b.txt", "2")], DirectoryPolicy::Prefix);
    let (a, _) = core.do_lookup(ROOT_INO, "a.txt").unwrap();

    let entries = readdir_all(&core, ROOT_INO, 0);
    assert_eq!(entries[2].ino, a);
    assert_eq!(entries[3].ino, InodeTable::unmapped_ino("/b.txt"));
    assert_eq!(core.inodes().len(), 2);

    core.do_forget(a, 1);
    assert_eq!(core.inodes().len(), 1);
}

#[test]
fn test_readdir_resumes_from_offset() {
    let core = core_over(
        &[("a.txt", "1"), ("b.txt", "2"), ("c.txt", "3")],
        DirectoryPolicy::Prefix,
    );

    let entries = readdir_all(&core, ROOT_INO, 3);
    assert_eq!(names(&entries), vec!["b.txt", "c.txt"]);
    assert_eq!(entries[0].offset, 4);

    assert!(readdir_all(&core, ROOT_INO, 5).is_empty());
}

#[test]
fn test_readdir_stops_when_reply_is_full() {
    let core = core_over(&[("a", "1"), ("b", "2"), ("c", "3")], DirectoryPolicy::Prefix);

    let mut seen = Vec::new();
    let added = core
        .do_readdir(ROOT_INO, 0, |entry| {
            if seen.len() == 3 {
                return true;
            }
            seen.push(entry.name);
            false
        })
        .unwrap();
    assert_eq!(added, 3);
    assert_eq!(seen, vec![".", "..", "a"]);

    let rest = readdir_all(&core, ROOT_INO, 3);
    assert_eq!(names(&rest), vec!["b", "c"]);
}

#[test]
fn test_readdir_subdirectory_parent() {
    let core = core_over(&[("dir/b.txt", "2")], DirectoryPolicy::Prefix);
    let (dir, _) = core.do_lookup(ROOT_INO, "dir").unwrap();

    let entries = readdir_all(&core, dir, 0);
    assert_eq!(names(&entries), vec![".", "..", "b.txt"]);
    assert_eq!(entries[0].ino, dir);
    assert_eq!(entries[1].ino, ROOT_INO);
}

#[test]
fn test_readdir_file_shadows_directory() {
    let core = core_over(&[("a", "file"), ("a/x", "nested")], DirectoryPolicy::Prefix);

    let entries = readdir_all(&core, ROOT_INO, 0);
    assert_eq!(names(&entries), vec![".", "..", "a"]);
    assert_eq!(entries[2].kind, EntryKind::File);

    let (ino, attrs) = core.do_lookup(ROOT_INO, "a").unwrap();
    assert_eq!(attrs.kind, EntryKind::File);
    assert_eq!(core.do_opendir(ino), Err(FsOpError::NotDir));
}

#[test]
fn test_readdir_partial_on_cursor_failure() {
    let store = BrokenListing {
        inner: MemoryStore::with_objects([("a", "1"), ("b", "2"), ("c", "3")]),
        fail_after: 1,
    };
    let core = core_with(Arc::new(store), DirectoryPolicy::Prefix);

    let entries = readdir_all(&core, ROOT_INO, 0);
    assert_eq!(names(&entries), vec![".", "..", "a"]);
}

#[test]
fn test_readdir_fails_when_nothing_was_added() {
    let store = BrokenListing {
        inner: MemoryStore::with_objects([("a", "1")]),
        fail_after: 0,
    };
    let core = core_with(Arc::new(store), DirectoryPolicy::Prefix);

    let result = core.do_readdir(ROOT_INO, 2, |_| false);
    assert!(matches!(result, Err(FsOpError::Io(_))));
}

#[test]
fn test_read_ranges() {
    let core = core_over(&[("data.bin", "0123456789")], DirectoryPolicy::Prefix);
    let (ino, _) = core.do_lookup(ROOT_INO, "data.bin").unwrap();

    assert_eq!(core.do_read(ino, 0, 4).unwrap(), b"0123");
    assert_eq!(core.do_read(ino, 8, 100).unwrap(), b"89");
    assert!(core.do_read(ino, 10, 4).unwrap().is_empty());
    assert!(core.do_read(ino, 3, 0).unwrap().is_empty());
    assert_eq!(core.do_read(ino, -1, 4), Err(FsOpError::InvalidArg));
}

#[test]
fn test_open_checks() {
    let core = core_over(&[("dir/file", "x")], DirectoryPolicy::Prefix);
    let (dir, _) = core.do_lookup(ROOT_INO, "dir").unwrap();
    let (file, _) = core.do_lookup(dir, "file").unwrap();

    assert_eq!(core.do_open(file, libc::O_RDONLY), Ok(()));
    assert_eq!(core.do_open(file, libc::O_WRONLY), Err(FsOpError::ReadOnly));
    assert_eq!(core.do_open(file, libc::O_RDWR), Err(FsOpError::ReadOnly));
    assert_eq!(core.do_open(dir, libc::O_RDONLY), Err(FsOpError::IsDir));
    assert_eq!(core.do_opendir(dir), Ok(()));

    assert_eq!(core.do_access(file, false), Ok(()));
    assert_eq!(core.do_access(file, true), Err(FsOpError::ReadOnly));
}

#[test]
fn test_marker_policy() {
    let core = core_over(
        &[("implied/x", "1"), ("marked/", ""), ("marked/y", "2")],
        DirectoryPolicy::Marker,
    );

    assert_eq!(core.do_lookup(ROOT_INO, "implied"), Err(FsOpError::NotFound));
    let (_, attrs) = core.do_lookup(ROOT_INO, "marked").unwrap();
    assert_eq!(attrs.kind, EntryKind::Directory);
}
