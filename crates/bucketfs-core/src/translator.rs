//! Pure conversions between filesystem paths and storage keys.
//!
//! A path always starts with `/`; a key never does. A key ending in `/`
//! names a directory marker.

use bucketfs_store::DELIMITER;

/// Path separator used on the filesystem side.
pub const SEPARATOR: char = '/';

/// The root path.
pub const ROOT: &str = "/";

/// Convert a path into its storage key.
///
/// Strips exactly one leading separator. Internal separators and `.`/`..`
/// segments are left untouched.
pub fn path_to_key(path: &str) -> &str {
    path.strip_prefix(SEPARATOR).unwrap_or(path)
}

/// Convert a key back into a path by prepending `/`.
pub fn key_to_path(key: &str) -> String {
    format!("{}{}", SEPARATOR, key)
}

/// Whether `path` is the root directory.
pub fn is_root(path: &str) -> bool {
    path == ROOT || path.is_empty()
}

/// The listing prefix for the children of directory `path`.
///
/// Root maps to the empty prefix; anything else to its key plus a delimiter.
pub fn directory_prefix(path: &str) -> String {
    let key = path_to_key(path);
    if key.is_empty() {
        String::new()
    } else if key.ends_with(DELIMITER) {
        key.to_string()
    } else {
        format!("{}{}", key, DELIMITER)
    }
}

/// The marker object that makes `path` an explicit directory.
pub fn marker_key(path: &str) -> String {
    format!("{}{}", path_to_key(path), DELIMITER)
}

/// Name of the child that `key` denotes below `prefix`.
///
/// Returns `None` when the key is the prefix itself (the directory's own
/// marker) or does not start with the prefix. Trailing delimiters are
/// stripped from the reported name.
pub fn key_to_child_name<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = key.strip_prefix(prefix)?;
    let name = rest.trim_end_matches(DELIMITER);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Join a parent path and a child name.
pub fn child_path(parent: &str, name: &str) -> String {
    if is_root(parent) {
        format!("{}{}", SEPARATOR, name)
    } else {
        format!("{}{}{}", parent.trim_end_matches(SEPARATOR), SEPARATOR, name)
    }
}
