//! Mount option handling.
//!
//! Extra options use the familiar `-o a,b,key=value` syntax. The mount is
//! always read-only; asking for `rw` is an error.

use bucketfs_config::FuseConfig;
use fuser::MountOption;

/// Errors from parsing mount options.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OptionError {
    #[error("bucketfs mounts are read-only; option '{0}' is not allowed")]
    Writable(String),
    #[error("mount option '{0}' needs a value")]
    MissingValue(String),
}

/// Split raw option arguments (`-o`, `a,b`, `-oa,b`) into single options.
pub fn split_options<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    args.iter()
        .map(|a| a.as_ref())
        .filter(|a| *a != "-o")
        .map(|a| a.strip_prefix("-o").unwrap_or(a))
        .flat_map(|a| a.split(','))
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse one option name into its `fuser` form.
pub fn parse_option(option: &str) -> Result<MountOption, OptionError> {
    let (name, value) = match option.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (option, None),
    };

    let require = |value: Option<&str>| {
        value
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| OptionError::MissingValue(name.to_string()))
    };

    Ok(match name {
        "ro" => MountOption::RO,
        "rw" => return Err(OptionError::Writable(option.to_string())),
        "fsname" => MountOption::FSName(require(value)?),
        "subtype" => MountOption::Subtype(require(value)?),
        "allow_other" => MountOption::AllowOther,
        "allow_root" => MountOption::AllowRoot,
        "auto_unmount" => MountOption::AutoUnmount,
        "default_permissions" => MountOption::DefaultPermissions,
        "dev" => MountOption::Dev,
        "nodev" => MountOption::NoDev,
        "suid" => MountOption::Suid,
        "nosuid" => MountOption::NoSuid,
        "exec" => MountOption::Exec,
        "noexec" => MountOption::NoExec,
        "atime" => MountOption::Atime,
        "noatime" => MountOption::NoAtime,
        "dirsync" => MountOption::DirSync,
        "sync" => MountOption::Sync,
        "async" => MountOption::Async,
        _ => MountOption::CUSTOM(option.to_string()),
    })
}

/// Build the full option list for a mount.
pub fn mount_options(config: &FuseConfig, fs_name: &str) -> Result<Vec<MountOption>, OptionError> {
    let mut options = vec![MountOption::RO, MountOption::FSName(fs_name.to_string())];
    if config.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }
    if config.allow_other {
        options.push(MountOption::AllowOther);
    }

    for raw in split_options(&config.options) {
        let option = parse_option(&raw)?;
        if !options.contains(&option) {
            options.push(option);
        }
    }
    Ok(options)
}
