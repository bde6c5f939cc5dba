use std::path::PathBuf;
use std::process::ExitCode;

use bucketfs_config::MountConfig;
use bucketfs_core::BucketFs;
use bucketfs_fuse::{block_on, init_runtime, BucketFsCore};
use bucketfs_store::{open_bucket, ObjectStore};
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "bucketfs",
    version,
    about = "Mount an object-storage bucket as a read-only filesystem"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bucket to mount (gs://bucket[/prefix], s3://bucket[/prefix], file:///dir, mem://)
    bucket: String,

    /// Directory to mount the bucket on
    mountpoint: PathBuf,

    /// Extra mount options (e.g. -o allow_other,noatime)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    options: Vec<String>,
}

fn find_config() -> Option<PathBuf> {
    // 1. BUCKETFS_CONFIG environment variable
    if let Ok(path) = std::env::var("BUCKETFS_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. bucketfs.yaml in current directory
    let cwd_config = PathBuf::from("bucketfs.yaml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. ~/.config/bucketfs/config.yaml
    if let Some(home) = dirs_next::home_dir() {
        let home_config = home.join(".config/bucketfs/config.yaml");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

fn load_config(cli: &Cli) -> Result<MountConfig, Box<dyn std::error::Error>> {
    let config = match cli.config.clone().or_else(find_config) {
        Some(path) => MountConfig::from_file(&path)
            .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?,
        None => MountConfig::default(),
    };

    let mut config = config.with_bucket(&cli.bucket);
    config.fuse.options.extend(extra_options(&cli.options));
    let config = config.effective();

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(format!("Invalid configuration ({} errors)", errors.len()).into());
    }

    Ok(config)
}

#[cfg(unix)]
fn extra_options(raw: &[String]) -> Vec<String> {
    bucketfs_fuse::split_options(raw)
}

#[cfg(not(unix))]
fn extra_options(raw: &[String]) -> Vec<String> {
    raw.to_vec()
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;

    init_runtime(config.runtime.worker_threads)?;

    let store = block_on(open_bucket(&cli.bucket, &config))??;
    info!(store = %store.describe(), "bucket opened");

    let fs = BucketFs::new(store, config.directories);
    let result = serve(fs.clone(), &cli, &config);

    if let Err(e) = block_on(fs.close())? {
        warn!(error = %e, "failed to close bucket");
    }
    result
}

#[cfg(unix)]
fn serve(fs: BucketFs, cli: &Cli, config: &MountConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Ensure mount point exists
    if !cli.mountpoint.exists() {
        std::fs::create_dir_all(&cli.mountpoint)?;
    }

    let fs_name = config.fuse.fs_name.as_deref().unwrap_or("bucketfs");
    let core = BucketFsCore::new(fs, config.fuse.attr_ttl.as_duration());

    // Blocks until unmount
    core.mount(&cli.mountpoint, &config.fuse, fs_name)?;
    Ok(())
}

#[cfg(not(unix))]
fn serve(_fs: BucketFs, _cli: &Cli, _config: &MountConfig) -> Result<(), Box<dyn std::error::Error>> {
    Err("FUSE mounts are only supported on Unix".into())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
