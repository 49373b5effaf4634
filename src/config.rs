//! CLI flags for the watcher daemon.

use clap::Parser;
use std::path::PathBuf;

/// Synchronization daemon that reconciles a versioned asset registry against a search
/// indexer.
#[derive(Parser, Debug)]
#[command(name = "registry-watcher")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Absolute path to the registry root.
    #[arg(long)]
    pub registry: PathBuf,

    /// Base URL of the indexer.
    #[arg(long)]
    pub url: String,

    /// Interval in which to check for new logs, in minutes.
    #[arg(long, default_value_t = 10)]
    pub log: u64,

    /// Interval in which to do a full check, in hours.
    #[arg(long, default_value_t = 168)]
    pub full: u64,

    /// Path to the sidecar last-scan file.
    #[arg(long, default_value = ".sayoko_last_scan")]
    pub timestamp: PathBuf,

    /// Minimum level for diagnostic logging; overridden by `RUST_LOG` if set.
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    /// Log intended register/deregister calls instead of issuing them.
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    /// Validate flags that `clap` can't express on its own: `--registry` must be an
    /// absolute path. We don't canonicalize or require existence — a registry that
    /// doesn't exist yet surfaces as a scan-time error, not a startup one.
    pub fn validate(&self) -> Result<(), String> {
        if !self.registry.is_absolute() {
            return Err(format!(
                "--registry must be an absolute path, got {:?}",
                self.registry
            ));
        }
        Ok(())
    }
}
