//! Reconciliation engine for the registry-watcher daemon: keeps an external search
//! indexer's registered directories, and a registry's per-version ignore markers,
//! aligned with the filesystem and a per-project mutation log.

pub mod aggregate;
pub mod client;
pub mod config;
pub mod full;
pub mod ignore;
pub mod latest;
pub mod log;
pub mod scheduler;
pub mod telemetry;
pub mod timestamp;
