//! Two-timer reconciliation core.
//!
//! A log-driven task and a full-scan task run concurrently, each on its own interval,
//! but a single mutex serializes the critical section of either tick: only one
//! reconciliation pass runs at a time. The indexer is treated as a single-writer
//! resource from the watcher's perspective, and this is the one piece of shared
//! mutable state in the whole daemon.

use crate::client::Client;
use crate::{full, log, timestamp};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Everything the two scheduler tasks share.
pub struct Scheduler {
    registry: PathBuf,
    timestamp_path: PathBuf,
    client: Client,
    lock: Arc<Mutex<()>>,
}

impl Scheduler {
    pub fn new(registry: PathBuf, timestamp_path: PathBuf, client: Client) -> Self {
        Self {
            registry,
            timestamp_path,
            client,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Run both timers to completion (which in practice means forever, since the
    /// component futures never return `Ok` on their own; a shutdown signal must race
    /// this in the caller).
    pub async fn run(self, log_interval: Duration, full_interval: Duration) {
        let full = self.run_full_timer(full_interval);
        let log = self.run_log_timer(log_interval);
        tokio::join!(full, log);
    }

    async fn run_full_timer(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let _guard = self.lock.lock().await;
            match full::scan(&self.registry, &self.client).await {
                Ok(()) => info!("full scan completed with no errors"),
                Err(e) => warn!(error = %e, "full scan completed with errors"),
            }
        }
    }

    async fn run_log_timer(&self, interval: Duration) {
        // The first tick fires after one interval elapses, not immediately, so the
        // persisted cutoff has a moment to be loaded before anything races to overwrite
        // it with `now`. Read it here, outside the lock, since nothing else touches it
        // yet.
        let mut cutoff = timestamp::read_or_now(&self.timestamp_path).await;

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // consume the immediate first tick
        loop {
            ticker.tick().await;
            cutoff = self.run_one_log_tick(cutoff).await;
        }
    }

    async fn run_one_log_tick(&self, cutoff: DateTime<Utc>) -> DateTime<Utc> {
        let _guard = self.lock.lock().await;
        let (outcome, result) = log::process(&self.registry, &self.client, cutoff).await;

        match result {
            Ok(()) => info!("log scan completed with no errors"),
            Err(e) => warn!(error = %e, "log scan completed with errors"),
        }

        // Persisted even on partial error: the cutoff is derived purely from filenames,
        // independent of whether any individual entry failed to apply.
        if outcome.new_cutoff != cutoff {
            if let Err(e) = timestamp::write(&self.timestamp_path, outcome.new_cutoff).await {
                warn!(error = %e, "failed to persist last-scan timestamp");
            }
        }

        outcome.new_cutoff
    }

    /// Run one full scan immediately, outside of the timer loop. Used at startup so the
    /// indexer is populated promptly after a restart, before the first timer fires.
    pub async fn run_startup_full_scan(&self) {
        let _guard = self.lock.lock().await;
        match full::scan(&self.registry, &self.client).await {
            Ok(()) => info!("startup full scan completed with no errors"),
            Err(e) => warn!(error = %e, "startup full scan completed with errors"),
        }
    }
}
