//! Persists the last-scan cutoff as a single RFC3339 instant in a sidecar file.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::warn;

/// Read the persisted cutoff, or `now` if the sidecar is absent or malformed.
///
/// A missing or corrupt sidecar is deliberately not fatal: starting from `now` avoids
/// reprocessing an unbounded log backlog on first run, at the cost of possibly skipping
/// events that predate this start.
pub async fn read_or_now(path: &Path) -> DateTime<Utc> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => match DateTime::parse_from_rfc3339(contents.trim()) {
            Ok(parsed) => parsed.with_timezone(&Utc),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "last-scan sidecar is malformed, starting from now");
                Utc::now()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Utc::now(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read last-scan sidecar, starting from now");
            Utc::now()
        }
    }
}

/// Write the cutoff to the sidecar, overwriting any previous contents.
pub async fn write(path: &Path, cutoff: DateTime<Utc>) -> Result<()> {
    tokio::fs::write(path, cutoff.to_rfc3339())
        .await
        .with_context(|| format!("failed to persist last-scan timestamp to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn round_trips_within_a_second() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".sayoko_last_scan");
        let now = Utc::now();
        write(&path, now).await.unwrap();
        let read_back = read_or_now(&path).await;
        assert!((read_back - now).num_seconds().abs() <= 1);
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_now() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("does-not-exist");
        let before = Utc::now();
        let value = read_or_now(&path).await;
        assert!(value >= before);
    }

    #[tokio::test]
    async fn malformed_file_falls_back_to_now() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".sayoko_last_scan");
        tokio::fs::write(&path, b"not a timestamp").await.unwrap();
        let before = Utc::now();
        let value = read_or_now(&path).await;
        assert!(value >= before);
    }
}
