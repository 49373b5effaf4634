//! Reads the `..latest` marker that names the current version of an asset.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct LatestMarker {
    #[serde(default)]
    version: String,
}

/// Read `<asset_dir>/..latest`.
///
/// A missing marker is not an error: it means the asset has no designated latest
/// version, and callers should treat every version as ignorable. A present-but-malformed
/// marker is an error: we have no safe default to fall back to, so the asset is skipped
/// for this cycle rather than guessed at.
pub async fn read_latest_version(asset_dir: &Path) -> Result<String> {
    let marker_path = asset_dir.join("..latest");

    let contents = match tokio::fs::read(&marker_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to open {}", marker_path.display()))
        }
    };

    let marker: LatestMarker = serde_json::from_slice(&contents)
        .with_context(|| format!("failed to parse {}", marker_path.display()))?;
    Ok(marker.version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_marker_returns_empty_string() {
        let dir = tempdir().unwrap();
        let version = read_latest_version(dir.path()).await.unwrap();
        assert_eq!(version, "");
    }

    #[tokio::test]
    async fn present_marker_returns_named_version() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("..latest"), r#"{"version": "3"}"#)
            .await
            .unwrap();
        let version = read_latest_version(dir.path()).await.unwrap();
        assert_eq!(version, "3");
    }

    #[tokio::test]
    async fn malformed_marker_is_an_error() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("..latest"), b"not json")
            .await
            .unwrap();
        assert!(read_latest_version(dir.path()).await.is_err());
    }
}
