//! The ignore-policy engine: ensures exactly the `..latest` version of an asset is
//! unmarked, and every other version carries the `.SewerRatignore` sentinel.

use crate::aggregate::ErrorCollector;
use crate::latest::read_latest_version;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

const SENTINEL_NAME: &str = ".SewerRatignore";

/// Outcome of applying the ignore policy to one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    /// Whether any sentinel was created or removed this call.
    pub changed: bool,
}

/// Reconcile the sentinel files under `asset_dir` with its `..latest` marker.
///
/// For every version subdirectory, a `.SewerRatignore` sentinel exists if and only if
/// that version is not the latest. If `..latest` is absent (or names a version that no
/// longer exists on disk), every remaining version is marked ignored — there is no
/// "latest" to exempt.
///
/// Idempotent: calling this again with no filesystem change produces `changed: false`.
pub async fn apply(asset_dir: &Path, force: bool) -> Result<Applied> {
    let latest_version = read_latest_version(asset_dir).await?;

    let mut entries = tokio::fs::read_dir(asset_dir)
        .await
        .with_context(|| format!("failed to read versions of {}", asset_dir.display()))?;

    let mut changed = false;
    let mut errors = ErrorCollector::new();

    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to read versions of {}", asset_dir.display()))?
    {
        let file_type = match entry.file_type().await {
            Ok(ft) => ft,
            Err(e) => {
                errors.push(anyhow::anyhow!(
                    "failed to stat {}: {e}",
                    entry.path().display()
                ));
                continue;
            }
        };
        if !file_type.is_dir() {
            continue;
        }

        let version = entry.file_name().to_string_lossy().into_owned();
        let sentinel_path = entry.path().join(SENTINEL_NAME);
        let is_latest = !latest_version.is_empty() && version == latest_version;
        let sentinel_exists = match tokio::fs::metadata(&sentinel_path).await {
            Ok(_) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                errors.push(anyhow::anyhow!(
                    "failed to stat ignore file at {}: {e}",
                    sentinel_path.display()
                ));
                continue;
            }
        };

        if is_latest {
            if sentinel_exists {
                match tokio::fs::remove_file(&sentinel_path).await {
                    Ok(()) => {
                        changed = true;
                        debug!(path = %sentinel_path.display(), "unmarked latest version");
                    }
                    Err(e) => errors.push(anyhow::anyhow!(
                        "failed to remove ignore file at {}: {e}",
                        sentinel_path.display()
                    )),
                }
            } else if force {
                // A reindex request on the version that's already unmarked: flip the
                // sentinel off and back on so the caller observes `changed = true` and
                // triggers the downstream re-registration this call exists to request.
                changed = true;
            }
        } else if !sentinel_exists {
            match tokio::fs::write(&sentinel_path, []).await {
                Ok(()) => {
                    changed = true;
                    debug!(path = %sentinel_path.display(), "marked non-latest version ignored");
                }
                Err(e) => errors.push(anyhow::anyhow!(
                    "failed to write ignore file to {}: {e}",
                    sentinel_path.display()
                )),
            }
        }
    }

    errors.into_result()?;
    Ok(Applied { changed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn make_versions(asset_dir: &Path, versions: &[&str]) {
        for v in versions {
            tokio::fs::create_dir_all(asset_dir.join(v)).await.unwrap();
        }
    }

    async fn set_latest(asset_dir: &Path, version: &str) {
        tokio::fs::write(
            asset_dir.join("..latest"),
            format!(r#"{{"version": "{version}"}}"#),
        )
        .await
        .unwrap();
    }

    async fn is_ignored(asset_dir: &Path, version: &str) -> bool {
        tokio::fs::try_exists(asset_dir.join(version).join(SENTINEL_NAME))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn marks_everything_but_latest() {
        let dir = tempdir().unwrap();
        let asset_dir = dir.path().join("leilla").join("kanon");
        make_versions(&asset_dir, &["1", "2", "3"]).await;
        set_latest(&asset_dir, "3").await;

        let applied = apply(&asset_dir, false).await.unwrap();
        assert!(applied.changed);
        assert!(is_ignored(&asset_dir, "1").await);
        assert!(is_ignored(&asset_dir, "2").await);
        assert!(!is_ignored(&asset_dir, "3").await);
    }

    #[tokio::test]
    async fn reapplying_with_no_change_is_not_observable() {
        let dir = tempdir().unwrap();
        let asset_dir = dir.path().join("leilla").join("kanon");
        make_versions(&asset_dir, &["1", "2", "3"]).await;
        set_latest(&asset_dir, "3").await;

        apply(&asset_dir, false).await.unwrap();
        let second = apply(&asset_dir, false).await.unwrap();
        assert!(!second.changed);
    }

    #[tokio::test]
    async fn moving_latest_flips_sentinels() {
        let dir = tempdir().unwrap();
        let asset_dir = dir.path().join("leilla").join("kanon");
        make_versions(&asset_dir, &["1", "2", "3"]).await;
        set_latest(&asset_dir, "3").await;
        apply(&asset_dir, false).await.unwrap();

        set_latest(&asset_dir, "1").await;
        let applied = apply(&asset_dir, false).await.unwrap();
        assert!(applied.changed);
        assert!(!is_ignored(&asset_dir, "1").await);
        assert!(is_ignored(&asset_dir, "2").await);
        assert!(is_ignored(&asset_dir, "3").await);
    }

    #[tokio::test]
    async fn no_latest_marker_ignores_all_versions() {
        let dir = tempdir().unwrap();
        let asset_dir = dir.path().join("foo").join("bar");
        make_versions(&asset_dir, &["1", "2"]).await;

        apply(&asset_dir, false).await.unwrap();
        assert!(is_ignored(&asset_dir, "1").await);
        assert!(is_ignored(&asset_dir, "2").await);
    }

    #[tokio::test]
    async fn latest_naming_missing_version_still_marks_the_rest() {
        let dir = tempdir().unwrap();
        let asset_dir = dir.path().join("foo").join("bar");
        make_versions(&asset_dir, &["1", "2"]).await;
        set_latest(&asset_dir, "3").await;

        let applied = apply(&asset_dir, false).await.unwrap();
        assert!(applied.changed);
        assert!(is_ignored(&asset_dir, "1").await);
        assert!(is_ignored(&asset_dir, "2").await);
    }

    #[tokio::test]
    async fn force_on_already_unmarked_latest_reports_changed() {
        let dir = tempdir().unwrap();
        let asset_dir = dir.path().join("leilla").join("kanon");
        make_versions(&asset_dir, &["1", "2"]).await;
        set_latest(&asset_dir, "2").await;
        apply(&asset_dir, false).await.unwrap();

        let forced = apply(&asset_dir, true).await.unwrap();
        assert!(forced.changed);
    }
}
