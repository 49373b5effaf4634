//! Walks the registry top-down and reconciles every asset's ignore policy, then
//! cleans up indexer entries for paths that no longer exist on disk.

use crate::aggregate::ErrorCollector;
use crate::client::Client;
use crate::ignore;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Run one full scan of `registry`.
///
/// If the registry root itself can't be listed, that failure is returned immediately
/// and no deregistration is attempted — a transient mount failure must never look like
/// "everything was deleted" to the indexer.
pub async fn scan(registry: &Path, client: &Client) -> Result<()> {
    let mut projects = tokio::fs::read_dir(registry)
        .await
        .with_context(|| format!("failed to read the registry contents at {}", registry.display()))?;

    let mut errors = ErrorCollector::new();

    loop {
        let entry = match projects.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                errors.push(
                    anyhow::Error::from(e)
                        .context(format!("failed to read the registry contents at {}", registry.display())),
                );
                break;
            }
        };

        let project_name = entry.file_name().to_string_lossy().into_owned();
        if project_name.starts_with("..") {
            continue;
        }

        let file_type = match entry.file_type().await {
            Ok(ft) => ft,
            Err(e) => {
                errors.push(anyhow::anyhow!("failed to stat {}: {e}", entry.path().display()));
                continue;
            }
        };
        if !file_type.is_dir() {
            continue;
        }

        if let Err(e) = scan_project(&entry.path()).await {
            errors.push(e.context(format!("failed to list assets for project {project_name:?}")));
        }
    }

    // Only attempted once the registry root itself was confirmed readable above.
    if let Err(e) = client.deregister_missing_within(registry).await {
        errors.push(e);
    }

    errors.into_result()
}

async fn scan_project(project_dir: &Path) -> Result<()> {
    let mut assets = tokio::fs::read_dir(project_dir)
        .await
        .with_context(|| format!("failed to read project directory {}", project_dir.display()))?;

    let mut errors = ErrorCollector::new();

    loop {
        let entry = match assets.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                errors.push(anyhow::Error::from(e).context(format!(
                    "failed to read project directory {}",
                    project_dir.display()
                )));
                break;
            }
        };

        let asset_name = entry.file_name().to_string_lossy().into_owned();
        if asset_name.starts_with("..") {
            continue;
        }

        let file_type = match entry.file_type().await {
            Ok(ft) => ft,
            Err(e) => {
                errors.push(anyhow::anyhow!("failed to stat {}: {e}", entry.path().display()));
                continue;
            }
        };
        if !file_type.is_dir() {
            continue;
        }

        match ignore::apply(&entry.path(), false).await {
            Ok(applied) => {
                debug!(asset = %entry.path().display(), changed = applied.changed, "reconciled asset");
            }
            Err(e) => errors.push(e),
        }
    }

    errors.into_result()
}
