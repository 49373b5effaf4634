//! Reads `<registry>/..logs` and dispatches mutation events to the ignore engine or
//! to bulk deregistration.

use crate::aggregate::ErrorCollector;
use crate::client::Client;
use crate::ignore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct LogEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    project: String,
    #[serde(default)]
    asset: String,
}

/// Outcome of one log-processing cycle.
pub struct Outcome {
    /// New cutoff: the newest entry timestamp seen, or the old cutoff if the log
    /// directory was empty of new entries. Always persisted regardless of errors.
    pub new_cutoff: DateTime<Utc>,
}

/// Cache of "is this project registered at all" answers, valid for one scan.
///
/// A project visited by several log entries in the same tick is checked once; see
/// SPEC_FULL.md §4.1 for why this gate exists at all.
struct OptInCache<'a> {
    client: &'a Client,
    registry: &'a Path,
    answers: HashMap<String, bool>,
}

impl<'a> OptInCache<'a> {
    fn new(client: &'a Client, registry: &'a Path) -> Self {
        Self {
            client,
            registry,
            answers: HashMap::new(),
        }
    }

    async fn is_opted_in(&mut self, project: &str) -> Result<bool, crate::client::IndexerError> {
        if let Some(answer) = self.answers.get(project) {
            return Ok(*answer);
        }
        let project_dir = self.registry.join(project);
        let answer = self.client.is_registered(&project_dir).await?;
        self.answers.insert(project.to_string(), answer);
        Ok(answer)
    }
}

/// Process every log entry newer than `cutoff`, returning the new cutoff and any
/// aggregated errors. The cutoff always advances to the newest entry examined,
/// independent of whether that entry (or any other) failed to process.
pub async fn process(registry: &Path, client: &Client, cutoff: DateTime<Utc>) -> (Outcome, Result<()>) {
    let logs_dir = registry.join("..logs");
    let mut errors = ErrorCollector::new();
    let mut newest = cutoff;

    let mut entries = match tokio::fs::read_dir(&logs_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            let outcome = Outcome { new_cutoff: cutoff };
            let err = anyhow::Error::from(e)
                .context(format!("failed to open directory handle for {}", logs_dir.display()));
            return (outcome, Err(err));
        }
    };

    let mut names = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().into_owned()),
            Ok(None) => break,
            Err(e) => {
                errors.push(
                    anyhow::Error::from(e)
                        .context(format!("failed to read log directory at {}", logs_dir.display())),
                );
                break;
            }
        }
    }

    let mut cache = OptInCache::new(client, registry);

    for name in names {
        let Some((stamp_str, _suffix)) = name.split_once('_') else {
            errors.push(anyhow::anyhow!("failed to parse time for {name:?}"));
            continue;
        };

        let stamp = match DateTime::parse_from_rfc3339(stamp_str) {
            Ok(stamp) => stamp.with_timezone(&Utc),
            Err(e) => {
                errors.push(anyhow::anyhow!("failed to parse time for {name:?}: {e}"));
                continue;
            }
        };

        if stamp <= cutoff {
            continue;
        }
        if stamp > newest {
            newest = stamp;
        }

        let entry_path = logs_dir.join(&name);
        if let Err(e) = process_one(registry, client, &mut cache, &entry_path).await {
            errors.push(e);
        }
    }

    let outcome = Outcome { new_cutoff: newest };
    (outcome, errors.into_result())
}

async fn process_one(
    registry: &Path,
    client: &Client,
    cache: &mut OptInCache<'_>,
    entry_path: &Path,
) -> Result<()> {
    let contents = tokio::fs::read(entry_path)
        .await
        .with_context(|| format!("failed to open {}", entry_path.display()))?;
    let payload: LogEntry = serde_json::from_slice(&contents)
        .with_context(|| format!("failed to parse {}", entry_path.display()))?;

    match payload.kind.as_str() {
        "add-version" | "delete-version" | "reindex-version" => {
            if payload.project.is_empty() || payload.asset.is_empty() {
                anyhow::bail!("empty project/asset fields in {}", entry_path.display());
            }
            if !cache.is_opted_in(&payload.project).await? {
                debug!(project = %payload.project, "skipping log entry for unregistered project");
                return Ok(());
            }
            let asset_dir = registry.join(&payload.project).join(&payload.asset);
            let force = payload.kind == "reindex-version";
            ignore::apply(&asset_dir, force).await?;
        }
        "delete-asset" => {
            if payload.project.is_empty() || payload.asset.is_empty() {
                anyhow::bail!("empty project/asset fields in {}", entry_path.display());
            }
            if !cache.is_opted_in(&payload.project).await? {
                return Ok(());
            }
            let asset_dir = registry.join(&payload.project).join(&payload.asset);
            client.deregister_all_within(&asset_dir).await?;
        }
        "delete-project" => {
            if payload.project.is_empty() {
                anyhow::bail!("empty project fields in {}", entry_path.display());
            }
            if !cache.is_opted_in(&payload.project).await? {
                return Ok(());
            }
            let project_dir = registry.join(&payload.project);
            client.deregister_all_within(&project_dir).await?;
        }
        other => {
            debug!(kind = other, path = %entry_path.display(), "ignoring unknown log entry type");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn rfc3339(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    async fn write_log(logs_dir: &Path, name: &str, body: &str) {
        tokio::fs::write(logs_dir.join(name), body).await.unwrap();
    }

    #[tokio::test]
    async fn missing_project_or_asset_is_an_empty_error() {
        let dir = tempdir().unwrap();
        let registry = dir.path();
        let logs_dir = registry.join("..logs");
        tokio::fs::create_dir_all(&logs_dir).await.unwrap();
        write_log(
            &logs_dir,
            "2022-02-22T02:22:22Z_a",
            r#"{"type": "add-version", "project": "", "asset": "bar"}"#,
        )
        .await;

        let client = Client::new("http://127.0.0.1:0");
        let (outcome, result) = process(registry, &client, rfc3339("2021-01-21T02:22:22Z")).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("empty"));
        assert_eq!(outcome.new_cutoff, rfc3339("2022-02-22T02:22:22Z"));
    }

    #[tokio::test]
    async fn cutoff_is_unchanged_when_nothing_is_newer() {
        let dir = tempdir().unwrap();
        let registry = dir.path();
        let logs_dir = registry.join("..logs");
        tokio::fs::create_dir_all(&logs_dir).await.unwrap();
        write_log(
            &logs_dir,
            "2020-01-01T00:00:00Z_a",
            r#"{"type": "add-version", "project": "foo", "asset": "bar"}"#,
        )
        .await;

        let client = Client::new("http://127.0.0.1:0");
        let now = rfc3339("2021-01-21T02:22:22Z");
        let (outcome, result) = process(registry, &client, now).await;
        assert!(result.is_ok());
        assert_eq!(outcome.new_cutoff, now);
    }

    #[tokio::test]
    async fn malformed_timestamp_prefix_is_reported() {
        let dir = tempdir().unwrap();
        let registry = dir.path();
        let logs_dir = registry.join("..logs");
        tokio::fs::create_dir_all(&logs_dir).await.unwrap();
        write_log(&logs_dir, "not-a-timestamp_a", "{}").await;

        let client = Client::new("http://127.0.0.1:0");
        let (_outcome, result) = process(registry, &client, rfc3339("2020-01-01T00:00:00Z")).await;
        assert!(result.is_err());
    }
}
