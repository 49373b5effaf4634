//! Client for the indexer's REST API.
//!
//! Wraps listing of registered directories (by containment or path-prefix, with an
//! optional "missing on disk" filter) and the two-phase register/deregister protocol
//! described in the wire contract: a `start` call hands back a challenge filename, the
//! caller proves write access by creating it, and `finish` completes the operation.

mod error;

pub use error::IndexerError;

use crate::aggregate::ErrorCollector;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How [`Client::list_registered`] should scope its query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// All registered directories strictly inside `dir`.
    Within,
    /// Same as [`ListMode::Within`], but only directories that no longer exist on disk.
    WithinMissing,
    /// Whether `dir` itself (or an ancestor it represents) is registered at all.
    Contains,
}

/// A thin wrapper over the indexer's base URL.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct RegisteredDirectory {
    path: String,
}

#[derive(Debug, Serialize)]
struct PathRequest<'a> {
    path: &'a str,
}

#[derive(Debug, Serialize)]
struct FinishRequest<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    base: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    code: String,
    #[serde(default)]
    status: Option<String>,
}

impl Client {
    /// Create a client bound to a given indexer base URL (no trailing slash expected).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            dry_run: false,
        }
    }

    /// In dry-run mode, register/deregister calls are logged but never issued; listing
    /// calls still hit the indexer, since they're read-only and the caller needs real
    /// answers to decide what it *would* do.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    async fn list_raw(&self, query: &[(&str, &str)]) -> Result<Vec<RegisteredDirectory>, IndexerError> {
        let response = self
            .http
            .get(format!("{}/registered", self.base_url))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(error::parse_failure(status.as_u16(), response).await);
        }

        Ok(response.json::<Vec<RegisteredDirectory>>().await?)
    }

    /// List registered directories under `dir` per `mode`, returning absolute paths.
    pub async fn list_registered(&self, dir: &Path, mode: ListMode) -> Result<Vec<String>, IndexerError> {
        let dir_str = dir.to_string_lossy().into_owned();
        let entries = match mode {
            ListMode::Within => self.list_raw(&[("within_path", &dir_str)]).await?,
            ListMode::WithinMissing => {
                self.list_raw(&[("within_path", &dir_str), ("exists", "false")])
                    .await?
            }
            ListMode::Contains => self.list_raw(&[("contains_path", &dir_str)]).await?,
        };
        Ok(entries.into_iter().map(|e| e.path).collect())
    }

    /// Whether `dir` (or an ancestor representing it) is registered with the indexer.
    pub async fn is_registered(&self, dir: &Path) -> Result<bool, IndexerError> {
        let hits = self.list_registered(dir, ListMode::Contains).await?;
        Ok(!hits.is_empty())
    }

    async fn start(&self, endpoint: &str, dir: &str) -> Result<StartResponse, IndexerError> {
        let response = self
            .http
            .post(format!("{}/{}/start", self.base_url, endpoint))
            .json(&PathRequest { path: dir })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(error::parse_failure(status.as_u16(), response).await);
        }

        Ok(response.json::<StartResponse>().await?)
    }

    async fn finish(
        &self,
        endpoint: &str,
        dir: &str,
        base: Option<&[String]>,
    ) -> Result<(), IndexerError> {
        let response = self
            .http
            .post(format!("{}/{}/finish", self.base_url, endpoint))
            .json(&FinishRequest { path: dir, base })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(error::parse_failure(status.as_u16(), response).await);
        }
        Ok(())
    }

    /// Register `dir` with the indexer, optionally limiting the crawl to `base` filenames.
    pub async fn register(&self, dir: &Path, base: Option<&[String]>) -> Result<(), IndexerError> {
        self.two_phase("register", dir, base).await
    }

    /// Deregister `dir` from the indexer.
    pub async fn deregister(&self, dir: &Path) -> Result<(), IndexerError> {
        self.two_phase("deregister", dir, None).await
    }

    async fn two_phase(
        &self,
        endpoint: &str,
        dir: &Path,
        base: Option<&[String]>,
    ) -> Result<(), IndexerError> {
        let dir_str = dir.to_string_lossy().into_owned();

        if self.dry_run {
            info!(dir = %dir_str, operation = endpoint, "dry-run: not issuing request");
            return Ok(());
        }

        let start = self.start(endpoint, &dir_str).await?;

        if endpoint == "deregister" && start.status.as_deref() == Some("SUCCESS") {
            debug!(dir = %dir_str, "indexer completed deregistration at the start phase");
            return Ok(());
        }

        let code_path = dir.join(&start.code);
        create_challenge_file(&code_path).await?;

        let result = self.finish(endpoint, &dir_str, base).await;

        if let Err(e) = tokio::fs::remove_file(&code_path).await {
            warn!(path = %code_path.display(), error = %e, "failed to remove challenge file");
        }

        result
    }

    /// Deregister every directory registered strictly within `dir`.
    ///
    /// Errors from individual deregistrations are aggregated rather than short-circuiting,
    /// so one uncooperative directory doesn't prevent cleanup of the rest.
    pub async fn deregister_all_within(&self, dir: &Path) -> anyhow::Result<()> {
        let within = self.list_registered(dir, ListMode::Within).await?;
        self.deregister_many(within).await
    }

    /// Deregister every directory registered within `dir` that no longer exists on disk.
    pub async fn deregister_missing_within(&self, dir: &Path) -> anyhow::Result<()> {
        let missing = self.list_registered(dir, ListMode::WithinMissing).await?;
        self.deregister_many(missing).await
    }

    async fn deregister_many(&self, paths: Vec<String>) -> anyhow::Result<()> {
        let mut errors = ErrorCollector::new();
        for path in paths {
            if let Err(e) = self.deregister(Path::new(&path)).await {
                warn!(path = %path, error = %e, "failed to deregister");
                errors.push(e);
            }
        }
        errors.into_result()
    }
}

async fn create_challenge_file(path: &PathBuf) -> Result<(), IndexerError> {
    tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await
        .map(|_| ())
        .map_err(|source| IndexerError::Io {
            operation: "create challenge file",
            path: path.clone(),
            source,
        })
}
