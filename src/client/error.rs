//! Typed failures from the indexer client.

use thiserror::Error;

/// Failures that can arise from talking to the indexer's REST API.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// The indexer returned a non-success status with a parseable reason.
    #[error("indexer rejected the request ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    /// The indexer's error body had a `Content-Type` we don't know how to parse.
    #[error("indexer returned an error ({status}) with unrecognized content type {content_type:?}")]
    UnknownErrorBody { status: u16, content_type: Option<String> },

    /// A low-level transport failure (connection refused, timeout, TLS, ...).
    #[error("request to indexer failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The indexer's response body didn't match the shape we expected.
    #[error("failed to parse indexer response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    /// The indexer's JSON error body was missing or had the wrong shape.
    #[error("malformed error response from indexer ({status}): {detail}")]
    MalformedErrorBody { status: u16, detail: String },

    /// A filesystem operation needed to complete a register/deregister call failed.
    #[error("filesystem error during {operation} of {path:?}: {source}")]
    Io {
        operation: &'static str,
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parse the body of a non-success response per the indexer's error contract:
/// `application/json` bodies must be `{"reason": string}`; `text/plain` bodies are
/// taken verbatim; anything else is unrecognized.
pub(crate) async fn parse_failure(status: u16, response: reqwest::Response) -> IndexerError {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

    match content_type.as_deref() {
        Some("application/json") => match response.json::<ErrorBody>().await {
            Ok(body) => IndexerError::Rejected {
                status,
                reason: body.reason,
            },
            Err(e) => IndexerError::MalformedErrorBody {
                status,
                detail: e.to_string(),
            },
        },
        Some("text/plain") => match response.text().await {
            Ok(text) => IndexerError::Rejected {
                status,
                reason: text,
            },
            Err(e) => IndexerError::MalformedErrorBody {
                status,
                detail: format!("failed to read error response body: {e}"),
            },
        },
        other => IndexerError::UnknownErrorBody {
            status,
            content_type: other.map(|s| s.to_string()),
        },
    }
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    reason: String,
}
