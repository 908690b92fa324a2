//! Error taxonomy for source adapters and the request boundary.
//!
//! Adapter errors never travel past the dispatcher: a failing source is
//! logged and degrades to an empty contribution. The only errors a caller of
//! the boundary operations sees are [`BoundaryError`]s describing a malformed
//! request, plus the adapter failure surfaced by a direct crawl.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification of an [`AdapterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    /// Network or HTTP failure talking to the upstream source.
    Upstream,
    /// The upstream answered but the body could not be understood.
    Parse,
    /// A deadline was hit before the upstream answered.
    Timeout,
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AdapterErrorKind::Upstream => "upstream",
            AdapterErrorKind::Parse => "parse",
            AdapterErrorKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Failure of a single adapter call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

impl AdapterError {
    pub fn kind(&self) -> AdapterErrorKind {
        match self {
            AdapterError::Upstream(_) => AdapterErrorKind::Upstream,
            AdapterError::Parse(_) => AdapterErrorKind::Parse,
            AdapterError::Timeout(_) => AdapterErrorKind::Timeout,
        }
    }

    /// Build an upstream error from a non-success HTTP status.
    pub fn status(status: StatusCode, body: &str) -> Self {
        AdapterError::Upstream(format!(
            "status {}: {}",
            status.as_u16(),
            crate::utils::truncate_for_log(body, 200)
        ))
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout(err.to_string())
        } else if err.is_decode() {
            AdapterError::Parse(err.to_string())
        } else {
            AdapterError::Upstream(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Parse(err.to_string())
    }
}

impl From<rss::Error> for AdapterError {
    fn from(err: rss::Error) -> Self {
        AdapterError::Parse(err.to_string())
    }
}

/// Errors raised while loading or validating the YAML config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors returned by the boundary operations themselves.
#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("source {label} failed: {source}")]
    Source {
        label: String,
        #[source]
        source: AdapterError,
    },
}

impl BoundaryError {
    /// HTTP-equivalent status code for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BoundaryError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BoundaryError::UnknownSource(_) => StatusCode::NOT_FOUND,
            BoundaryError::Source { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}
