// src/error.rs
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CollectError>;

/// Failure reported by a content source for one call.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SourceError {
    #[error("transient network error: {0}")]
    Transient(String),

    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("scope not found: {0}")]
    ScopeNotFound(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Malformed(err.to_string())
    }
}

/// One scope that could not be collected during a multi-scope operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeFailure {
    pub scope: String,
    pub error: SourceError,
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("remote unavailable{}: {source}", scope_suffix(.scope))]
    RemoteUnavailable {
        scope: Option<String>,
        #[source]
        source: SourceError,
    },

    #[error("remote rate limited{}", scope_suffix(.scope))]
    RemoteRateLimited {
        scope: Option<String>,
        retry_after: Option<Duration>,
    },

    #[error("all {} scopes failed", .failures.len())]
    AllScopesFailed { failures: Vec<ScopeFailure> },

    #[error("operation timed out after {after:?}")]
    TimedOut { after: Duration },
}

fn scope_suffix(scope: &Option<String>) -> String {
    scope
        .as_deref()
        .map(|s| format!(" for scope {s}"))
        .unwrap_or_default()
}

impl CollectError {
    /// Lift a source failure for `scope` (`None` = global) into the operation error.
    pub fn from_source(scope: Option<&str>, err: SourceError) -> Self {
        let scope = scope.map(str::to_string);
        match err {
            SourceError::RateLimited { retry_after } => {
                CollectError::RemoteRateLimited { scope, retry_after }
            }
            other => CollectError::RemoteUnavailable {
                scope,
                source: other,
            },
        }
    }

    /// Whether an outer retry policy may try the same call again.
    pub fn is_retryable(&self) -> bool {
        match self {
            CollectError::InvalidArgument(_) => false,
            CollectError::RemoteUnavailable { source, .. } => {
                matches!(source, SourceError::Transient(_))
            }
            CollectError::RemoteRateLimited { .. } | CollectError::TimedOut { .. } => true,
            CollectError::AllScopesFailed { failures } => failures.iter().any(|f| {
                matches!(
                    f.error,
                    SourceError::Transient(_) | SourceError::RateLimited { .. }
                )
            }),
        }
    }
}
