//! Error types for upstream provider calls and card lookups.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure talking to an upstream price provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// Network failure, timeout, 5xx, or an open circuit breaker
    #[error("{provider} unavailable: {message}")]
    Unavailable {
        provider: &'static str,
        message: String,
    },

    /// HTTP 429
    #[error("{provider} rate limited")]
    RateLimited { provider: &'static str },

    /// The card, set or product does not exist upstream
    #[error("{what} not found")]
    NotFound { what: String },

    /// The query was rejected (client input or upstream 400/422)
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    /// The upstream answered but the payload did not parse
    #[error("{provider} returned an unreadable response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },
}

impl UpstreamError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UpstreamError::Unavailable { .. } | UpstreamError::RateLimited { .. }
        )
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        UpstreamError::NotFound { what: what.into() }
    }

    /// Map a non-success HTTP status to an error kind.
    pub fn from_status(provider: &'static str, status: StatusCode, body: &str) -> Self {
        match status.as_u16() {
            429 => UpstreamError::RateLimited { provider },
            404 => UpstreamError::not_found(format!("{} resource", provider)),
            400 | 422 => UpstreamError::MalformedQuery(truncate(body, 200)),
            _ => UpstreamError::Unavailable {
                provider,
                message: format!("HTTP {} - {}", status, truncate(body, 200)),
            },
        }
    }

    /// Map a transport-level reqwest failure.
    pub fn from_transport(provider: &'static str, err: &reqwest::Error) -> Self {
        if err.is_decode() {
            return UpstreamError::Decode {
                provider,
                message: err.to_string(),
            };
        }
        UpstreamError::Unavailable {
            provider,
            message: err.to_string(),
        }
    }
}

/// Failure of a user-facing price lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("card not found")]
    NotFound,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
