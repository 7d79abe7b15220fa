//! Error types for fewshot.
//!
//! The taxonomy mirrors the recovery policy of the experiment loop:
//! configuration and template problems are fatal before any I/O,
//! connectivity failures are retried and then skipped per item, and a
//! malformed provider response halts the run.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for fewshot.
#[derive(Debug, Error)]
pub enum FewshotError {
    // ── Fatal before any network I/O ────────────────────────────────────

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Unknown template \"{template}\": valid options are {available}")]
    Template { template: String, available: String },

    #[error("Unsupported engine \"{engine}\" for the {adapter} adapter")]
    UnsupportedEngine {
        engine: String,
        adapter: &'static str,
    },

    // ── Recovered locally (per-item skip) ───────────────────────────────

    #[error("Connection failed after {attempts} attempts: {source}")]
    Connectivity {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    // ── Run-fatal during the real pass ──────────────────────────────────

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Vision input \"{input}\" could not be converted: {reason}")]
    VisionInput { input: String, reason: String },

    #[error("Sampling error: {0}")]
    Sampling(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Transport-level failures, the only retryable kind.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
}

impl TransportError {
    /// Whether the retry loop should try again after this failure.
    ///
    /// Rate limiting and server-side failures count as connectivity;
    /// client errors (4xx other than 429) do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

impl FewshotError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the experiment loop should skip the current item and
    /// continue, rather than abort the run.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }
}

/// Result type alias for fewshot.
pub type Result<T> = std::result::Result<T, FewshotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let rate_limited = TransportError::Status {
            status: 429,
            message: "too many requests".to_string(),
        };
        assert!(rate_limited.is_retryable());

        let server = TransportError::Status {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(server.is_retryable());

        let auth = TransportError::Status {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert!(!auth.is_retryable());
    }

    #[test]
    fn test_connectivity_is_skippable() {
        let err = FewshotError::Connectivity {
            attempts: 5,
            source: TransportError::Timeout(Duration::from_secs(1)),
        };
        assert!(err.is_connectivity());
        assert!(!FewshotError::InvalidResponse("empty".to_string()).is_connectivity());
    }
}
