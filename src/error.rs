//! Error types shared across the fetch pipeline
//!
//! `FetchError` is what callers of the coordinator see. `StorageError` only
//! ever surfaces from cache backends and preference files and is swallowed
//! (and logged) by the cache store.

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur when fetching a weather snapshot
///
/// Cloneable so one failed upstream call can be handed to every caller
/// attached to the same in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Upstream call failed, timed out, or returned a non-success status
    #[error("network error: {0}")]
    Network(String),

    /// Upstream payload missing required fields or with misaligned arrays
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Distinguishes fetch failures for logging and presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Network,
    MalformedResponse,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Network(_) => FetchErrorKind::Network,
            Self::MalformedResponse(_) => FetchErrorKind::MalformedResponse,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network(format!("request timed out: {}", err))
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Errors from a cache backend or preference file
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_distinguishes_variants() {
        assert_eq!(
            FetchError::Network("boom".into()).kind(),
            FetchErrorKind::Network
        );
        assert_eq!(
            FetchError::malformed("hourly.time").kind(),
            FetchErrorKind::MalformedResponse
        );
    }

    #[test]
    fn test_display_messages() {
        let err = FetchError::Network("connection refused".into());
        assert_eq!(err.to_string(), "network error: connection refused");
        let err = FetchError::malformed("missing field current");
        assert!(err.to_string().contains("malformed response"));
    }

    #[test]
    fn test_storage_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: StorageError = io.into();
        assert!(err.to_string().contains("denied"));
    }
}
