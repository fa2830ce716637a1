//! Error types for the scandesk library.
//!
//! This module provides structured, typed errors for every failure the
//! scan workflow can hit. The library never panics; all errors are returned
//! as `Result` values.

use crate::core::types::{DigestKind, SessionId};

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for scan operations.
///
/// Provider-side variants carry the provider name so the failure can be
/// attributed in logs and in the `Failed` view.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A scan was requested while the intake is empty.
    #[error("no file selected")]
    NoFileSelected,

    /// The selected file cannot be accepted (empty name, directory, ...).
    #[error("invalid file: {reason}")]
    InvalidFile {
        /// Why the file was refused.
        reason: String,
    },

    /// A digest string is not valid hex of the expected length.
    #[error("invalid {kind} digest: {reason}")]
    InvalidDigest {
        /// Algorithm the digest was parsed as.
        kind: DigestKind,
        /// What is wrong with it.
        reason: String,
    },

    /// The requested action is not allowed while a scan is running.
    #[error("a scan is already in progress")]
    ScanInProgress,

    /// The verdict provider (or the backend behind it) cannot be reached.
    #[error("provider '{provider}' is unavailable: {reason}")]
    ProviderUnavailable {
        /// Name of the provider.
        provider: String,
        /// Human-readable reason for unavailability.
        reason: String,
    },

    /// The provider was reached but reported a failure.
    #[error("provider '{provider}' failed: {reason}")]
    ProviderError {
        /// Name of the provider.
        provider: String,
        /// Human-readable reason reported by the provider.
        reason: String,
    },

    /// No terminal event arrived within the configured bound.
    #[error("scan timed out after {elapsed:?}")]
    Timeout {
        /// How long the session waited before giving up.
        elapsed: Duration,
    },

    /// An event belongs to a session that is no longer current.
    ///
    /// Never shown to the user; the orchestrator drops these events.
    #[error("discarded event for stale session {session} (current: {current:?})")]
    StaleSession {
        /// The session the event was addressed to.
        session: SessionId,
        /// The session that is currently scanning, if any.
        current: Option<SessionId>,
    },

    /// The file exceeds what the provider accepts.
    #[error("file size {size} bytes exceeds maximum {max} bytes")]
    FileTooLarge {
        /// Actual file size in bytes.
        size: u64,
        /// Maximum allowed size in bytes.
        max: u64,
    },

    /// File not found at the specified path.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path that was not found.
        path: PathBuf,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The provider answered with something that cannot be turned into a verdict.
    #[error("malformed response from provider '{provider}': {details}")]
    MalformedResponse {
        /// Name of the provider.
        provider: String,
        /// What was wrong with the response.
        details: String,
    },

    /// Rate limit exceeded for the provider.
    #[error("rate limit exceeded for provider '{provider}': retry after {retry_after:?}")]
    RateLimited {
        /// Name of the provider.
        provider: String,
        /// Suggested wait time before retry.
        retry_after: Option<Duration>,
    },

    /// Authentication failed for the provider.
    #[error("authentication failed for provider '{provider}': {reason}")]
    AuthenticationFailed {
        /// Name of the provider.
        provider: String,
        /// Reason for authentication failure.
        reason: String,
    },

    /// The scan service has shut down and no longer accepts commands.
    #[error("scan service is closed")]
    SessionClosed,

    /// An internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl ScanError {
    /// Returns `true` if this error should reach the user.
    ///
    /// Stale-session events are filtered internally and never displayed.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::StaleSession { .. })
    }

    /// Returns `true` if retrying the same scan later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::ProviderUnavailable { .. } | Self::RateLimited { .. }
        )
    }

    /// Returns the provider name if this error is associated with one.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::ProviderUnavailable { provider, .. }
            | Self::ProviderError { provider, .. }
            | Self::MalformedResponse { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::AuthenticationFailed { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Creates a `ProviderUnavailable` error.
    pub fn provider_unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ProviderError` error.
    pub fn provider_error(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `MalformedResponse` error.
    pub fn malformed(provider: impl Into<String>, details: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider: provider.into(),
            details: details.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    /// Creates an `InvalidFile` error.
    pub fn invalid_file(reason: impl Into<String>) -> Self {
        Self::InvalidFile {
            reason: reason.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Error type for backend process supervision.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The backend executable could not be spawned.
    #[error("failed to spawn backend '{}': {source}", program.display())]
    SpawnFailed {
        /// The executable that was launched.
        program: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The backend exited before it started accepting connections.
    #[error("backend exited during startup with {status}")]
    ExitedEarly {
        /// Exit status reported by the OS.
        status: std::process::ExitStatus,
    },

    /// The backend did not open its port in time.
    #[error("backend at {address} not ready after {waited:?}")]
    NotReady {
        /// Address that was probed.
        address: String,
        /// How long the supervisor waited.
        waited: Duration,
    },

    /// An I/O error occurred while managing the child process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// A specialized `Result` type for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_session_is_not_user_visible() {
        let err = ScanError::StaleSession {
            session: SessionId::new(1),
            current: Some(SessionId::new(2)),
        };
        assert!(!err.is_user_visible());
        assert!(ScanError::NoFileSelected.is_user_visible());
    }

    #[test]
    fn test_scan_error_is_recoverable() {
        assert!(ScanError::timeout(Duration::from_secs(30)).is_recoverable());
        assert!(ScanError::provider_unavailable("local", "refused").is_recoverable());
        assert!(!ScanError::provider_error("local", "bad file").is_recoverable());
    }

    #[test]
    fn test_scan_error_provider() {
        let err = ScanError::provider_unavailable("virustotal", "dns failure");
        assert_eq!(err.provider(), Some("virustotal"));

        let io_err = ScanError::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(io_err.provider(), None);
    }

    #[test]
    fn test_scan_error_display() {
        let err = ScanError::FileTooLarge {
            size: 100_000_000,
            max: 33_554_432,
        };
        assert!(err.to_string().contains("100000000"));
        assert!(err.to_string().contains("33554432"));
    }
}
