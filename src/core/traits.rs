//! Core traits for the scandesk library.
//!
//! This module defines the `VerdictProvider` trait that every scanning
//! backend implements. The orchestrator only ever talks to a provider
//! through this trait.

use crate::core::error::ScanError;
use crate::core::input::SelectedFile;
use crate::core::progress::ProgressReporter;
use crate::core::verdict::ScanVerdict;

use async_trait::async_trait;
use std::fmt::Debug;

/// A source of aggregated multi-engine verdicts.
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync`; a provider is shared between the
///   orchestrator and the task running the current scan.
/// - `submit` may publish any number of progress updates through the
///   reporter before returning. Percentages should not decrease; the
///   orchestrator drops updates that do.
/// - The returned future can be dropped at any point when the user abandons
///   the scan, so implementations should not rely on running to completion.
/// - Implementations should never panic; failures are returned as `ScanError`.
///   Unreachable services map to `ProviderUnavailable`, failures reported by
///   the service map to `ProviderError`.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use scandesk::core::{ProgressReporter, ScanError, ScanPhase, ScanVerdict, SelectedFile, VerdictProvider};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct AlwaysClean;
///
/// #[async_trait]
/// impl VerdictProvider for AlwaysClean {
///     fn name(&self) -> &str {
///         "always-clean"
///     }
///
///     async fn submit(
///         &self,
///         _file: &SelectedFile,
///         progress: &ProgressReporter,
///     ) -> Result<ScanVerdict, ScanError> {
///         progress.enter(ScanPhase::QueryingEngines);
///         Ok(ScanVerdict::new(0, 0, 1, 1))
///     }
///
///     async fn health_check(&self) -> Result<(), ScanError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait VerdictProvider: Send + Sync + Debug {
    /// Stable, human-readable provider name (e.g. `"local-backend"`).
    fn name(&self) -> &str;

    /// Submits a file and waits for its aggregated verdict.
    ///
    /// # Errors
    ///
    /// - `ProviderUnavailable` - the service cannot be reached.
    /// - `ProviderError` - the service reported a failure.
    /// - `MalformedResponse` - the reply could not be turned into a verdict.
    /// - `FileTooLarge` - the file exceeds `max_file_size`.
    async fn submit(
        &self,
        file: &SelectedFile,
        progress: &ProgressReporter,
    ) -> Result<ScanVerdict, ScanError>;

    /// Lightweight reachability check that does not submit a file.
    async fn health_check(&self) -> Result<(), ScanError>;

    /// Returns the maximum file size this provider accepts, if limited.
    fn max_file_size(&self) -> Option<u64> {
        None
    }
}

/// An arc-wrapped provider for shared ownership.
pub type ArcProvider = std::sync::Arc<dyn VerdictProvider>;

/// Rejects files larger than the provider's limit.
pub fn ensure_within_limit(provider: &dyn VerdictProvider, size: u64) -> Result<(), ScanError> {
    match provider.max_file_size() {
        Some(max) if size > max => Err(ScanError::FileTooLarge { size, max }),
        _ => Ok(()),
    }
}
