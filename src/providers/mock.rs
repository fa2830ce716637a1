//! Mock verdict provider for testing.
//!
//! This module provides a configurable provider that can be used in tests
//! and demos to simulate verdicts, failures and slow scans without a
//! backend.

use crate::core::{
    FileHasher, ProgressReporter, ScanError, ScanPhase, ScanVerdict, SelectedFile, VerdictProvider,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// How a mock provider fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// Behave like an unreachable backend.
    Unavailable(String),
    /// Behave like a backend that reports an error.
    ProviderError(String),
    /// Never return.
    Hang,
}

/// A mock provider for testing purposes.
///
/// Verdicts can be configured per SHA-256 of the submitted file, with a
/// default verdict for everything else. Unless disabled, the mock walks
/// through every scan phase and attaches the real digests of the file.
///
/// # Examples
///
/// ```rust
/// use scandesk::core::ScanVerdict;
/// use scandesk::providers::MockProvider;
/// use std::time::Duration;
///
/// // Every file is clean
/// let provider = MockProvider::clean();
///
/// // Every file is flagged by 3 of 60 engines, each phase takes 50ms
/// let provider = MockProvider::new()
///     .with_verdict(ScanVerdict::new(3, 0, 57, 60))
///     .with_latency(Duration::from_millis(50));
/// ```
#[derive(Debug)]
pub struct MockProvider {
    /// Name of this provider instance.
    name: String,
    /// Verdicts keyed by lowercase SHA-256.
    responses: RwLock<HashMap<String, ScanVerdict>>,
    /// Verdict for files not in the response map.
    default_verdict: ScanVerdict,
    /// Simulated latency per phase.
    latency: Option<Duration>,
    /// Configured failure, if any.
    failure: Option<MockFailure>,
    /// Whether to walk through the scan phases.
    emit_progress: bool,
    /// Whether to attach computed digests to verdicts that carry none.
    attach_hashes: bool,
    /// Counter for submissions.
    submit_count: AtomicU64,
    /// Whether to fail health checks.
    unhealthy: AtomicBool,
}

impl MockProvider {
    /// Creates a mock provider with default settings (every file clean).
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            responses: RwLock::new(HashMap::new()),
            default_verdict: ScanVerdict::new(0, 0, 70, 70),
            latency: None,
            failure: None,
            emit_progress: true,
            attach_hashes: true,
            submit_count: AtomicU64::new(0),
            unhealthy: AtomicBool::new(false),
        }
    }

    /// Creates a mock provider that reports every file clean.
    pub fn clean() -> Self {
        Self::new()
    }

    /// Creates a mock provider that flags every file as malicious.
    pub fn malicious(malicious: u32, total: u32) -> Self {
        let clean = total.saturating_sub(malicious);
        Self::new().with_verdict(ScanVerdict::new(malicious, 0, clean, total))
    }

    /// Creates a mock provider whose backend cannot be reached.
    pub fn unavailable() -> Self {
        Self::new().with_failure(MockFailure::Unavailable("connection refused".to_string()))
    }

    /// Creates a mock provider that never finishes.
    pub fn hanging() -> Self {
        Self::new().with_failure(MockFailure::Hang)
    }

    /// Sets the provider name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the default verdict.
    pub fn with_verdict(mut self, verdict: ScanVerdict) -> Self {
        self.default_verdict = verdict;
        self
    }

    /// Adds a verdict for a specific SHA-256.
    pub fn with_response(self, sha256: impl Into<String>, verdict: ScanVerdict) -> Self {
        self.add_response(sha256, verdict);
        self
    }

    /// Sets the simulated latency per phase.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every submission fail.
    pub fn with_failure(mut self, failure: MockFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Disables progress reporting.
    pub fn without_progress(mut self) -> Self {
        self.emit_progress = false;
        self
    }

    /// Returns verdicts exactly as configured, without computed digests.
    pub fn without_hashes(mut self) -> Self {
        self.attach_hashes = false;
        self
    }

    /// Returns the number of submissions.
    pub fn submit_count(&self) -> u64 {
        self.submit_count.load(Ordering::Relaxed)
    }

    /// Sets whether health checks succeed.
    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::Relaxed);
    }

    /// Adds a verdict for a specific SHA-256.
    pub fn add_response(&self, sha256: impl Into<String>, verdict: ScanVerdict) {
        self.responses
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(sha256.into().to_ascii_lowercase(), verdict);
    }

    async fn phase(&self, progress: &ProgressReporter, phase: ScanPhase) {
        if self.emit_progress {
            progress.enter(phase);
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VerdictProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(
        &self,
        file: &SelectedFile,
        progress: &ProgressReporter,
    ) -> Result<ScanVerdict, ScanError> {
        self.submit_count.fetch_add(1, Ordering::Relaxed);

        self.phase(progress, ScanPhase::Uploading).await;

        match &self.failure {
            Some(MockFailure::Unavailable(reason)) => {
                return Err(ScanError::provider_unavailable(&self.name, reason));
            }
            Some(MockFailure::Hang) => futures::future::pending::<()>().await,
            _ => {}
        }

        self.phase(progress, ScanPhase::ComputingHashes).await;
        let hashes = FileHasher::new().hash_selected(file).await?;

        self.phase(progress, ScanPhase::QueryingEngines).await;
        if let Some(MockFailure::ProviderError(reason)) = &self.failure {
            return Err(ScanError::provider_error(&self.name, reason));
        }

        self.phase(progress, ScanPhase::AggregatingResults).await;

        let configured = hashes.sha256.as_ref().and_then(|sha| {
            self.responses
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .get(sha.as_str())
                .cloned()
        });
        let mut verdict = configured.unwrap_or_else(|| self.default_verdict.clone());
        if self.attach_hashes && verdict.hashes.is_empty() {
            verdict.hashes = hashes;
        }

        if self.emit_progress {
            progress.finish();
        }
        Ok(verdict)
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        if self.unhealthy.load(Ordering::Relaxed) {
            return Err(ScanError::provider_unavailable(
                &self.name,
                "mock provider is unhealthy",
            ));
        }
        Ok(())
    }

    fn max_file_size(&self) -> Option<u64> {
        Some(100 * 1024 * 1024) // 100 MB
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ScanProgress, SessionId};
    use std::sync::{Arc, Mutex};

    fn recording() -> (ProgressReporter, Arc<Mutex<Vec<ScanProgress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(SessionId::new(1), move |_, progress| {
            sink.lock().unwrap().push(progress);
        });
        (reporter, seen)
    }

    #[tokio::test]
    async fn test_mock_provider_clean() {
        let provider = MockProvider::clean();
        let file = SelectedFile::from_bytes("a.txt", b"test data".to_vec()).unwrap();
        let (reporter, seen) = recording();

        let verdict = provider.submit(&file, &reporter).await.unwrap();
        assert!(verdict.is_clean());
        assert_eq!(verdict.hashes.iter().count(), 3);
        assert_eq!(provider.submit_count(), 1);

        let percents: Vec<f64> = seen.lock().unwrap().iter().map(|p| p.percentage()).collect();
        assert_eq!(percents, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    }

    #[tokio::test]
    async fn test_mock_provider_custom_response() {
        let file = SelectedFile::from_bytes("a.txt", b"hello world".to_vec()).unwrap();
        let provider = MockProvider::clean().with_response(
            "B94D27B9934D3E08A52E52D7DA7DABFAC484EFE37A5380EE9088F7ACE2EFCDE9",
            ScanVerdict::new(5, 0, 65, 70),
        );

        let verdict = provider
            .submit(&file, &ProgressReporter::noop(SessionId::new(1)))
            .await
            .unwrap();
        assert_eq!(verdict.malicious, 5);
    }

    #[tokio::test]
    async fn test_mock_provider_failures() {
        let file = SelectedFile::from_bytes("a.txt", b"x".to_vec()).unwrap();
        let reporter = ProgressReporter::noop(SessionId::new(1));

        let err = MockProvider::unavailable()
            .submit(&file, &reporter)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::ProviderUnavailable { .. }));

        let err = MockProvider::new()
            .with_failure(MockFailure::ProviderError("quota exceeded".into()))
            .submit(&file, &reporter)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::ProviderError { .. }));
    }

    #[tokio::test]
    async fn test_mock_provider_health_check() {
        let provider = MockProvider::new();
        assert!(provider.health_check().await.is_ok());

        provider.set_healthy(false);
        assert!(provider.health_check().await.is_err());

        provider.set_healthy(true);
        assert!(provider.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_without_hashes_keeps_verdict_as_configured() {
        let file = SelectedFile::from_bytes("a.txt", b"x".to_vec()).unwrap();
        let verdict = MockProvider::malicious(1, 10)
            .without_hashes()
            .without_progress()
            .submit(&file, &ProgressReporter::noop(SessionId::new(1)))
            .await
            .unwrap();

        assert!(verdict.hashes.is_empty());
        assert_eq!(verdict.clean, 9);
    }
}
