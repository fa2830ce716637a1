//! Provider for the bundled local scanning backend.
//!
//! The desktop shell starts a small HTTP service on the loopback interface
//! (see [`crate::supervisor`]). It accepts `POST /scan` with a multipart
//! `file` part and an optional `email` field, queries VirusTotal itself and
//! answers with digests plus `last_analysis_stats`:
//!
//! ```json
//! {
//!   "success": true,
//!   "hashes": {"md5": "...", "sha256": "...", "sha512": "..."},
//!   "results": {"malicious": 0, "suspicious": 0, "undetected": 60, "harmless": 5},
//!   "report_url": "/report/report-<sha256>.pdf",
//!   "email_status": {"sent": null, "error": null}
//! }
//! ```
//!
//! Failures are reported as `{"error": "..."}` with a 4xx/5xx status.

use crate::core::{
    FileHashes, FileHasher, ProgressReporter, ScanError, ScanPhase, ScanVerdict, SelectedFile,
    VerdictProvider,
};
use crate::providers::stats::EngineStats;

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const PROVIDER_NAME: &str = "local-backend";

/// Local backend configuration.
#[derive(Debug, Clone)]
pub struct LocalBackendConfig {
    /// Base URL of the backend, without a trailing slash.
    pub base_url: String,

    /// Request timeout. The backend may poll VirusTotal for up to two
    /// minutes before answering.
    pub timeout: Duration,

    /// Address the backend should mail the PDF report to.
    pub email: Option<String>,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout: Duration::from_secs(180),
            email: None,
        }
    }
}

impl LocalBackendConfig {
    /// Creates a configuration for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().with_base_url(base_url)
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Asks the backend to mail the report to `email`.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Delivery status of the emailed report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EmailStatus {
    /// `Some(true)` if the report was sent, `None` if no email was requested.
    #[serde(default)]
    pub sent: Option<bool>,
    /// Error reported by the mailer.
    #[serde(default)]
    pub error: Option<String>,
}

/// A successful reply from `POST /scan`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply {
    /// The verdict, digests included.
    pub verdict: ScanVerdict,
    /// Path of the generated PDF report on the backend.
    pub report_url: Option<String>,
    /// Email delivery status, if the backend reported one.
    pub email_status: Option<EmailStatus>,
}

#[derive(Debug, Deserialize)]
struct RawHashes {
    md5: Option<String>,
    sha256: Option<String>,
    sha512: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScanResponseBody {
    #[serde(default)]
    success: bool,
    error: Option<String>,
    hashes: Option<RawHashes>,
    results: Option<EngineStats>,
    report_url: Option<String>,
    email_status: Option<EmailStatus>,
}

/// Parses the body of a `POST /scan` reply.
///
/// # Errors
///
/// - `ProviderError` for an `{"error": ...}` body or a non-success status.
/// - `MalformedResponse` when a success reply lacks results or carries
///   invalid digests.
pub fn parse_backend_response(status: u16, body: &[u8]) -> Result<BackendReply, ScanError> {
    let ok_status = (200..300).contains(&status);

    let parsed: ScanResponseBody = match serde_json::from_slice(body) {
        Ok(parsed) => parsed,
        Err(e) if ok_status => {
            return Err(ScanError::malformed(PROVIDER_NAME, format!("invalid JSON: {}", e)));
        }
        Err(_) => {
            return Err(ScanError::provider_error(
                PROVIDER_NAME,
                format!("backend returned HTTP {}", status),
            ));
        }
    };

    if let Some(error) = parsed.error {
        return Err(ScanError::provider_error(PROVIDER_NAME, error));
    }
    if !ok_status {
        return Err(ScanError::provider_error(
            PROVIDER_NAME,
            format!("backend returned HTTP {}", status),
        ));
    }
    if !parsed.success {
        return Err(ScanError::malformed(PROVIDER_NAME, "reply is not marked successful"));
    }

    let stats = parsed
        .results
        .ok_or_else(|| ScanError::malformed(PROVIDER_NAME, "missing results"))?;

    let hashes = match parsed.hashes {
        Some(raw) => FileHashes::from_raw(
            raw.md5.as_deref(),
            raw.sha256.as_deref(),
            raw.sha512.as_deref(),
        )
        .map_err(|e| ScanError::malformed(PROVIDER_NAME, e.to_string()))?,
        None => FileHashes::new(),
    };

    Ok(BackendReply {
        verdict: stats.to_verdict().with_hashes(hashes),
        report_url: parsed.report_url,
        email_status: parsed.email_status,
    })
}

/// Verdict provider talking to the local backend over HTTP.
///
/// # Example
///
/// ```rust,ignore
/// use scandesk::providers::{LocalBackendConfig, LocalBackendProvider};
///
/// let provider = LocalBackendProvider::new(LocalBackendConfig::new("http://127.0.0.1:5000"))?;
/// ```
#[derive(Debug)]
pub struct LocalBackendProvider {
    config: LocalBackendConfig,
    client: reqwest::Client,
    hasher: FileHasher,
}

impl LocalBackendProvider {
    /// Creates a provider with the given configuration.
    pub fn new(config: LocalBackendConfig) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScanError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            hasher: FileHasher::new(),
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &LocalBackendConfig {
        &self.config
    }

    fn map_send_error(&self, e: reqwest::Error) -> ScanError {
        if e.is_connect() {
            ScanError::provider_unavailable(PROVIDER_NAME, e.to_string())
        } else if e.is_timeout() {
            ScanError::timeout(self.config.timeout)
        } else {
            ScanError::provider_error(PROVIDER_NAME, e.to_string())
        }
    }
}

#[async_trait]
impl VerdictProvider for LocalBackendProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn submit(
        &self,
        file: &SelectedFile,
        progress: &ProgressReporter,
    ) -> Result<ScanVerdict, ScanError> {
        progress.enter(ScanPhase::Uploading);
        let data = file.read().await?;

        let part = reqwest::multipart::Part::bytes(data).file_name(file.name().to_string());
        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(email) = &self.config.email {
            form = form.text("email", email.clone());
        }

        progress.enter(ScanPhase::ComputingHashes);
        let local_hashes = self.hasher.hash_selected(file).await?;

        progress.enter(ScanPhase::QueryingEngines);
        let url = format!("{}/scan", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(e))?;

        progress.enter(ScanPhase::AggregatingResults);
        let reply = parse_backend_response(status, &body)?;

        tracing::debug!(
            file_name = %file.name(),
            report_url = ?reply.report_url,
            email_status = ?reply.email_status,
            "Local backend replied"
        );

        let mut verdict = reply.verdict;
        if verdict.hashes.is_empty() {
            verdict.hashes = local_hashes;
        } else if verdict.hashes.sha256 != local_hashes.sha256 {
            tracing::warn!(
                file_name = %file.name(),
                "Backend SHA-256 differs from the locally computed digest"
            );
        }

        progress.finish();
        Ok(verdict)
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        // Any HTTP answer means the backend is listening.
        self.client
            .get(&self.config.base_url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| self.map_send_error(e))
    }
}
