//! VirusTotal verdict provider.
//!
//! This module provides a provider that talks to the VirusTotal v3 API
//! directly, without the local backend.
//!
//! # Requirements
//!
//! - VirusTotal API key
//! - Network access to www.virustotal.com
//!
//! # API Usage
//!
//! 1. Hash the file locally (MD5, SHA-256, SHA-512)
//! 2. Look the SHA-256 up with `GET /files/{sha256}`
//! 3. If unknown, upload with `POST /files` and poll `GET /analyses/{id}`

use crate::core::{
    FileHasher, ProgressReporter, ScanError, ScanPhase, ScanVerdict, SelectedFile,
    VerdictProvider,
};
use crate::providers::stats::EngineStats;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;

const PROVIDER_NAME: &str = "virustotal";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "VIRUSTOTAL_API_KEY";

/// VirusTotal provider configuration.
#[derive(Debug, Clone)]
pub struct VirusTotalConfig {
    /// API key (kept secret).
    pub api_key: SecretString,

    /// Base URL for the API.
    pub base_url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum file size to upload (free tier: 32MB, premium: 650MB).
    pub max_file_size: u64,

    /// Whether to upload files VirusTotal does not know yet.
    pub upload_unknown: bool,

    /// Polling interval when waiting for an analysis.
    pub poll_interval: Duration,

    /// Maximum time to wait for an analysis.
    pub max_poll_time: Duration,
}

impl VirusTotalConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: "https://www.virustotal.com/api/v3".to_string(),
            timeout: Duration::from_secs(60),
            max_file_size: 32 * 1024 * 1024, // 32 MB (free tier limit)
            upload_unknown: true,
            poll_interval: Duration::from_secs(15),
            max_poll_time: Duration::from_secs(120),
        }
    }

    /// Reads the API key from `VIRUSTOTAL_API_KEY`.
    pub fn from_env() -> Result<Self, ScanError> {
        Self::from_key(std::env::var(API_KEY_ENV).ok())
    }

    fn from_key(key: Option<String>) -> Result<Self, ScanError> {
        match key {
            None => Err(ScanError::configuration(format!(
                "{} environment variable not set",
                API_KEY_ENV
            ))),
            Some(key) if key.trim().is_empty() => {
                Err(ScanError::configuration(format!("{} is empty", API_KEY_ENV)))
            }
            Some(key) => Ok(Self::new(key.trim())),
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum file size.
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Sets whether to upload unknown files.
    pub fn with_upload_unknown(mut self, upload: bool) -> Self {
        self.upload_unknown = upload;
        self
    }

    /// Sets the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the maximum polling time.
    pub fn with_max_poll_time(mut self, max: Duration) -> Self {
        self.max_poll_time = max;
        self
    }
}

/// Extracts `data.attributes.last_analysis_stats` from a file report.
pub fn parse_file_report(json: &Value) -> Result<EngineStats, ScanError> {
    let stats = json
        .pointer("/data/attributes/last_analysis_stats")
        .ok_or_else(|| ScanError::malformed(PROVIDER_NAME, "missing analysis stats"))?;
    serde_json::from_value(stats.clone()).map_err(|e| ScanError::malformed(PROVIDER_NAME, e.to_string()))
}

/// Extracts the analysis id from an upload reply.
pub fn parse_upload_reply(json: &Value) -> Result<String, ScanError> {
    json.pointer("/data/id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ScanError::malformed(PROVIDER_NAME, "missing analysis id"))
}

/// Returns the stats of a finished analysis, or `None` while it is queued.
pub fn parse_analysis(json: &Value) -> Result<Option<EngineStats>, ScanError> {
    let status = json
        .pointer("/data/attributes/status")
        .and_then(Value::as_str)
        .ok_or_else(|| ScanError::malformed(PROVIDER_NAME, "missing analysis status"))?;
    if status != "completed" {
        return Ok(None);
    }

    let stats = json
        .pointer("/data/attributes/stats")
        .ok_or_else(|| ScanError::malformed(PROVIDER_NAME, "missing analysis stats"))?;
    serde_json::from_value(stats.clone())
        .map(Some)
        .map_err(|e| ScanError::malformed(PROVIDER_NAME, e.to_string()))
}

/// VirusTotal provider implementation.
///
/// # Example
///
/// ```rust,ignore
/// use scandesk::providers::{VirusTotalConfig, VirusTotalProvider};
///
/// let provider = VirusTotalProvider::new(VirusTotalConfig::from_env()?)?;
/// ```
#[derive(Debug)]
pub struct VirusTotalProvider {
    config: VirusTotalConfig,
    hasher: FileHasher,
    client: reqwest::Client,
}

impl VirusTotalProvider {
    /// Creates a new VirusTotal provider with the given configuration.
    pub fn new(config: VirusTotalConfig) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScanError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            hasher: FileHasher::new(),
            client,
        })
    }

    fn send_error(e: reqwest::Error) -> ScanError {
        if e.is_connect() {
            ScanError::provider_unavailable(PROVIDER_NAME, e.to_string())
        } else {
            ScanError::provider_error(PROVIDER_NAME, e.to_string())
        }
    }

    /// Maps error statuses; returns the body of a successful reply.
    async fn read_json(response: reqwest::Response) -> Result<Value, ScanError> {
        let status = response.status();
        match status.as_u16() {
            401 | 403 => {
                return Err(ScanError::AuthenticationFailed {
                    provider: PROVIDER_NAME.to_string(),
                    reason: format!("API returned {}", status),
                });
            }
            429 => {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .or(Some(Duration::from_secs(60)));
                return Err(ScanError::RateLimited {
                    provider: PROVIDER_NAME.to_string(),
                    retry_after,
                });
            }
            _ if !status.is_success() => {
                return Err(ScanError::provider_error(
                    PROVIDER_NAME,
                    format!("API error: {}", status),
                ));
            }
            _ => {}
        }

        response
            .json()
            .await
            .map_err(|e| ScanError::malformed(PROVIDER_NAME, e.to_string()))
    }

    /// Looks up a file by SHA256 hash.
    async fn lookup_hash(&self, sha256: &str) -> Result<Option<EngineStats>, ScanError> {
        let url = format!("{}/files/{}", self.config.base_url, sha256);

        let response = self
            .client
            .get(&url)
            .header("x-apikey", self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(Self::send_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = Self::read_json(response).await?;
        parse_file_report(&body).map(Some)
    }

    /// Uploads a file and returns the analysis id.
    async fn upload(&self, file: &SelectedFile, data: Vec<u8>) -> Result<String, ScanError> {
        let url = format!("{}/files", self.config.base_url);
        let part = reqwest::multipart::Part::bytes(data).file_name(file.name().to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .header("x-apikey", self.config.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(Self::send_error)?;

        let body = Self::read_json(response).await?;
        parse_upload_reply(&body)
    }

    /// Polls an analysis until it completes or `max_poll_time` elapses.
    async fn poll_analysis(&self, analysis_id: &str) -> Result<EngineStats, ScanError> {
        let url = format!("{}/analyses/{}", self.config.base_url, analysis_id);
        let deadline = tokio::time::Instant::now() + self.config.max_poll_time;

        loop {
            let response = self
                .client
                .get(&url)
                .header("x-apikey", self.config.api_key.expose_secret())
                .send()
                .await
                .map_err(Self::send_error)?;

            let body = Self::read_json(response).await?;
            if let Some(stats) = parse_analysis(&body)? {
                return Ok(stats);
            }

            if tokio::time::Instant::now() + self.config.poll_interval > deadline {
                return Err(ScanError::timeout(self.config.max_poll_time));
            }
            tracing::debug!(analysis_id = %analysis_id, "Analysis queued, polling again");
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

#[async_trait]
impl VerdictProvider for VirusTotalProvider {
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
        if data.len() as u64 > self.config.max_file_size {
            return Err(ScanError::FileTooLarge {
                size: data.len() as u64,
                max: self.config.max_file_size,
            });
        }

        progress.enter(ScanPhase::ComputingHashes);
        let hashes = self.hasher.hash_selected(file).await?;
        let sha256 = hashes
            .sha256
            .as_ref()
            .ok_or_else(|| ScanError::internal("SHA256 hash required for VirusTotal"))?
            .as_str()
            .to_string();

        progress.enter(ScanPhase::QueryingEngines);
        let stats = match self.lookup_hash(&sha256).await? {
            Some(stats) => stats,
            None if self.config.upload_unknown => {
                tracing::info!(sha256 = %sha256, "File unknown to VirusTotal, uploading");
                let analysis_id = self.upload(file, data).await?;
                self.poll_analysis(&analysis_id).await?
            }
            None => {
                return Err(ScanError::provider_error(
                    PROVIDER_NAME,
                    "file not found in VirusTotal database",
                ));
            }
        };

        progress.enter(ScanPhase::AggregatingResults);
        let verdict = stats.to_verdict().with_hashes(hashes);
        progress.finish();
        Ok(verdict)
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        // Check API access by looking up the EICAR test file hash
        const EICAR_SHA256: &str =
            "275a021bbfb6489e54d471899f7db9d1663fc695ec2fe2a2c4538aabf651fd0f";

        match self.lookup_hash(EICAR_SHA256).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(ScanError::provider_error(
                PROVIDER_NAME,
                "EICAR test file not found (unexpected)",
            )),
            Err(e) => Err(e),
        }
    }

    fn max_file_size(&self) -> Option<u64> {
        Some(self.config.max_file_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_builder() {
        let config = VirusTotalConfig::new("test-key")
            .with_max_file_size(64 * 1024 * 1024)
            .with_upload_unknown(false)
            .with_base_url("http://localhost:8080/api/v3/");

        assert_eq!(config.max_file_size, 64 * 1024 * 1024);
        assert!(!config.upload_unknown);
        assert_eq!(config.base_url, "http://localhost:8080/api/v3");
        assert_eq!(config.api_key.expose_secret(), "test-key");
        assert_eq!(config.max_poll_time, Duration::from_secs(120));
    }

    #[test]
    fn test_key_validation() {
        assert!(matches!(
            VirusTotalConfig::from_key(None),
            Err(ScanError::Configuration { .. })
        ));
        let err = VirusTotalConfig::from_key(Some("  ".into())).unwrap_err();
        assert!(err.to_string().contains("empty"));
        assert!(VirusTotalConfig::from_key(Some("abc".into())).is_ok());
    }

    #[test]
    fn test_key_is_redacted_in_debug() {
        let config = VirusTotalConfig::new("super-secret-key");
        assert!(!format!("{:?}", config).contains("super-secret-key"));
    }

    #[test]
    fn test_parse_file_report() {
        let stats = parse_file_report(&json!({
            "data": {"attributes": {"last_analysis_stats": {
                "malicious": 4, "suspicious": 0, "undetected": 50, "harmless": 10, "timeout": 2
            }}}
        }))
        .unwrap();

        let verdict = stats.to_verdict();
        assert_eq!(verdict.malicious, 4);
        assert_eq!(verdict.clean, 60);
        assert_eq!(verdict.total, 66);

        assert!(parse_file_report(&json!({"data": {}})).is_err());
    }

    #[test]
    fn test_parse_upload_and_analysis() {
        let id = parse_upload_reply(&json!({"data": {"type": "analysis", "id": "NjY0MjRlOTFj"}})).unwrap();
        assert_eq!(id, "NjY0MjRlOTFj");

        let queued = parse_analysis(&json!({"data": {"attributes": {"status": "queued"}}})).unwrap();
        assert!(queued.is_none());

        let done = parse_analysis(&json!({
            "data": {"attributes": {"status": "completed", "stats": {"malicious": 1, "undetected": 9}}}
        }))
        .unwrap()
        .unwrap();
        assert_eq!(done.total(), 10);

        assert!(parse_analysis(&json!({"data": {"attributes": {}}})).is_err());
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_before_upload() {
        let provider = VirusTotalProvider::new(
            VirusTotalConfig::new("k")
                .with_max_file_size(4)
                .with_base_url("http://127.0.0.1:9"),
        )
        .unwrap();
        let file = SelectedFile::from_bytes("big.bin", vec![0u8; 8]).unwrap();

        let err = provider
            .submit(&file, &ProgressReporter::noop(crate::core::SessionId::new(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::FileTooLarge { size: 8, max: 4 }));
    }

    #[tokio::test]
    async fn test_hashes_before_querying_unreachable_api() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let provider = VirusTotalProvider::new(
            VirusTotalConfig::new("k").with_base_url(format!("http://{}", address)),
        )
        .unwrap();
        let file = SelectedFile::from_bytes("doc.txt", b"hello world".to_vec()).unwrap();

        let phases = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = phases.clone();
        let reporter = ProgressReporter::new(crate::core::SessionId::new(1), move |_, p| {
            sink.lock().unwrap().push(p.step().to_string());
        });

        let err = provider.submit(&file, &reporter).await.unwrap_err();
        assert!(matches!(err, ScanError::ProviderUnavailable { .. }));
        assert_eq!(
            *phases.lock().unwrap(),
            vec!["Uploading", "Computing hashes", "Querying engines"]
        );
    }
}
