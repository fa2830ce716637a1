//! Application configuration from the environment.
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `SCANDESK_AUTO_START` | start scanning on selection | `true` |
//! | `SCANDESK_SCAN_TIMEOUT_SECS` | provider call bound | `300` |
//! | `SCANDESK_BACKEND_URL` | local backend base URL | `http://127.0.0.1:5000` |
//! | `SCANDESK_BACKEND_BIN` | backend executable to supervise | unset |
//! | `SCANDESK_LOG_DIR` | directory for rolling log files | unset |
//! | `VIRUSTOTAL_API_KEY` | key for the direct VirusTotal provider | unset |

use crate::core::ScanError;
use crate::orchestrator::OrchestratorConfig;
use crate::supervisor::BackendConfig;

use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "virustotal")]
use secrecy::SecretString;

/// Default local backend URL.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";

/// Configuration assembled from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Orchestrator settings.
    pub orchestrator: OrchestratorConfig,

    /// Base URL of the local backend.
    pub backend_url: String,

    /// Backend executable to start, if the backend is supervised.
    pub backend_bin: Option<PathBuf>,

    /// Directory for log files.
    pub log_dir: Option<PathBuf>,

    /// VirusTotal API key.
    #[cfg(feature = "virustotal")]
    pub virustotal_api_key: Option<SecretString>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            backend_bin: None,
            log_dir: None,
            #[cfg(feature = "virustotal")]
            virustotal_api_key: None,
        }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ScanError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ScanError::configuration(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}

fn parse_secs(name: &str, value: &str) -> Result<Duration, ScanError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ScanError::configuration(format!(
            "{} must be a positive number of seconds, got '{}'",
            name, value
        ))),
    }
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ScanError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScanError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(value) = get("SCANDESK_AUTO_START") {
            config.orchestrator.auto_start_on_select = parse_bool("SCANDESK_AUTO_START", &value)?;
        }
        if let Some(value) = get("SCANDESK_SCAN_TIMEOUT_SECS") {
            config.orchestrator.scan_timeout = parse_secs("SCANDESK_SCAN_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = get("SCANDESK_BACKEND_URL") {
            let url = value.trim().trim_end_matches('/');
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ScanError::configuration(format!(
                    "SCANDESK_BACKEND_URL must be an http(s) URL, got '{}'",
                    value
                )));
            }
            config.backend_url = url.to_string();
        }
        config.backend_bin = get("SCANDESK_BACKEND_BIN").map(PathBuf::from);
        config.log_dir = get("SCANDESK_LOG_DIR").map(PathBuf::from);

        #[cfg(feature = "virustotal")]
        {
            config.virustotal_api_key =
                get("VIRUSTOTAL_API_KEY").map(|key| SecretString::from(key.trim().to_string()));
        }

        Ok(config)
    }

    /// `host:port` part of the backend URL.
    pub fn backend_address(&self) -> &str {
        let rest = self
            .backend_url
            .split_once("://")
            .map_or(self.backend_url.as_str(), |(_, rest)| rest);
        rest.split('/').next().unwrap_or(rest)
    }

    /// Supervisor settings, when a backend executable is configured.
    pub fn backend_config(&self) -> Option<BackendConfig> {
        self.backend_bin
            .as_ref()
            .map(|bin| BackendConfig::new(bin).with_address(self.backend_address()))
    }

    /// Settings for the local backend provider.
    #[cfg(feature = "http")]
    pub fn local_backend_config(&self) -> crate::providers::LocalBackendConfig {
        crate::providers::LocalBackendConfig::new(self.backend_url.clone())
    }

    /// Settings for the direct VirusTotal provider, when a key is set.
    #[cfg(feature = "virustotal")]
    pub fn virustotal_config(&self) -> Option<crate::providers::VirusTotalConfig> {
        use secrecy::ExposeSecret;
        self.virustotal_api_key
            .as_ref()
            .map(|key| crate::providers::VirusTotalConfig::new(key.expose_secret()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();

        assert!(config.orchestrator.auto_start_on_select);
        assert_eq!(config.orchestrator.scan_timeout, Duration::from_secs(300));
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(config.backend_address(), "127.0.0.1:5000");
        assert!(config.backend_config().is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SCANDESK_AUTO_START", "no"),
            ("SCANDESK_SCAN_TIMEOUT_SECS", "45"),
            ("SCANDESK_BACKEND_URL", "http://localhost:8123/"),
            ("SCANDESK_BACKEND_BIN", "/opt/scandesk/server"),
            ("SCANDESK_LOG_DIR", ""),
        ]))
        .unwrap();

        assert!(!config.orchestrator.auto_start_on_select);
        assert_eq!(config.orchestrator.scan_timeout, Duration::from_secs(45));
        assert_eq!(config.backend_url, "http://localhost:8123");
        assert!(config.log_dir.is_none());

        let backend = config.backend_config().unwrap();
        assert_eq!(backend.program, PathBuf::from("/opt/scandesk/server"));
        assert_eq!(backend.address, "localhost:8123");
    }

    #[test]
    fn test_invalid_values() {
        for pairs in [
            [("SCANDESK_AUTO_START", "maybe")],
            [("SCANDESK_SCAN_TIMEOUT_SECS", "0")],
            [("SCANDESK_SCAN_TIMEOUT_SECS", "soon")],
            [("SCANDESK_BACKEND_URL", "127.0.0.1:5000")],
        ] {
            let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(matches!(err, ScanError::Configuration { .. }), "{:?}", pairs);
        }
    }

    #[cfg(feature = "virustotal")]
    #[test]
    fn test_virustotal_key() {
        use secrecy::ExposeSecret;

        let config = AppConfig::from_lookup(lookup(&[("VIRUSTOTAL_API_KEY", " abc ")])).unwrap();
        let vt = config.virustotal_config().unwrap();
        assert_eq!(vt.api_key.expose_secret(), "abc");
        assert!(AppConfig::default().virustotal_config().is_none());
    }
}
