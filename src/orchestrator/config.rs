//! Orchestrator configuration.

use std::time::Duration;

/// Configuration for the scan orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Start scanning as soon as a file is selected.
    pub auto_start_on_select: bool,

    /// Upper bound on a provider call before the session is failed.
    pub scan_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            auto_start_on_select: true,
            scan_timeout: Duration::from_secs(300),
        }
    }
}

impl OrchestratorConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables scanning on selection.
    pub fn with_auto_start(mut self, enabled: bool) -> Self {
        self.auto_start_on_select = enabled;
        self
    }

    /// Sets the scan timeout.
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert!(config.auto_start_on_select);
        assert_eq!(config.scan_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_builder() {
        let config = OrchestratorConfig::new()
            .with_auto_start(false)
            .with_scan_timeout(Duration::from_secs(5));

        assert!(!config.auto_start_on_select);
        assert_eq!(config.scan_timeout, Duration::from_secs(5));
    }
}
