//! Scan verdicts and threat classification.
//!
//! A `ScanVerdict` is the aggregated outcome reported by a provider once a
//! scan has fully completed. Classification only ever runs on a complete
//! verdict; partial results are never classified.

use crate::core::types::{FileHashes, HexDigest};

use serde::Serialize;
use std::fmt;

/// Aggregated per-engine counts for one completed scan.
///
/// `total` is the engine count reported independently by the provider. It is
/// not required to equal `malicious + suspicious + clean`; engines that
/// abstain (timeouts, unsupported file types) still count towards it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanVerdict {
    /// Engines that flagged the file as malicious.
    pub malicious: u32,

    /// Engines that flagged the file as suspicious.
    pub suspicious: u32,

    /// Engines that found nothing.
    pub clean: u32,

    /// Engines that took part in the scan.
    pub total: u32,

    /// Digests reported for the file.
    #[serde(flatten)]
    pub hashes: FileHashes,
}

impl ScanVerdict {
    /// Creates a verdict without any digests.
    pub fn new(malicious: u32, suspicious: u32, clean: u32, total: u32) -> Self {
        Self {
            malicious,
            suspicious,
            clean,
            total,
            hashes: FileHashes::new(),
        }
    }

    /// Attaches a digest.
    pub fn with_digest(mut self, digest: HexDigest) -> Self {
        self.hashes.set(digest);
        self
    }

    /// Replaces all digests.
    pub fn with_hashes(mut self, hashes: FileHashes) -> Self {
        self.hashes = hashes;
        self
    }

    /// Classifies the verdict by strict priority: malicious, then suspicious.
    pub fn threat_level(&self) -> ThreatLevel {
        if self.malicious > 0 {
            ThreatLevel::High
        } else if self.suspicious > 0 {
            ThreatLevel::Medium
        } else {
            ThreatLevel::Low
        }
    }

    /// Share of engines that reported the file clean.
    pub fn clean_rate(&self) -> CleanRate {
        if self.total == 0 {
            return CleanRate::NoEngines;
        }
        CleanRate::Percent(f64::from(self.clean) / f64::from(self.total) * 100.0)
    }

    /// Returns `true` if no engine flagged the file.
    pub fn is_clean(&self) -> bool {
        self.threat_level() == ThreatLevel::Low
    }
}

/// Threat level derived from verdict counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    /// No engine flagged the file.
    Low,
    /// At least one engine found the file suspicious, none malicious.
    Medium,
    /// At least one engine flagged the file as malicious.
    High,
}

impl ThreatLevel {
    /// Banner text for the result view.
    pub fn banner(&self) -> &'static str {
        match self {
            Self::High => "THREAT DETECTED",
            Self::Medium => "SUSPICIOUS FILE",
            Self::Low => "FILE CLEAN",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Clean-detection rate of a verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CleanRate {
    /// `clean / total * 100`.
    Percent(f64),
    /// `total` was zero; the ratio is undefined and treated as 0%.
    NoEngines,
}

impl CleanRate {
    /// The rate as a percentage, `0.0` when no engine reported.
    pub fn percent(&self) -> f64 {
        match self {
            Self::Percent(value) => *value,
            Self::NoEngines => 0.0,
        }
    }

    /// Returns `true` if no engine reported.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::NoEngines)
    }
}

impl fmt::Display for CleanRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.percent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DigestKind;

    #[test]
    fn test_classification_priority() {
        assert_eq!(ScanVerdict::new(1, 5, 0, 6).threat_level(), ThreatLevel::High);
        assert_eq!(ScanVerdict::new(0, 3, 7, 10).threat_level(), ThreatLevel::Medium);
        assert_eq!(ScanVerdict::new(0, 0, 10, 10).threat_level(), ThreatLevel::Low);
    }

    #[test]
    fn test_zero_engines_is_low_with_zero_rate() {
        let verdict = ScanVerdict::new(0, 0, 0, 0);
        assert_eq!(verdict.threat_level(), ThreatLevel::Low);
        assert!(verdict.clean_rate().is_undefined());
        assert_eq!(verdict.clean_rate().percent(), 0.0);
        assert_eq!(verdict.clean_rate().to_string(), "0.0%");
    }

    #[test]
    fn test_clean_rate_formatting() {
        assert_eq!(ScanVerdict::new(0, 0, 40, 40).clean_rate().to_string(), "100.0%");
        assert_eq!(ScanVerdict::new(2, 1, 60, 72).clean_rate().to_string(), "83.3%");
    }

    #[test]
    fn test_total_may_exceed_sum() {
        let verdict = ScanVerdict::new(0, 0, 50, 70);
        assert!(verdict.is_clean());
        assert!((verdict.clean_rate().percent() - 71.428).abs() < 0.01);
    }

    #[test]
    fn test_banners() {
        assert_eq!(ThreatLevel::High.banner(), "THREAT DETECTED");
        assert_eq!(ThreatLevel::Medium.banner(), "SUSPICIOUS FILE");
        assert_eq!(ThreatLevel::Low.banner(), "FILE CLEAN");
    }

    #[test]
    fn test_verdict_serializes_flat_hashes() {
        let sha = HexDigest::parse(DigestKind::Sha256, &"b".repeat(64)).unwrap();
        let verdict = ScanVerdict::new(0, 0, 3, 3).with_digest(sha);

        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["clean"], 3);
        assert_eq!(json["sha256"], "b".repeat(64));
        assert!(json.get("md5").is_none());
    }
}
