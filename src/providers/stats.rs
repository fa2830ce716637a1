//! Per-category engine counts as reported by VirusTotal.
//!
//! Both the local backend (which relays `last_analysis_stats`) and the direct
//! VirusTotal provider report results in this shape.

use crate::core::ScanVerdict;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Engine counts per result category.
///
/// `harmless` and `undetected` both count as clean. Abstentions (timeouts,
/// failures, unsupported types) count only towards the total. Categories
/// this type does not know yet are kept in `other` and counted too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Engines that flagged the file as malicious.
    #[serde(default)]
    pub malicious: u32,

    /// Engines that flagged the file as suspicious.
    #[serde(default)]
    pub suspicious: u32,

    /// Engines that found nothing.
    #[serde(default)]
    pub undetected: u32,

    /// Engines that consider the file harmless.
    #[serde(default)]
    pub harmless: u32,

    /// Engines that timed out.
    #[serde(default)]
    pub timeout: u32,

    /// Engines that timed out after confirming.
    #[serde(default, rename = "confirmed-timeout")]
    pub confirmed_timeout: u32,

    /// Engines that failed.
    #[serde(default)]
    pub failure: u32,

    /// Engines that do not support the file type.
    #[serde(default, rename = "type-unsupported")]
    pub type_unsupported: u32,

    /// Any other reported category.
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl EngineStats {
    /// Engines that reported the file clean.
    pub fn clean(&self) -> u32 {
        self.harmless.saturating_add(self.undetected)
    }

    /// Every engine that took part, abstentions included.
    pub fn total(&self) -> u32 {
        let extra: u64 = self.other.values().filter_map(|v| v.as_u64()).sum();
        let known = [
            self.malicious,
            self.suspicious,
            self.undetected,
            self.harmless,
            self.timeout,
            self.confirmed_timeout,
            self.failure,
            self.type_unsupported,
        ]
        .iter()
        .map(|&n| u64::from(n))
        .sum::<u64>();
        u32::try_from(known + extra).unwrap_or(u32::MAX)
    }

    /// Converts the counts into a verdict without digests.
    pub fn to_verdict(&self) -> ScanVerdict {
        ScanVerdict::new(self.malicious, self.suspicious, self.clean(), self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mapping_from_last_analysis_stats() {
        let stats: EngineStats = serde_json::from_value(json!({
            "malicious": 2,
            "suspicious": 1,
            "undetected": 55,
            "harmless": 5,
            "timeout": 1,
            "confirmed-timeout": 0,
            "failure": 2,
            "type-unsupported": 6
        }))
        .unwrap();

        let verdict = stats.to_verdict();
        assert_eq!(verdict.malicious, 2);
        assert_eq!(verdict.suspicious, 1);
        assert_eq!(verdict.clean, 60);
        assert_eq!(verdict.total, 72);
    }

    #[test]
    fn test_missing_and_unknown_categories() {
        let stats: EngineStats =
            serde_json::from_value(json!({"undetected": 10, "quarantined": 3})).unwrap();

        assert_eq!(stats.malicious, 0);
        assert_eq!(stats.clean(), 10);
        assert_eq!(stats.total(), 13);
    }

    #[test]
    fn test_empty_stats_have_no_engines() {
        let verdict = EngineStats::default().to_verdict();
        assert_eq!(verdict.total, 0);
        assert!(verdict.clean_rate().is_undefined());
    }
}
