//! Core types used throughout the scandesk library.
//!
//! This module defines session identifiers, normalized hash digests and the
//! failure record stored when a scan does not complete.

use crate::core::error::ScanError;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one scan attempt.
///
/// Allocated by the orchestrator in strictly increasing order, so an event
/// carrying an older id can always be recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Wraps a raw session number.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw session number.
    pub fn get(&self) -> u64 {
        self.0
    }

    /// Returns the id that follows this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The digest algorithms a verdict can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestKind {
    /// MD5, 32 hex characters.
    Md5,
    /// SHA-256, 64 hex characters.
    Sha256,
    /// SHA-512, 128 hex characters.
    Sha512,
}

impl DigestKind {
    /// Number of hex characters in a digest of this kind.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Display label used on hash blocks.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha256 => "SHA-256",
            Self::Sha512 => "SHA-512",
        }
    }
}

impl fmt::Display for DigestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A validated, lowercase hex digest.
///
/// Serializes as the bare hex string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HexDigest {
    kind: DigestKind,
    hex: String,
}

impl HexDigest {
    /// Parses a digest of the given kind.
    ///
    /// Input is accepted in any case and stored lowercase. Surrounding
    /// whitespace is ignored.
    pub fn parse(kind: DigestKind, value: &str) -> Result<Self, ScanError> {
        let value = value.trim();
        if value.len() != kind.hex_len() {
            return Err(ScanError::InvalidDigest {
                kind,
                reason: format!("expected {} hex characters, got {}", kind.hex_len(), value.len()),
            });
        }
        if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ScanError::InvalidDigest {
                kind,
                reason: "contains non-hex characters".to_string(),
            });
        }
        Ok(Self {
            kind,
            hex: value.to_ascii_lowercase(),
        })
    }

    /// Wraps hex produced by our own hasher.
    pub(crate) fn from_hasher(kind: DigestKind, hex: String) -> Self {
        debug_assert_eq!(hex.len(), kind.hex_len());
        Self { kind, hex }
    }

    /// Returns the algorithm.
    pub fn kind(&self) -> DigestKind {
        self.kind
    }

    /// Returns the lowercase hex string.
    pub fn as_str(&self) -> &str {
        &self.hex
    }
}

impl Serialize for HexDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.hex)
    }
}

impl fmt::Display for HexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

/// The optional digests reported for a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileHashes {
    /// MD5 digest, if supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5: Option<HexDigest>,

    /// SHA-256 digest, if supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<HexDigest>,

    /// SHA-512 digest, if supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha512: Option<HexDigest>,
}

impl FileHashes {
    /// Creates an empty set of hashes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a digest in the slot matching its kind.
    pub fn with(mut self, digest: HexDigest) -> Self {
        self.set(digest);
        self
    }

    /// Stores a digest in the slot matching its kind.
    pub fn set(&mut self, digest: HexDigest) {
        match digest.kind() {
            DigestKind::Md5 => self.md5 = Some(digest),
            DigestKind::Sha256 => self.sha256 = Some(digest),
            DigestKind::Sha512 => self.sha512 = Some(digest),
        }
    }

    /// Parses optional raw strings from a provider into digests.
    pub fn from_raw(
        md5: Option<&str>,
        sha256: Option<&str>,
        sha512: Option<&str>,
    ) -> Result<Self, ScanError> {
        let mut hashes = Self::new();
        for (kind, raw) in [
            (DigestKind::Md5, md5),
            (DigestKind::Sha256, sha256),
            (DigestKind::Sha512, sha512),
        ] {
            if let Some(raw) = raw.filter(|s| !s.trim().is_empty()) {
                hashes.set(HexDigest::parse(kind, raw)?);
            }
        }
        Ok(hashes)
    }

    /// Returns the present digests in MD5, SHA-256, SHA-512 order.
    pub fn iter(&self) -> impl Iterator<Item = &HexDigest> {
        [&self.md5, &self.sha256, &self.sha512]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    /// Returns `true` if no digest is present.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Category of a failed scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The provider or backend could not be reached.
    ProviderUnavailable,
    /// The provider reported a failure.
    ProviderError,
    /// No terminal event arrived in time.
    Timeout,
    /// The file or the response was refused (too large, unreadable, malformed, unauthorized).
    Rejected,
    /// Anything else.
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable => write!(f, "provider unavailable"),
            Self::ProviderError => write!(f, "provider error"),
            Self::Timeout => write!(f, "timeout"),
            Self::Rejected => write!(f, "rejected"),
            Self::Internal => write!(f, "internal error"),
        }
    }
}

/// Why a session ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFailure {
    /// Category of the failure.
    pub kind: FailureKind,
    /// Human-readable reason shown to the user.
    pub reason: String,
}

impl ScanFailure {
    /// Creates a failure record.
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl From<&ScanError> for ScanFailure {
    fn from(error: &ScanError) -> Self {
        let kind = match error {
            ScanError::ProviderUnavailable { .. } | ScanError::RateLimited { .. } => {
                FailureKind::ProviderUnavailable
            }
            ScanError::ProviderError { .. } => FailureKind::ProviderError,
            ScanError::Timeout { .. } => FailureKind::Timeout,
            ScanError::FileTooLarge { .. }
            | ScanError::FileNotFound { .. }
            | ScanError::InvalidFile { .. }
            | ScanError::InvalidDigest { .. }
            | ScanError::Io(_)
            | ScanError::MalformedResponse { .. }
            | ScanError::AuthenticationFailed { .. } => FailureKind::Rejected,
            _ => FailureKind::Internal,
        };
        Self::new(kind, error.to_string())
    }
}

impl From<ScanError> for ScanFailure {
    fn from(error: ScanError) -> Self {
        Self::from(&error)
    }
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_session_ids_increase() {
        let first = SessionId::new(1);
        assert!(first.next() > first);
        assert_eq!(first.next().get(), 2);
        assert_eq!(first.to_string(), "#1");
    }

    #[test]
    fn test_digest_parse_normalizes_case() {
        let digest = HexDigest::parse(DigestKind::Md5, "D41D8CD98F00B204E9800998ECF8427E").unwrap();
        assert_eq!(digest.as_str(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(digest.kind(), DigestKind::Md5);
    }

    #[test]
    fn test_digest_parse_rejects_bad_input() {
        let err = HexDigest::parse(DigestKind::Sha256, "abc").unwrap_err();
        assert!(matches!(
            err,
            ScanError::InvalidDigest {
                kind: DigestKind::Sha256,
                ..
            }
        ));
        assert!(!err.to_string().contains("invalid file"));
        assert_eq!(ScanFailure::from(&err).kind, FailureKind::Rejected);

        let not_hex = "z".repeat(32);
        assert!(HexDigest::parse(DigestKind::Md5, &not_hex).is_err());
        let md5_len = "a".repeat(32);
        assert!(HexDigest::parse(DigestKind::Sha512, &md5_len).is_err());
    }

    #[test]
    fn test_file_hashes_from_raw_skips_missing() {
        let sha256 = "A".repeat(64);
        let hashes = FileHashes::from_raw(None, Some(&sha256), Some("")).unwrap();

        assert!(hashes.md5.is_none());
        assert!(hashes.sha512.is_none());
        assert_eq!(hashes.iter().count(), 1);
        assert_eq!(hashes.sha256.unwrap().as_str(), "a".repeat(64));
    }

    #[test]
    fn test_failure_from_error() {
        let failure = ScanFailure::from(ScanError::timeout(Duration::from_secs(5)));
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert!(failure.reason.contains("timed out"));

        let failure = ScanFailure::from(ScanError::provider_unavailable("local", "refused"));
        assert_eq!(failure.kind, FailureKind::ProviderUnavailable);
    }
}
