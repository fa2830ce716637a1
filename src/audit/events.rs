//! Audit event types and emission functions.

use crate::core::{ScanFailure, ScanVerdict, SelectedFile, SessionId, ThreatLevel};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Tracing target used for every audit event.
pub const AUDIT_TARGET: &str = "scandesk::audit";

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp of the event.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Audit record for one session transition.
#[derive(Debug, Clone, Serialize)]
pub struct SessionAuditEvent {
    /// Unique id of this record.
    pub event_id: Uuid,

    /// Event type (`session_started`, `session_completed`, ...).
    pub event_type: &'static str,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Session the event belongs to.
    pub session: SessionId,

    /// Display name of the file.
    pub file_name: String,

    /// File size in bytes.
    pub file_size: u64,

    /// Threat level, for completed sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_level: Option<ThreatLevel>,

    /// Engines that flagged the file as malicious.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub malicious: Option<u32>,

    /// Engines that flagged the file as suspicious.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspicious: Option<u32>,

    /// Engines that took part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,

    /// SHA-256 of the file, when the provider reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// Failure or abandonment reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SessionAuditEvent {
    fn base(event_type: &'static str, session: SessionId, file: &SelectedFile) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
            session,
            file_name: file.name().to_string(),
            file_size: file.size(),
            threat_level: None,
            malicious: None,
            suspicious: None,
            total: None,
            sha256: None,
            reason: None,
        }
    }

    /// A scan was started.
    pub fn started(session: SessionId, file: &SelectedFile) -> Self {
        Self::base("session_started", session, file)
    }

    /// A scan produced a verdict.
    pub fn completed(session: SessionId, file: &SelectedFile, verdict: &ScanVerdict) -> Self {
        Self {
            threat_level: Some(verdict.threat_level()),
            malicious: Some(verdict.malicious),
            suspicious: Some(verdict.suspicious),
            total: Some(verdict.total),
            sha256: verdict.hashes.sha256.as_ref().map(|d| d.as_str().to_string()),
            ..Self::base("session_completed", session, file)
        }
    }

    /// A scan failed.
    pub fn failed(session: SessionId, file: &SelectedFile, failure: &ScanFailure) -> Self {
        Self {
            reason: Some(failure.to_string()),
            ..Self::base("session_failed", session, file)
        }
    }

    /// A running scan was cancelled or the session closed.
    pub fn abandoned(session: SessionId, file: &SelectedFile, reason: &str) -> Self {
        Self {
            reason: Some(reason.to_string()),
            ..Self::base("session_abandoned", session, file)
        }
    }
}

impl AuditEvent for SessionAuditEvent {
    fn event_type(&self) -> &'static str {
        self.event_type
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

fn emit(event: &SessionAuditEvent, message: &'static str) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_id = %event.event_id,
        event_type = event.event_type,
        timestamp = %event.timestamp.to_rfc3339(),
        session = %event.session,
        file_name = %event.file_name,
        file_size = event.file_size,
        threat_level = ?event.threat_level,
        malicious = ?event.malicious,
        suspicious = ?event.suspicious,
        total = ?event.total,
        sha256 = ?event.sha256,
        reason = ?event.reason,
        "{}",
        message
    );
}

/// Emits an audit event for a scan starting.
pub fn emit_session_started(session: SessionId, file: &SelectedFile) -> SessionAuditEvent {
    let event = SessionAuditEvent::started(session, file);
    emit(&event, "Scan session started");
    event
}

/// Emits an audit event for a completed scan.
pub fn emit_session_completed(
    session: SessionId,
    file: &SelectedFile,
    verdict: &ScanVerdict,
) -> SessionAuditEvent {
    let event = SessionAuditEvent::completed(session, file, verdict);
    emit(&event, "Scan session completed");
    event
}

/// Emits an audit event for a failed scan.
pub fn emit_session_failed(
    session: SessionId,
    file: &SelectedFile,
    failure: &ScanFailure,
) -> SessionAuditEvent {
    let event = SessionAuditEvent::failed(session, file, failure);
    emit(&event, "Scan session failed");
    event
}

/// Emits an audit event for an abandoned scan.
pub fn emit_session_abandoned(
    session: SessionId,
    file: &SelectedFile,
    reason: &str,
) -> SessionAuditEvent {
    let event = SessionAuditEvent::abandoned(session, file, reason);
    emit(&event, "Scan session abandoned");
    event
}

/// Records that an event for a non-current session was dropped.
pub fn emit_stale_event_discarded(session: SessionId, current: Option<SessionId>, kind: &str) {
    tracing::debug!(
        target: AUDIT_TARGET,
        event_type = "stale_event_discarded",
        session = %session,
        current = ?current,
        kind = %kind,
        "Discarded event for stale session"
    );
}
