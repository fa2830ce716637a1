//! Structured audit logging of scan sessions.
//!
//! Every session transition that matters to an operator (started, completed,
//! failed, abandoned) is emitted as a `tracing` event with the target
//! `scandesk::audit`, so a subscriber can route audit records to their own
//! sink (JSON file, log collector) independently of ordinary logs.

mod events;

pub use events::{
    emit_session_abandoned, emit_session_completed, emit_session_failed, emit_session_started,
    emit_stale_event_discarded, AuditEvent, SessionAuditEvent, AUDIT_TARGET,
};
