//! Scan-session orchestration.
//!
//! - [`Orchestrator`] is the synchronous state machine that owns the
//!   session state and applies commands and provider events to it.
//! - [`ScanService`] runs it on a tokio task behind a single event queue and
//!   drives the provider calls.

mod config;
mod machine;
mod service;
mod state;

pub use config::OrchestratorConfig;
pub use machine::{Orchestrator, ScanTicket};
pub use service::{ScanService, ScanServiceHandle};
pub use state::SessionState;
