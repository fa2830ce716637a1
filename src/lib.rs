//! # Scandesk
//!
//! The scan-submission and threat-assessment core of a desktop malware
//! analysis client.
//!
//! ## Overview
//!
//! Scandesk carries a single user-selected file from selection through a
//! scanning phase with progress feedback to a classified, displayable
//! verdict aggregated from many scanning engines:
//!
//! - Pick a file by drag-and-drop or a browse dialog
//! - Submit it to a pluggable verdict provider (local backend, VirusTotal)
//! - Follow the scan through ordered, never-regressing progress phases
//! - Classify the verdict (High / Medium / Low) and render it
//! - Supervise the local backend process for the lifetime of the app
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scandesk::{OrchestratorConfig, ScanService, SelectedFile};
//! use scandesk::presenter::render;
//! use scandesk::providers::MockProvider;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ScanService::spawn(Arc::new(MockProvider::clean()), OrchestratorConfig::default());
//!
//!     // Selecting a file starts the scan right away
//!     service.select_file(SelectedFile::from_bytes("invoice.pdf", b"%PDF".to_vec())?).await?;
//!
//!     let state = service.wait_for(|s| s.is_terminal()).await?;
//!     println!("{}", render(&state));
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `default` - Includes `http` and `virustotal`
//! - `http` - Provider for the bundled local backend
//! - `virustotal` - Provider for the VirusTotal v3 API
//!
//! ## Architecture
//!
//! - **Core**: Fundamental types, the provider trait and error handling
//! - **Intake**: Drag-and-drop and browse adapters
//! - **Orchestrator**: The session state machine and its event loop
//! - **Presenter**: Pure rendering of session state
//! - **Providers**: Verdict provider implementations
//! - **Supervisor**: Lifecycle of the local backend process
//! - **Audit**: Structured session audit events

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod config;
pub mod core;
pub mod intake;
pub mod logging;
pub mod orchestrator;
pub mod presenter;
pub mod providers;
pub mod supervisor;

// Re-export commonly used types at the crate root
pub use crate::core::{
    FileHasher, FileHashes, ScanError, ScanFailure, ScanPhase, ScanProgress, ScanResult,
    ScanVerdict, SelectedFile, SessionId, ThreatLevel, VerdictProvider,
};

pub use crate::config::AppConfig;
pub use crate::intake::FileIntake;
pub use crate::orchestrator::{
    Orchestrator, OrchestratorConfig, ScanService, ScanServiceHandle, SessionState,
};
pub use crate::presenter::{render, DisplayModel};
pub use crate::supervisor::{BackendConfig, BackendSupervisor};

/// Prelude module for convenient imports.
///
/// ```rust
/// use scandesk::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        ArcProvider, FileHasher, FileHashes, ProgressReporter, ScanError, ScanFailure, ScanPhase,
        ScanProgress, ScanResult, ScanVerdict, SelectedFile, SessionId, ThreatLevel,
        VerdictProvider,
    };
    pub use crate::intake::FileIntake;
    pub use crate::orchestrator::{
        Orchestrator, OrchestratorConfig, ScanService, ScanServiceHandle, SessionState,
    };
    pub use crate::presenter::{render, DisplayModel};
}
