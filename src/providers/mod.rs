//! Verdict provider implementations.
//!
//! This module contains implementations of the `VerdictProvider` trait.
//!
//! ## Available Providers
//!
//! - [`mock`] - A configurable mock for tests and demos
//! - [`local`] - The bundled local backend over HTTP (requires `http` feature)
//! - [`virustotal`] - VirusTotal v3 REST API (requires `virustotal` feature)
//!
//! ## Implementing a Custom Provider
//!
//! Implement [`VerdictProvider`](crate::core::VerdictProvider), report the
//! scan phases through the `ProgressReporter` and return a `ScanVerdict`.
//! See `demos/custom_provider.rs`.

pub mod mock;
pub mod stats;

#[cfg(feature = "http")]
pub mod local;

#[cfg(feature = "virustotal")]
pub mod virustotal;

// Re-exports
pub use mock::{MockFailure, MockProvider};
pub use stats::EngineStats;

#[cfg(feature = "http")]
pub use local::{parse_backend_response, BackendReply, LocalBackendConfig, LocalBackendProvider};

#[cfg(feature = "virustotal")]
pub use virustotal::{VirusTotalConfig, VirusTotalProvider};
