//! Core types and traits for the scandesk library.
//!
//! This module provides the fundamental building blocks used throughout
//! the library:
//!
//! - [`types`] - Session ids, digests and failure records
//! - [`verdict`] - `ScanVerdict` and threat classification
//! - [`progress`] - Scan phases and progress reporting
//! - [`traits`] - The `VerdictProvider` trait
//! - [`error`] - Structured error types
//! - [`input`] - The selected file
//! - [`hasher`] - MD5 / SHA-256 / SHA-512 hashing

pub mod error;
pub mod hasher;
pub mod input;
pub mod progress;
pub mod traits;
pub mod types;
pub mod verdict;

// Re-export commonly used types at the core level
pub use error::{ScanError, ScanResult, SupervisorError, SupervisorResult};
pub use hasher::FileHasher;
pub use input::{FileContent, SelectedFile};
pub use progress::{ProgressReporter, ScanPhase, ScanProgress};
pub use traits::{ensure_within_limit, ArcProvider, VerdictProvider};
pub use types::{DigestKind, FailureKind, FileHashes, HexDigest, ScanFailure, SessionId};
pub use verdict::{CleanRate, ScanVerdict, ThreatLevel};
