//! Session state machine states.

use crate::core::{ScanFailure, ScanProgress, ScanVerdict, SelectedFile, SessionId};

/// The state of the single scan session owned by the orchestrator.
///
/// `ScanProgress` only exists in `Scanning` and `ScanVerdict` only in
/// `Completed`, so at most one of them is ever active.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    /// No file selected.
    #[default]
    Idle,

    /// A file is selected and no scan is running.
    Ready {
        /// The selected file.
        file: SelectedFile,
    },

    /// The provider is working on the file.
    Scanning {
        /// Session the in-flight provider call belongs to.
        session: SessionId,
        /// The file being scanned.
        file: SelectedFile,
        /// Latest applied progress.
        progress: ScanProgress,
    },

    /// The provider returned a verdict.
    Completed {
        /// Session that produced the verdict.
        session: SessionId,
        /// The scanned file.
        file: SelectedFile,
        /// The verdict.
        verdict: ScanVerdict,
    },

    /// The scan failed; no verdict is retained.
    Failed {
        /// Session that failed.
        session: SessionId,
        /// The file that was being scanned.
        file: SelectedFile,
        /// Why it failed.
        failure: ScanFailure,
    },
}

impl SessionState {
    /// Returns `true` if no file is selected.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns `true` if a file is selected and waiting.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Returns `true` if a scan is in flight.
    pub fn is_scanning(&self) -> bool {
        matches!(self, Self::Scanning { .. })
    }

    /// Returns `true` if a verdict is available.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Returns `true` if the last scan failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Returns `true` once a scan has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.is_completed() || self.is_failed()
    }

    /// The selected file, in every state but `Idle`.
    pub fn file(&self) -> Option<&SelectedFile> {
        match self {
            Self::Idle => None,
            Self::Ready { file }
            | Self::Scanning { file, .. }
            | Self::Completed { file, .. }
            | Self::Failed { file, .. } => Some(file),
        }
    }

    /// The session currently scanning, if any.
    pub fn scanning_session(&self) -> Option<SessionId> {
        match self {
            Self::Scanning { session, .. } => Some(*session),
            _ => None,
        }
    }

    /// The progress of the running scan.
    pub fn progress(&self) -> Option<&ScanProgress> {
        match self {
            Self::Scanning { progress, .. } => Some(progress),
            _ => None,
        }
    }

    /// The verdict of the last completed scan.
    pub fn verdict(&self) -> Option<&ScanVerdict> {
        match self {
            Self::Completed { verdict, .. } => Some(verdict),
            _ => None,
        }
    }

    /// The failure of the last scan.
    pub fn failure(&self) -> Option<&ScanFailure> {
        match self {
            Self::Failed { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// Returns the name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ready { .. } => "ready",
            Self::Scanning { .. } => "scanning",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}
