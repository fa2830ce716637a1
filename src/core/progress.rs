//! Scan progress reporting.
//!
//! Providers report progress through a [`ProgressReporter`] handed to them by
//! the orchestrator. Each report is tagged with the session it belongs to so
//! that updates from an abandoned scan can be recognised and dropped.

use crate::core::types::SessionId;

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// The ordered phases a scan goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    /// File content is being handed to the provider.
    Uploading,
    /// Digests are being computed.
    ComputingHashes,
    /// Engines are being queried.
    QueryingEngines,
    /// Per-engine results are being aggregated.
    AggregatingResults,
}

impl ScanPhase {
    /// All phases in execution order.
    pub const ALL: [ScanPhase; 4] = [
        Self::Uploading,
        Self::ComputingHashes,
        Self::QueryingEngines,
        Self::AggregatingResults,
    ];

    /// Human-readable step label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Uploading => "Uploading",
            Self::ComputingHashes => "Computing hashes",
            Self::QueryingEngines => "Querying engines",
            Self::AggregatingResults => "Aggregating results",
        }
    }

    /// Percentage reported when the phase begins.
    pub fn start_percent(&self) -> f64 {
        match self {
            Self::Uploading => 0.0,
            Self::ComputingHashes => 25.0,
            Self::QueryingEngines => 50.0,
            Self::AggregatingResults => 75.0,
        }
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A progress snapshot: percentage plus the current step label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanProgress {
    percentage: f64,
    step: String,
}

impl ScanProgress {
    /// Label reported with the final 100% update.
    pub const COMPLETE_STEP: &'static str = "Scan complete";

    /// Creates a progress value, clamping the percentage into `[0, 100]`.
    ///
    /// NaN and negative zero are treated as 0.
    pub fn new(percentage: f64, step: impl Into<String>) -> Self {
        let percentage = if percentage.is_nan() || percentage <= 0.0 {
            0.0
        } else {
            percentage.min(100.0)
        };
        Self {
            percentage,
            step: step.into(),
        }
    }

    /// Progress at the start of a scan.
    pub fn started() -> Self {
        Self::at_phase(ScanPhase::Uploading)
    }

    /// Progress at the boundary of the given phase.
    pub fn at_phase(phase: ScanPhase) -> Self {
        Self::new(phase.start_percent(), phase.label())
    }

    /// Progress once every phase is done.
    pub fn complete() -> Self {
        Self::new(100.0, Self::COMPLETE_STEP)
    }

    /// Percentage in `[0, 100]`.
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    /// Current step label.
    pub fn step(&self) -> &str {
        &self.step
    }

    /// Returns `true` if applying `next` after `self` would move backwards.
    pub fn would_regress(&self, next: &ScanProgress) -> bool {
        next.percentage < self.percentage
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::started()
    }
}

type ProgressSink = Arc<dyn Fn(SessionId, ScanProgress) + Send + Sync>;

/// Session-scoped handle providers use to publish progress.
///
/// Cloning is cheap. Reports are fire-and-forget: a closed sink silently
/// swallows them, since a provider must never fail because nobody listens.
#[derive(Clone)]
pub struct ProgressReporter {
    session: SessionId,
    sink: Option<ProgressSink>,
}

impl ProgressReporter {
    /// Creates a reporter that forwards every update to `sink`.
    pub fn new<F>(session: SessionId, sink: F) -> Self
    where
        F: Fn(SessionId, ScanProgress) + Send + Sync + 'static,
    {
        Self {
            session,
            sink: Some(Arc::new(sink)),
        }
    }

    /// Creates a reporter that drops every update.
    pub fn noop(session: SessionId) -> Self {
        Self {
            session,
            sink: None,
        }
    }

    /// The session this reporter is bound to.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Publishes an arbitrary progress value.
    pub fn report(&self, progress: ScanProgress) {
        tracing::trace!(
            session = %self.session,
            percentage = progress.percentage(),
            step = progress.step(),
            "Progress reported"
        );
        if let Some(sink) = &self.sink {
            sink(self.session, progress);
        }
    }

    /// Publishes the boundary of `phase`.
    pub fn enter(&self, phase: ScanPhase) {
        self.report(ScanProgress::at_phase(phase));
    }

    /// Publishes the final 100% update.
    pub fn finish(&self) {
        self.report(ScanProgress::complete());
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("session", &self.session)
            .field("connected", &self.sink.is_some())
            .finish()
    }
}
