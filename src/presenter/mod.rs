//! Rendering of session state.
//!
//! [`render`] is a pure function from [`SessionState`] to a [`DisplayModel`]:
//! everything a view needs, already formatted, with no decisions left to
//! the view. [`text`] turns a model into plain text for headless use.

pub mod text;

use crate::core::{FailureKind, ScanVerdict, SelectedFile, ThreatLevel};
use crate::orchestrator::SessionState;

use serde::Serialize;

/// Number of segments in the progress indicator.
pub const SEGMENT_COUNT: usize = 4;

/// The selected-file card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileCard {
    /// Display name.
    pub name: String,
    /// Size label (`"1.50 MB"`).
    pub size_label: String,
}

impl From<&SelectedFile> for FileCard {
    fn from(file: &SelectedFile) -> Self {
        Self {
            name: file.name().to_string(),
            size_label: file.size_display(),
        }
    }
}

/// A labelled, copyable digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashBlock {
    /// `"MD5"`, `"SHA-256"` or `"SHA-512"`.
    pub label: &'static str,
    /// Lowercase hex digest.
    pub value: String,
}

/// Everything the result view shows for a completed scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerdictView {
    /// Threat level.
    pub level: ThreatLevel,
    /// Banner text.
    pub banner: &'static str,
    /// Malicious counter.
    pub malicious: u32,
    /// Suspicious counter.
    pub suspicious: u32,
    /// Clean counter.
    pub clean: u32,
    /// Total engines counter.
    pub total: u32,
    /// Clean rate with one decimal (`"83.3%"`).
    pub clean_rate_label: String,
    /// Clean-rate bar fill in `[0, 1]`.
    pub clean_rate_fill: f64,
    /// Set when the provider reported zero engines.
    pub no_engines_reported: bool,
    /// One block per available digest, MD5 first.
    pub hashes: Vec<HashBlock>,
}

impl From<&ScanVerdict> for VerdictView {
    fn from(verdict: &ScanVerdict) -> Self {
        let level = verdict.threat_level();
        let rate = verdict.clean_rate();
        Self {
            level,
            banner: level.banner(),
            malicious: verdict.malicious,
            suspicious: verdict.suspicious,
            clean: verdict.clean,
            total: verdict.total,
            clean_rate_label: rate.to_string(),
            clean_rate_fill: (rate.percent() / 100.0).clamp(0.0, 1.0),
            no_engines_reported: rate.is_undefined(),
            hashes: verdict
                .hashes
                .iter()
                .map(|digest| HashBlock {
                    label: digest.kind().label(),
                    value: digest.as_str().to_string(),
                })
                .collect(),
        }
    }
}

/// The view to show for a session state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DisplayModel {
    /// The intake control, with the file card once a file is selected.
    Intake {
        /// Selected file, if any.
        file: Option<FileCard>,
    },

    /// The progress view.
    Scanning {
        /// File being scanned.
        file: FileCard,
        /// Current step label.
        step: String,
        /// Exact percentage.
        percentage: f64,
        /// Rounded percentage label (`"50%"`).
        percent_label: String,
        /// Lit state of each indicator segment.
        segments: [bool; SEGMENT_COUNT],
    },

    /// The result view.
    Completed {
        /// Scanned file.
        file: FileCard,
        /// The verdict.
        verdict: VerdictView,
    },

    /// The error view.
    Failed {
        /// File that was being scanned.
        file: FileCard,
        /// Failure category.
        kind: FailureKind,
        /// Reason shown to the user.
        reason: String,
    },
}

/// Segment `i` (1-based) is lit once the percentage reaches `25 * i`.
pub fn segments(percentage: f64) -> [bool; SEGMENT_COUNT] {
    let step = 100.0 / SEGMENT_COUNT as f64;
    std::array::from_fn(|i| percentage >= step * (i + 1) as f64)
}

/// Renders a session state.
pub fn render(state: &SessionState) -> DisplayModel {
    match state {
        SessionState::Idle => DisplayModel::Intake { file: None },
        SessionState::Ready { file } => DisplayModel::Intake {
            file: Some(file.into()),
        },
        SessionState::Scanning { file, progress, .. } => {
            let percentage = progress.percentage();
            DisplayModel::Scanning {
                file: file.into(),
                step: progress.step().to_string(),
                percentage,
                percent_label: format!("{}%", percentage.round()),
                segments: segments(percentage),
            }
        }
        SessionState::Completed { file, verdict, .. } => DisplayModel::Completed {
            file: file.into(),
            verdict: verdict.into(),
        },
        SessionState::Failed { file, failure, .. } => DisplayModel::Failed {
            file: file.into(),
            kind: failure.kind,
            reason: failure.reason.clone(),
        },
    }
}
