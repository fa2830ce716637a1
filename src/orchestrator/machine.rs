//! The synchronous scan-session state machine.
//!
//! `Orchestrator` owns the single `SessionState` and applies user commands
//! and provider events to it. It performs no I/O: starting a scan returns a
//! [`ScanTicket`] describing the provider call to make, and the caller
//! reports the outcome back through [`Orchestrator::complete`]. This keeps
//! every transition testable without a runtime.

use crate::core::{
    ScanError, ScanFailure, ScanProgress, ScanVerdict, SelectedFile, SessionId,
};
use crate::orchestrator::config::OrchestratorConfig;
use crate::orchestrator::state::SessionState;

/// A scan the caller must now run against the provider.
#[derive(Debug, Clone)]
pub struct ScanTicket {
    /// Session id to tag progress and the terminal event with.
    pub session: SessionId,
    /// The file to submit.
    pub file: SelectedFile,
}

/// Owner of the scan-session state.
#[derive(Debug)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    state: SessionState,
    last_session: SessionId,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

impl Orchestrator {
    /// Creates an orchestrator in the `Idle` state.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            last_session: SessionId::new(0),
        }
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Configuration in use.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The session currently scanning, if any.
    pub fn current_session(&self) -> Option<SessionId> {
        self.state.scanning_session()
    }

    /// Selects a file, replacing any previous selection, verdict or failure.
    ///
    /// With `auto_start_on_select` enabled the scan starts right away and the
    /// returned ticket must be run.
    ///
    /// # Errors
    ///
    /// `ScanInProgress` while scanning; the running scan is left untouched.
    pub fn select_file(&mut self, file: SelectedFile) -> Result<Option<ScanTicket>, ScanError> {
        if self.state.is_scanning() {
            return Err(ScanError::ScanInProgress);
        }

        tracing::info!(
            file_name = %file.name(),
            file_size = file.size(),
            previous = self.state.name(),
            "File selected"
        );
        self.state = SessionState::Ready { file };

        if self.config.auto_start_on_select {
            return self.start_scan().map(Some);
        }
        Ok(None)
    }

    /// Clears the selection.
    ///
    /// Returns `false` when nothing changed: the intake was already empty, or
    /// a scan is running (removal is ignored while scanning).
    pub fn remove_file(&mut self) -> bool {
        match self.state {
            SessionState::Idle => false,
            SessionState::Scanning { session, .. } => {
                tracing::debug!(session = %session, "Ignoring file removal while scanning");
                false
            }
            _ => {
                tracing::info!(previous = self.state.name(), "File removed");
                self.state = SessionState::Idle;
                true
            }
        }
    }

    /// Starts a scan of the selected file under a fresh session id.
    ///
    /// From `Completed` or `Failed` this re-scans the same file.
    ///
    /// # Errors
    ///
    /// - `NoFileSelected` when idle.
    /// - `ScanInProgress` when a scan is already running.
    pub fn start_scan(&mut self) -> Result<ScanTicket, ScanError> {
        let file = match &self.state {
            SessionState::Idle => return Err(ScanError::NoFileSelected),
            SessionState::Scanning { .. } => return Err(ScanError::ScanInProgress),
            SessionState::Ready { file }
            | SessionState::Completed { file, .. }
            | SessionState::Failed { file, .. } => file.clone(),
        };

        let session = self.last_session.next();
        self.last_session = session;

        tracing::info!(session = %session, file_name = %file.name(), "Scan started");
        self.state = SessionState::Scanning {
            session,
            file: file.clone(),
            progress: ScanProgress::started(),
        };

        Ok(ScanTicket { session, file })
    }

    /// Applies a progress update.
    ///
    /// Returns `Ok(false)` when the update would move the percentage
    /// backwards and was dropped.
    ///
    /// # Errors
    ///
    /// `StaleSession` when `session` is not the one currently scanning.
    pub fn apply_progress(
        &mut self,
        session: SessionId,
        update: ScanProgress,
    ) -> Result<bool, ScanError> {
        let current = self.current_session();
        match &mut self.state {
            SessionState::Scanning {
                session: active,
                progress,
                ..
            } if *active == session => {
                if progress.would_regress(&update) {
                    tracing::debug!(
                        session = %session,
                        current = progress.percentage(),
                        dropped = update.percentage(),
                        "Dropping regressing progress"
                    );
                    return Ok(false);
                }
                tracing::debug!(
                    session = %session,
                    percentage = update.percentage(),
                    step = update.step(),
                    "Progress"
                );
                *progress = update;
                Ok(true)
            }
            _ => Err(ScanError::StaleSession { session, current }),
        }
    }

    /// Applies the terminal event of a scan.
    ///
    /// # Errors
    ///
    /// `StaleSession` when `session` is not the one currently scanning; the
    /// state is left unchanged.
    pub fn complete(
        &mut self,
        session: SessionId,
        outcome: Result<ScanVerdict, ScanFailure>,
    ) -> Result<(), ScanError> {
        let current = self.current_session();
        if current != Some(session) {
            return Err(ScanError::StaleSession { session, current });
        }

        let file = match std::mem::take(&mut self.state) {
            SessionState::Scanning { file, .. } => file,
            other => {
                self.state = other;
                return Err(ScanError::StaleSession { session, current });
            }
        };

        self.state = match outcome {
            Ok(verdict) => {
                tracing::info!(
                    session = %session,
                    malicious = verdict.malicious,
                    suspicious = verdict.suspicious,
                    clean = verdict.clean,
                    total = verdict.total,
                    threat_level = %verdict.threat_level(),
                    "Scan completed"
                );
                SessionState::Completed {
                    session,
                    file,
                    verdict,
                }
            }
            Err(failure) => {
                tracing::warn!(
                    session = %session,
                    kind = %failure.kind,
                    reason = %failure.reason,
                    "Scan failed"
                );
                SessionState::Failed {
                    session,
                    file,
                    failure,
                }
            }
        };
        Ok(())
    }

    /// Abandons the running scan and returns to `Ready` with the same file.
    ///
    /// Returns the abandoned session, or `None` if nothing was scanning.
    pub fn cancel_scan(&mut self) -> Option<SessionId> {
        match std::mem::take(&mut self.state) {
            SessionState::Scanning { session, file, .. } => {
                tracing::info!(session = %session, "Scan cancelled");
                self.state = SessionState::Ready { file };
                Some(session)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Returns to `Idle` from any state, abandoning a running scan.
    ///
    /// Returns the abandoned session, if one was scanning.
    pub fn close(&mut self) -> Option<SessionId> {
        let abandoned = self.current_session();
        if self.state.is_idle() {
            return None;
        }
        tracing::info!(previous = self.state.name(), abandoned = ?abandoned, "Session closed");
        self.state = SessionState::Idle;
        abandoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DigestKind, FailureKind, HexDigest, ScanPhase};
    use proptest::prelude::*;

    fn file(name: &str) -> SelectedFile {
        SelectedFile::from_bytes(name, vec![1, 2, 3]).unwrap()
    }

    fn manual() -> Orchestrator {
        Orchestrator::new(OrchestratorConfig::new().with_auto_start(false))
    }

    #[test]
    fn test_select_then_remove() {
        let mut orch = manual();
        assert!(orch.select_file(file("a.exe")).unwrap().is_none());
        assert!(orch.state().is_ready());

        assert!(orch.remove_file());
        assert!(orch.state().is_idle());
        assert!(!orch.remove_file());
    }

    #[test]
    fn test_start_without_file_is_rejected() {
        let mut orch = manual();
        assert!(matches!(orch.start_scan(), Err(ScanError::NoFileSelected)));
        assert!(orch.state().is_idle());
    }

    #[test]
    fn test_auto_start_on_select() {
        let mut orch = Orchestrator::default();
        let ticket = orch.select_file(file("a.exe")).unwrap().unwrap();

        assert_eq!(ticket.session, SessionId::new(1));
        assert_eq!(ticket.file.name(), "a.exe");
        assert_eq!(orch.current_session(), Some(ticket.session));
        assert_eq!(orch.state().progress().unwrap().percentage(), 0.0);
    }

    #[test]
    fn test_full_happy_path() {
        let mut orch = manual();
        orch.select_file(file("a.exe")).unwrap();
        let ticket = orch.start_scan().unwrap();

        for phase in ScanPhase::ALL {
            assert!(orch
                .apply_progress(ticket.session, ScanProgress::at_phase(phase))
                .unwrap());
        }
        assert_eq!(orch.state().progress().unwrap().step(), "Aggregating results");

        orch.complete(ticket.session, Ok(ScanVerdict::new(0, 0, 10, 10)))
            .unwrap();
        assert!(orch.state().is_completed());
        assert!(orch.state().progress().is_none());
        assert_eq!(orch.state().verdict().unwrap().total, 10);
    }

    #[test]
    fn test_regressing_progress_is_ignored() {
        let mut orch = Orchestrator::default();
        let ticket = orch.select_file(file("a")).unwrap().unwrap();

        orch.apply_progress(ticket.session, ScanProgress::new(50.0, "Querying engines"))
            .unwrap();
        let applied = orch
            .apply_progress(ticket.session, ScanProgress::new(25.0, "Computing hashes"))
            .unwrap();

        assert!(!applied);
        let progress = orch.state().progress().unwrap();
        assert_eq!(progress.percentage(), 50.0);
        assert_eq!(progress.step(), "Querying engines");
    }

    #[test]
    fn test_failure_keeps_no_verdict() {
        let mut orch = Orchestrator::default();
        let ticket = orch.select_file(file("a")).unwrap().unwrap();

        let failure = ScanFailure::new(FailureKind::ProviderUnavailable, "backend down");
        orch.complete(ticket.session, Err(failure.clone())).unwrap();

        assert!(orch.state().is_failed());
        assert!(orch.state().verdict().is_none());
        assert_eq!(orch.state().failure(), Some(&failure));
    }

    #[test]
    fn test_select_while_completed_clears_verdict() {
        let mut orch = manual();
        orch.select_file(file("first")).unwrap();
        let ticket = orch.start_scan().unwrap();
        let sha = HexDigest::parse(DigestKind::Sha256, &"a".repeat(64)).unwrap();
        orch.complete(ticket.session, Ok(ScanVerdict::new(1, 0, 0, 1).with_digest(sha)))
            .unwrap();

        orch.select_file(file("second")).unwrap();

        assert!(orch.state().is_ready());
        assert!(orch.state().verdict().is_none());
        assert_eq!(orch.state().file().unwrap().name(), "second");
    }

    #[test]
    fn test_remove_while_scanning_is_noop() {
        let mut orch = Orchestrator::default();
        let ticket = orch.select_file(file("a")).unwrap().unwrap();

        assert!(!orch.remove_file());
        assert_eq!(orch.current_session(), Some(ticket.session));
    }

    #[test]
    fn test_select_or_start_while_scanning_is_rejected() {
        let mut orch = Orchestrator::default();
        let ticket = orch.select_file(file("a")).unwrap().unwrap();

        assert!(matches!(
            orch.select_file(file("b")),
            Err(ScanError::ScanInProgress)
        ));
        assert!(matches!(orch.start_scan(), Err(ScanError::ScanInProgress)));
        assert_eq!(orch.state().file().unwrap().name(), "a");
        assert_eq!(orch.current_session(), Some(ticket.session));
    }

    #[test]
    fn test_stale_terminal_event_is_discarded() {
        let mut orch = Orchestrator::default();
        let old = orch.select_file(file("a")).unwrap().unwrap();
        orch.cancel_scan();
        let new = orch.start_scan().unwrap();
        assert!(new.session > old.session);

        let result = orch.complete(old.session, Ok(ScanVerdict::new(9, 0, 0, 9)));
        assert!(matches!(
            result,
            Err(ScanError::StaleSession { session, current }) if session == old.session && current == Some(new.session)
        ));
        assert!(orch.state().is_scanning());

        let stale_progress = orch.apply_progress(old.session, ScanProgress::complete());
        assert!(stale_progress.is_err());
        assert_eq!(orch.state().progress().unwrap().percentage(), 0.0);
    }

    #[test]
    fn test_terminal_event_after_close_is_discarded() {
        let mut orch = Orchestrator::default();
        let ticket = orch.select_file(file("a")).unwrap().unwrap();

        assert_eq!(orch.close(), Some(ticket.session));
        assert!(orch
            .complete(ticket.session, Ok(ScanVerdict::new(0, 0, 1, 1)))
            .is_err());
        assert!(orch.state().is_idle());
    }

    #[test]
    fn test_cancel_returns_to_ready() {
        let mut orch = Orchestrator::default();
        let ticket = orch.select_file(file("a")).unwrap().unwrap();

        assert_eq!(orch.cancel_scan(), Some(ticket.session));
        assert!(orch.state().is_ready());
        assert_eq!(orch.cancel_scan(), None);
    }

    #[test]
    fn test_rescan_from_failed_uses_new_session() {
        let mut orch = Orchestrator::default();
        let first = orch.select_file(file("a")).unwrap().unwrap();
        orch.complete(
            first.session,
            Err(ScanFailure::new(FailureKind::Timeout, "timed out")),
        )
        .unwrap();

        let second = orch.start_scan().unwrap();
        assert_eq!(second.session, first.session.next());
        assert_eq!(second.file.name(), "a");
        assert!(orch.state().failure().is_none());
    }

    proptest! {
        #[test]
        fn prop_displayed_progress_is_running_max(values in prop::collection::vec(0.0f64..=100.0, 0..32)) {
            let mut orch = Orchestrator::default();
            let ticket = orch.select_file(file("a")).unwrap().unwrap();

            let mut expected = 0.0f64;
            for value in values {
                let applied = orch
                    .apply_progress(ticket.session, ScanProgress::new(value, "step"))
                    .unwrap();
                prop_assert_eq!(applied, value >= expected);
                expected = expected.max(value);
                prop_assert_eq!(orch.state().progress().unwrap().percentage(), expected);
            }
        }
    }
}
