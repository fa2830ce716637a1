//! The asynchronous scan service.
//!
//! `ScanService` runs an [`Orchestrator`] inside a single tokio task that
//! consumes one unbounded event queue. User commands, progress updates and
//! terminal events all go through that queue and are applied strictly in
//! arrival order. Every state change is published on a `watch` channel so
//! renderers only ever read snapshots.
//!
//! Each provider call runs in its own task, bounded by the configured scan
//! timeout; a provider that panics fails the session instead of leaving it
//! scanning. Its abort handle is kept so that cancelling or closing the
//! session stops the call; anything it still emits afterwards is recognised
//! as stale by its session id and dropped.

use crate::audit;
use crate::core::{
    ensure_within_limit, ArcProvider, ProgressReporter, ScanError, ScanFailure, ScanProgress,
    ScanResult, ScanVerdict, SelectedFile, SessionId,
};
use crate::orchestrator::config::OrchestratorConfig;
use crate::orchestrator::machine::{Orchestrator, ScanTicket};
use crate::orchestrator::state::SessionState;

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    SelectFile {
        file: SelectedFile,
        reply: Reply<ScanResult<Option<SessionId>>>,
    },
    RemoveFile {
        reply: Reply<bool>,
    },
    StartScan {
        reply: Reply<ScanResult<SessionId>>,
    },
    CancelScan {
        reply: Reply<bool>,
    },
    Close {
        reply: Reply<()>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::SelectFile { .. } => "select_file",
            Self::RemoveFile { .. } => "remove_file",
            Self::StartScan { .. } => "start_scan",
            Self::CancelScan { .. } => "cancel_scan",
            Self::Close { .. } => "close",
            Self::Shutdown { .. } => "shutdown",
        }
    }
}

enum Event {
    Command(Command),
    Progress {
        session: SessionId,
        progress: ScanProgress,
    },
    Finished {
        session: SessionId,
        outcome: Result<ScanVerdict, ScanError>,
    },
}

struct InFlight {
    session: SessionId,
    file: SelectedFile,
    abort: AbortHandle,
}

/// The scan service event loop.
///
/// # Example
///
/// ```rust,ignore
/// use scandesk::orchestrator::{OrchestratorConfig, ScanService};
/// use scandesk::providers::MockProvider;
/// use std::sync::Arc;
///
/// let handle = ScanService::spawn(Arc::new(MockProvider::clean()), OrchestratorConfig::default());
/// handle.select_file(file).await?;
/// let done = handle.wait_for(|s| s.is_terminal()).await?;
/// ```
pub struct ScanService {
    orchestrator: Orchestrator,
    provider: ArcProvider,
    events: mpsc::WeakUnboundedSender<Event>,
    state: watch::Sender<SessionState>,
    in_flight: Option<InFlight>,
}

impl ScanService {
    /// Spawns the event loop on the current tokio runtime.
    ///
    /// The loop runs until [`ScanServiceHandle::shutdown`] is called, or
    /// until every handle is dropped and no scan is running.
    pub fn spawn(provider: ArcProvider, config: OrchestratorConfig) -> ScanServiceHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let service = Self {
            orchestrator: Orchestrator::new(config),
            provider,
            events: tx.downgrade(),
            state: state_tx,
            in_flight: None,
        };
        tokio::spawn(service.run(rx));

        ScanServiceHandle {
            events: tx,
            state: state_rx,
        }
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<Event>) {
        tracing::info!(provider = %self.provider.name(), "Scan service started");

        while let Some(event) = events.recv().await {
            match event {
                Event::Command(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Event::Progress { session, progress } => self.on_progress(session, progress),
                Event::Finished { session, outcome } => self.on_finished(session, outcome),
            }
        }

        self.abort_in_flight("service stopped");
        tracing::info!("Scan service stopped");
    }

    /// Returns `false` when the loop must stop.
    ///
    /// State is published before replying, so a caller that awaited a
    /// command always observes its effect in the next snapshot.
    fn handle_command(&mut self, command: Command) -> bool {
        let name = command.name();
        match command {
            Command::SelectFile { file, reply } => {
                let result = self
                    .orchestrator
                    .select_file(file)
                    .map(|ticket| ticket.map(|t| self.launch(t)));
                self.log_rejection(name, &result);
                self.publish();
                let _ = reply.send(result);
            }
            Command::RemoveFile { reply } => {
                let removed = self.orchestrator.remove_file();
                self.publish();
                let _ = reply.send(removed);
            }
            Command::StartScan { reply } => {
                let result = self.orchestrator.start_scan().map(|t| self.launch(t));
                self.log_rejection(name, &result);
                self.publish();
                let _ = reply.send(result);
            }
            Command::CancelScan { reply } => {
                let cancelled = self.orchestrator.cancel_scan().is_some();
                if cancelled {
                    self.abort_in_flight("cancelled by user");
                }
                self.publish();
                let _ = reply.send(cancelled);
            }
            Command::Close { reply } => {
                if self.orchestrator.close().is_some() {
                    self.abort_in_flight("session closed");
                }
                self.publish();
                let _ = reply.send(());
            }
            Command::Shutdown { reply } => {
                if self.orchestrator.close().is_some() {
                    self.abort_in_flight("service shut down");
                }
                self.publish();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn log_rejection<T>(&self, command: &'static str, result: &ScanResult<T>) {
        if let Err(e) = result {
            tracing::warn!(
                command,
                state = self.orchestrator.state().name(),
                error = %e,
                "Command rejected"
            );
        }
    }

    fn on_progress(&mut self, session: SessionId, progress: ScanProgress) {
        match self.orchestrator.apply_progress(session, progress) {
            Ok(true) => self.publish(),
            Ok(false) => {}
            Err(ScanError::StaleSession { session, current }) => {
                audit::emit_stale_event_discarded(session, current, "progress");
            }
            Err(e) => tracing::warn!(session = %session, error = %e, "Progress not applied"),
        }
    }

    fn on_finished(&mut self, session: SessionId, outcome: Result<ScanVerdict, ScanError>) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.session == session)
        {
            self.in_flight = None;
        }

        if let Err(e) = &outcome {
            tracing::warn!(
                session = %session,
                provider = %self.provider.name(),
                error = %e,
                recoverable = e.is_recoverable(),
                "Provider call failed"
            );
        }

        let outcome = outcome.map_err(ScanFailure::from);
        match self.orchestrator.complete(session, outcome) {
            Ok(()) => {
                match self.orchestrator.state() {
                    SessionState::Completed {
                        session,
                        file,
                        verdict,
                    } => {
                        audit::emit_session_completed(*session, file, verdict);
                    }
                    SessionState::Failed {
                        session,
                        file,
                        failure,
                    } => {
                        audit::emit_session_failed(*session, file, failure);
                    }
                    _ => {}
                }
                self.publish();
            }
            Err(ScanError::StaleSession { session, current }) => {
                audit::emit_stale_event_discarded(session, current, "terminal");
            }
            Err(e) => tracing::warn!(session = %session, error = %e, "Terminal event not applied"),
        }
    }

    /// Spawns the provider call for a ticket and returns its session.
    fn launch(&mut self, ticket: ScanTicket) -> SessionId {
        let ScanTicket { session, file } = ticket;
        audit::emit_session_started(session, &file);

        // The loop holds a weak sender; only a running scan keeps the queue open.
        let Some(events) = self.events.upgrade() else {
            let failure = ScanFailure::from(ScanError::SessionClosed);
            let _ = self.orchestrator.complete(session, Err(failure));
            return session;
        };

        let progress_events = events.clone();
        let reporter = ProgressReporter::new(session, move |session, progress| {
            let _ = progress_events.send(Event::Progress { session, progress });
        });

        let provider = self.provider.clone();
        let timeout = self.orchestrator.config().scan_timeout;
        let task_file = file.clone();

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let call = async {
                if let Err(e) = ensure_within_limit(provider.as_ref(), task_file.size()) {
                    return Err(e);
                }
                match tokio::time::timeout(timeout, provider.submit(&task_file, &reporter)).await {
                    Ok(result) => result,
                    Err(_) => Err(ScanError::timeout(timeout)),
                }
            };
            // A panicking provider must still produce a terminal event.
            let outcome = match AssertUnwindSafe(call).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(session = %session, panic = %message, "Provider panicked");
                    Err(ScanError::internal(format!("provider panicked: {}", message)))
                }
            };
            tracing::debug!(
                session = %session,
                elapsed_ms = started.elapsed().as_millis() as u64,
                success = outcome.is_ok(),
                "Provider call finished"
            );
            let _ = events.send(Event::Finished { session, outcome });
        });

        self.in_flight = Some(InFlight {
            session,
            file,
            abort: task.abort_handle(),
        });
        session
    }

    fn abort_in_flight(&mut self, reason: &str) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.abort.abort();
            audit::emit_session_abandoned(in_flight.session, &in_flight.file, reason);
        }
    }

    fn publish(&self) {
        self.state.send_replace(self.orchestrator.state().clone());
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Cloneable handle for sending commands to a running [`ScanService`].
///
/// Every method fails with `SessionClosed` once the service has stopped.
#[derive(Clone)]
pub struct ScanServiceHandle {
    events: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<SessionState>,
}

impl ScanServiceHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> ScanResult<T> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(Event::Command(make(reply)))
            .map_err(|_| ScanError::SessionClosed)?;
        response.await.map_err(|_| ScanError::SessionClosed)
    }

    /// Selects a file. Returns the started session when auto-start is on.
    pub async fn select_file(&self, file: SelectedFile) -> ScanResult<Option<SessionId>> {
        self.request(|reply| Command::SelectFile { file, reply })
            .await?
    }

    /// Clears the selection. Returns `false` if nothing changed.
    pub async fn remove_file(&self) -> ScanResult<bool> {
        self.request(|reply| Command::RemoveFile { reply }).await
    }

    /// Starts (or re-runs) a scan of the selected file.
    pub async fn start_scan(&self) -> ScanResult<SessionId> {
        self.request(|reply| Command::StartScan { reply }).await?
    }

    /// Cancels the running scan. Returns `false` if nothing was scanning.
    pub async fn cancel_scan(&self) -> ScanResult<bool> {
        self.request(|reply| Command::CancelScan { reply }).await
    }

    /// Returns the session to `Idle`, abandoning any running scan.
    pub async fn close(&self) -> ScanResult<()> {
        self.request(|reply| Command::Close { reply }).await
    }

    /// Stops the service, aborting any running scan.
    pub async fn shutdown(&self) -> ScanResult<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// A receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Waits until the published state satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> ScanResult<SessionState>
    where
        F: FnMut(&SessionState) -> bool,
    {
        let mut state = self.state.clone();
        let matched = state
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| ScanError::SessionClosed)?;
        Ok(matched.clone())
    }

    /// Returns `true` once the service has stopped.
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

impl std::fmt::Debug for ScanServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanServiceHandle")
            .field("state", &self.state.borrow().name())
            .field("closed", &self.events.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FailureKind, ProgressReporter, ScanPhase, VerdictProvider};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug)]
    struct Fixed(ScanVerdict);

    #[async_trait]
    impl VerdictProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn submit(
            &self,
            _file: &SelectedFile,
            progress: &ProgressReporter,
        ) -> Result<ScanVerdict, ScanError> {
            for phase in ScanPhase::ALL {
                progress.enter(phase);
            }
            Ok(self.0.clone())
        }

        async fn health_check(&self) -> Result<(), ScanError> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Hangs;

    #[async_trait]
    impl VerdictProvider for Hangs {
        fn name(&self) -> &str {
            "hangs"
        }

        async fn submit(
            &self,
            _file: &SelectedFile,
            _progress: &ProgressReporter,
        ) -> Result<ScanVerdict, ScanError> {
            futures::future::pending().await
        }

        async fn health_check(&self) -> Result<(), ScanError> {
            Ok(())
        }

        fn max_file_size(&self) -> Option<u64> {
            Some(4)
        }
    }

    #[derive(Debug)]
    struct Panics;

    #[async_trait]
    impl VerdictProvider for Panics {
        fn name(&self) -> &str {
            "panics"
        }

        async fn submit(
            &self,
            _file: &SelectedFile,
            progress: &ProgressReporter,
        ) -> Result<ScanVerdict, ScanError> {
            progress.enter(ScanPhase::Uploading);
            panic!("engine table corrupted")
        }

        async fn health_check(&self) -> Result<(), ScanError> {
            Ok(())
        }
    }

    fn file(len: usize) -> SelectedFile {
        SelectedFile::from_bytes("sample.bin", vec![0u8; len]).unwrap()
    }

    #[tokio::test]
    async fn test_select_runs_scan_to_completion() {
        let handle = ScanService::spawn(
            Arc::new(Fixed(ScanVerdict::new(0, 1, 9, 10))),
            OrchestratorConfig::default(),
        );

        let session = handle.select_file(file(3)).await.unwrap();
        assert_eq!(session, Some(SessionId::new(1)));

        let state = handle.wait_for(|s| s.is_terminal()).await.unwrap();
        assert_eq!(state.verdict().unwrap().suspicious, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_provider_times_out() {
        let handle = ScanService::spawn(
            Arc::new(Hangs),
            OrchestratorConfig::default().with_scan_timeout(Duration::from_secs(30)),
        );

        handle.select_file(file(1)).await.unwrap();
        let state = handle.wait_for(|s| s.is_terminal()).await.unwrap();
        assert_eq!(state.failure().unwrap().kind, FailureKind::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_provider_fails_session() {
        let handle = ScanService::spawn(
            Arc::new(Panics),
            OrchestratorConfig::default().with_scan_timeout(Duration::from_secs(5)),
        );

        handle.select_file(file(1)).await.unwrap();
        let state = tokio::time::timeout(
            Duration::from_secs(60),
            handle.wait_for(|s| s.is_terminal()),
        )
        .await
        .expect("session stuck in scanning")
        .unwrap();

        let failure = state.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Internal);
        assert!(failure.reason.contains("engine table corrupted"));

        // The service is still usable after the panic.
        assert!(handle.remove_file().await.unwrap());
        assert!(handle.snapshot().is_idle());
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected() {
        let handle = ScanService::spawn(Arc::new(Hangs), OrchestratorConfig::default());

        handle.select_file(file(10)).await.unwrap();
        let state = handle.wait_for(|s| s.is_terminal()).await.unwrap();
        assert_eq!(state.failure().unwrap().kind, FailureKind::Rejected);
    }

    #[tokio::test]
    async fn test_cancel_then_shutdown() {
        let handle = ScanService::spawn(Arc::new(Hangs), OrchestratorConfig::default());

        handle.select_file(file(1)).await.unwrap();
        assert!(handle.cancel_scan().await.unwrap());
        assert!(handle.snapshot().is_ready());

        handle.shutdown().await.unwrap();
        assert!(matches!(
            handle.start_scan().await,
            Err(ScanError::SessionClosed)
        ));
    }
}
