//! Local backend process supervision.
//!
//! The desktop shell starts the bundled scanning backend before any scan and
//! stops it on exit. [`BackendSupervisor`] owns the child process: it is
//! started with [`BackendSupervisor::start`], which returns once the backend
//! accepts TCP connections, and it is terminated by
//! [`BackendSupervisor::shutdown`] or, on any other exit path, when the
//! supervisor is dropped.

use crate::core::{SupervisorError, SupervisorResult};

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

/// Tracing target for forwarded backend output.
pub const BACKEND_LOG_TARGET: &str = "scandesk::backend";

/// Backend process configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Executable to launch.
    pub program: PathBuf,

    /// Command-line arguments.
    pub args: Vec<String>,

    /// Working directory, if different from the current one.
    pub working_dir: Option<PathBuf>,

    /// `host:port` the backend listens on.
    pub address: String,

    /// How long to wait for the port to open.
    pub startup_timeout: Duration,

    /// Delay between readiness probes.
    pub probe_interval: Duration,
}

impl BackendConfig {
    /// Creates a configuration for the given executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            address: "127.0.0.1:5000".to_string(),
            startup_timeout: Duration::from_secs(30),
            probe_interval: Duration::from_millis(250),
        }
    }

    /// Appends an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Sets the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the address probed for readiness.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Sets the startup timeout.
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Sets the probe interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }
}

/// A running backend process.
#[derive(Debug)]
pub struct BackendSupervisor {
    child: Child,
    program: PathBuf,
    address: String,
}

impl BackendSupervisor {
    /// Spawns the backend and waits until its port accepts connections.
    ///
    /// # Errors
    ///
    /// - `SpawnFailed` if the executable cannot be launched.
    /// - `ExitedEarly` if it exits before becoming ready.
    /// - `NotReady` if the port stays closed for `startup_timeout`; the
    ///   child is killed.
    pub async fn start(config: BackendConfig) -> SupervisorResult<Self> {
        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| SupervisorError::SpawnFailed {
            program: config.program.clone(),
            source,
        })?;

        tracing::info!(
            program = %config.program.display(),
            pid = ?child.id(),
            address = %config.address,
            "Backend process spawned"
        );

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, "stderr"));
        }

        let mut supervisor = Self {
            child,
            program: config.program,
            address: config.address,
        };
        supervisor
            .wait_until_ready(config.startup_timeout, config.probe_interval)
            .await?;
        Ok(supervisor)
    }

    async fn wait_until_ready(
        &mut self,
        startup_timeout: Duration,
        probe_interval: Duration,
    ) -> SupervisorResult<()> {
        let started = tokio::time::Instant::now();
        loop {
            if let Some(status) = self.child.try_wait()? {
                tracing::error!(%status, "Backend exited during startup");
                return Err(SupervisorError::ExitedEarly { status });
            }

            if let Ok(Ok(_)) =
                tokio::time::timeout(probe_interval, TcpStream::connect(self.address.as_str())).await
            {
                tracing::info!(
                    address = %self.address,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Backend ready"
                );
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= startup_timeout {
                tracing::error!(address = %self.address, ?waited, "Backend not ready, killing it");
                let _ = self.child.start_kill();
                return Err(SupervisorError::NotReady {
                    address: self.address.clone(),
                    waited,
                });
            }
            tokio::time::sleep(probe_interval).await;
        }
    }

    /// OS process id, while the process is running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Address the backend listens on.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Base URL for HTTP providers (`http://{address}`).
    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Returns `true` if the process has not exited.
    pub fn is_running(&mut self) -> SupervisorResult<bool> {
        Ok(self.child.try_wait()?.is_none())
    }

    /// Terminates the backend and waits for it to exit.
    pub async fn shutdown(mut self) -> SupervisorResult<ExitStatus> {
        if let Some(status) = self.child.try_wait()? {
            tracing::info!(%status, "Backend had already exited");
            return Ok(status);
        }
        self.child.start_kill()?;
        let status = self.child.wait().await?;
        tracing::info!(program = %self.program.display(), %status, "Backend stopped");
        Ok(status)
    }
}

impl Drop for BackendSupervisor {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            tracing::warn!(pid = ?self.child.id(), "Backend still running on drop, killing it");
            let _ = self.child.start_kill();
        }
    }
}

async fn forward_output<R>(stream: R, name: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if name == "stderr" => {
                tracing::warn!(target: BACKEND_LOG_TARGET, stream = name, "{}", line)
            }
            Ok(Some(line)) => tracing::info!(target: BACKEND_LOG_TARGET, stream = name, "{}", line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(target: BACKEND_LOG_TARGET, stream = name, error = %e, "Output stream closed");
                break;
            }
        }
    }
}
