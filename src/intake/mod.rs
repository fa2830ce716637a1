//! Single-file intake.
//!
//! Drag-and-drop and the browse dialog are two equivalent ways of picking a
//! file; both end in the same `select_file` command on the scan service.
//! Only the first file of a multi-file drop is used, and a cancelled dialog
//! or an empty drop changes nothing.

use crate::core::{ScanError, ScanResult, SelectedFile, SessionId};
use crate::orchestrator::ScanServiceHandle;

use std::path::PathBuf;

/// What an intake action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Nothing was picked.
    Ignored,
    /// The file was selected; `session` is set when a scan started with it.
    Selected {
        /// Display name of the selected file.
        name: String,
        /// Session started by auto-start, if any.
        session: Option<SessionId>,
    },
}

/// Feeds user-picked files into the scan service.
#[derive(Debug, Clone)]
pub struct FileIntake {
    service: ScanServiceHandle,
}

impl FileIntake {
    /// Creates an intake bound to a running service.
    pub fn new(service: ScanServiceHandle) -> Self {
        Self { service }
    }

    /// Selects an already-built file.
    ///
    /// # Errors
    ///
    /// `ScanInProgress` while a scan is running.
    pub async fn select(&self, file: SelectedFile) -> ScanResult<IntakeOutcome> {
        let name = file.name().to_string();
        let session = self.service.select_file(file).await?;
        Ok(IntakeOutcome::Selected { name, session })
    }

    /// Handles files dropped onto the drop zone.
    ///
    /// # Errors
    ///
    /// `FileNotFound` or `InvalidFile` when the first path cannot be used.
    pub async fn on_drop<I>(&self, paths: I) -> ScanResult<IntakeOutcome>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut paths = paths.into_iter();
        let Some(first) = paths.next() else {
            return Ok(IntakeOutcome::Ignored);
        };
        let ignored = paths.count();
        if ignored > 0 {
            tracing::debug!(ignored, "Multi-file drop, using the first file only");
        }

        let file = SelectedFile::from_path(&first).await?;
        self.select(file).await
    }

    /// Handles an in-memory drop (e.g. content dragged from another app).
    pub async fn on_drop_bytes(
        &self,
        name: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> ScanResult<IntakeOutcome> {
        let file = SelectedFile::from_bytes(name, data)?;
        self.select(file).await
    }

    /// Handles the result of the browse dialog; `None` means cancelled.
    pub async fn on_browse(&self, picked: Option<PathBuf>) -> ScanResult<IntakeOutcome> {
        match picked {
            Some(path) => self.on_drop([path]).await,
            None => Ok(IntakeOutcome::Ignored),
        }
    }

    /// Clears the selection. Ignored while scanning.
    pub async fn remove(&self) -> Result<bool, ScanError> {
        self.service.remove_file().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{OrchestratorConfig, ScanService};
    use crate::providers::MockProvider;
    use std::io::Write;
    use std::sync::Arc;

    fn manual_intake() -> (FileIntake, ScanServiceHandle) {
        let handle = ScanService::spawn(
            Arc::new(MockProvider::clean()),
            OrchestratorConfig::new().with_auto_start(false),
        );
        (FileIntake::new(handle.clone()), handle)
    }

    #[tokio::test]
    async fn test_drop_uses_first_file() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.exe");
        let second = dir.path().join("second.exe");
        std::fs::File::create(&first)
            .unwrap()
            .write_all(&[0u8; 2048])
            .unwrap();
        std::fs::File::create(&second).unwrap();

        let (intake, handle) = manual_intake();
        let outcome = intake.on_drop(vec![first, second]).await.unwrap();

        assert_eq!(
            outcome,
            IntakeOutcome::Selected {
                name: "first.exe".into(),
                session: None
            }
        );
        let state = handle.snapshot();
        assert_eq!(state.file().unwrap().size(), 2048);
        assert!(state.is_ready());
    }

    #[tokio::test]
    async fn test_empty_drop_and_cancelled_browse_are_ignored() {
        let (intake, handle) = manual_intake();

        assert_eq!(
            intake.on_drop(Vec::new()).await.unwrap(),
            IntakeOutcome::Ignored
        );
        assert_eq!(intake.on_browse(None).await.unwrap(), IntakeOutcome::Ignored);
        assert!(handle.snapshot().is_idle());
    }

    #[tokio::test]
    async fn test_missing_path_and_directory_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (intake, handle) = manual_intake();

        let err = intake
            .on_browse(Some(dir.path().join("nope.bin")))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::FileNotFound { .. }));

        let err = intake.on_drop([dir.path().to_path_buf()]).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidFile { .. }));
        assert!(handle.snapshot().is_idle());
    }

    #[tokio::test]
    async fn test_bytes_then_remove() {
        let (intake, handle) = manual_intake();

        intake.on_drop_bytes("clip.txt", b"abc".to_vec()).await.unwrap();
        assert!(handle.snapshot().is_ready());

        assert!(intake.remove().await.unwrap());
        assert!(handle.snapshot().is_idle());
    }
}
