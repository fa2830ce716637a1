//! The file a user picked for analysis.
//!
//! A `SelectedFile` carries the display name, the byte size and a handle to
//! the content. The handle is either a path on disk or a shared in-memory
//! buffer, so cloning a selection never copies file data.

use crate::core::error::ScanError;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the bytes of a selected file live.
#[derive(Clone)]
pub enum FileContent {
    /// A file on disk, read when the provider needs it.
    Path(PathBuf),
    /// Bytes already in memory (e.g. dropped from another application).
    Bytes(Arc<[u8]>),
}

impl fmt::Debug for FileContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes(data) => f
                .debug_struct("Bytes")
                .field("data_len", &data.len())
                .finish(),
        }
    }
}

/// A user-chosen file.
///
/// # Examples
///
/// ```rust
/// use scandesk::core::SelectedFile;
///
/// let file = SelectedFile::from_bytes("invoice.pdf", b"%PDF-1.7".to_vec()).unwrap();
/// assert_eq!(file.name(), "invoice.pdf");
/// assert_eq!(file.size(), 8);
/// ```
#[derive(Debug, Clone)]
pub struct SelectedFile {
    name: String,
    size: u64,
    content: FileContent,
}

impl SelectedFile {
    /// Creates a selection from its parts.
    ///
    /// The name must not be empty; no other validation is applied, any file
    /// type is accepted.
    pub fn new(name: impl Into<String>, size: u64, content: FileContent) -> Result<Self, ScanError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ScanError::invalid_file("file name is empty"));
        }
        Ok(Self {
            name,
            size,
            content,
        })
    }

    /// Creates a selection from in-memory bytes.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Result<Self, ScanError> {
        let data: Arc<[u8]> = Arc::from(data.into());
        let size = data.len() as u64;
        Self::new(name, size, FileContent::Bytes(data))
    }

    /// Creates a selection from a path, reading its metadata.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ScanError::Io(e)
            }
        })?;

        if metadata.is_dir() {
            return Err(ScanError::invalid_file(format!(
                "{} is a directory",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::new(name, metadata.len(), FileContent::Path(path.to_path_buf()))
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Size in mebibytes, formatted with two decimals (`"1.50 MB"`).
    pub fn size_display(&self) -> String {
        format!("{:.2} MB", self.size as f64 / 1024.0 / 1024.0)
    }

    /// The content handle.
    pub fn content(&self) -> &FileContent {
        &self.content
    }

    /// Returns the path, if this selection is backed by a file on disk.
    pub fn path(&self) -> Option<&Path> {
        match &self.content {
            FileContent::Path(path) => Some(path),
            FileContent::Bytes(_) => None,
        }
    }

    /// Reads the full content.
    pub async fn read(&self) -> Result<Vec<u8>, ScanError> {
        match &self.content {
            FileContent::Path(path) => tokio::fs::read(path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ScanError::FileNotFound { path: path.clone() }
                } else {
                    ScanError::Io(e)
                }
            }),
            FileContent::Bytes(data) => Ok(data.to_vec()),
        }
    }
}
