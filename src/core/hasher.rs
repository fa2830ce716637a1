//! File hashing for verdict digests.
//!
//! `FileHasher` computes the MD5, SHA-256 and SHA-512 digests shown with a
//! verdict. Each algorithm can be switched off; data is streamed through all
//! enabled hashers in a single pass.

use crate::core::error::ScanError;
use crate::core::input::{FileContent, SelectedFile};
use crate::core::types::{DigestKind, FileHashes, HexDigest};

use md5::Md5;
use sha2::{Digest, Sha256, Sha512};
use std::io::Read;
use std::path::Path;

/// Configuration for computing file digests.
///
/// # Examples
///
/// ```rust
/// use scandesk::core::FileHasher;
///
/// // Default: all three digests
/// let hasher = FileHasher::new();
///
/// // SHA-256 only, enough for a VirusTotal lookup
/// let hasher = FileHasher::new().with_md5(false).with_sha512(false);
/// assert!(hasher.computes_sha256());
/// ```
#[derive(Debug, Clone)]
pub struct FileHasher {
    compute_md5: bool,
    compute_sha256: bool,
    compute_sha512: bool,
}

impl Default for FileHasher {
    fn default() -> Self {
        Self {
            compute_md5: true,
            compute_sha256: true,
            compute_sha512: true,
        }
    }
}

impl FileHasher {
    /// Creates a hasher computing every supported digest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables MD5.
    pub fn with_md5(mut self, enabled: bool) -> Self {
        self.compute_md5 = enabled;
        self
    }

    /// Enables or disables SHA-256.
    pub fn with_sha256(mut self, enabled: bool) -> Self {
        self.compute_sha256 = enabled;
        self
    }

    /// Enables or disables SHA-512.
    pub fn with_sha512(mut self, enabled: bool) -> Self {
        self.compute_sha512 = enabled;
        self
    }

    /// Returns whether MD5 computation is enabled.
    pub fn computes_md5(&self) -> bool {
        self.compute_md5
    }

    /// Returns whether SHA-256 computation is enabled.
    pub fn computes_sha256(&self) -> bool {
        self.compute_sha256
    }

    /// Returns whether SHA-512 computation is enabled.
    pub fn computes_sha512(&self) -> bool {
        self.compute_sha512
    }

    /// Computes digests of in-memory bytes.
    pub fn hash_bytes(&self, data: &[u8]) -> FileHashes {
        let mut state = HashState::new(self);
        state.update(data);
        state.finalize()
    }

    /// Computes digests from a synchronous reader.
    pub fn hash_reader<R: Read>(&self, reader: &mut R) -> Result<FileHashes, ScanError> {
        let mut state = HashState::new(self);
        let mut buffer = [0u8; 64 * 1024];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            state.update(&buffer[..bytes_read]);
        }
        Ok(state.finalize())
    }

    /// Computes digests of a file on disk, streaming it.
    pub fn hash_file(&self, path: &Path) -> Result<FileHashes, ScanError> {
        let file = std::fs::File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ScanError::Io(e)
            }
        })?;
        let mut reader = std::io::BufReader::new(file);
        self.hash_reader(&mut reader)
    }

    /// Computes digests of a selection off the async runtime threads.
    pub async fn hash_selected(&self, file: &SelectedFile) -> Result<FileHashes, ScanError> {
        let hasher = self.clone();
        let content = file.content().clone();
        tokio::task::spawn_blocking(move || match content {
            FileContent::Path(path) => hasher.hash_file(&path),
            FileContent::Bytes(data) => Ok(hasher.hash_bytes(&data)),
        })
        .await
        .map_err(|e| ScanError::internal(format!("hashing task failed: {}", e)))?
    }
}

struct HashState {
    md5: Option<Md5>,
    sha256: Option<Sha256>,
    sha512: Option<Sha512>,
}

impl HashState {
    fn new(config: &FileHasher) -> Self {
        Self {
            md5: config.compute_md5.then(Md5::new),
            sha256: config.compute_sha256.then(Sha256::new),
            sha512: config.compute_sha512.then(Sha512::new),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        if let Some(h) = self.md5.as_mut() {
            h.update(chunk);
        }
        if let Some(h) = self.sha256.as_mut() {
            h.update(chunk);
        }
        if let Some(h) = self.sha512.as_mut() {
            h.update(chunk);
        }
    }

    fn finalize(self) -> FileHashes {
        FileHashes {
            md5: self
                .md5
                .map(|h| HexDigest::from_hasher(DigestKind::Md5, format!("{:x}", h.finalize()))),
            sha256: self.sha256.map(|h| {
                HexDigest::from_hasher(DigestKind::Sha256, format!("{:x}", h.finalize()))
            }),
            sha512: self.sha512.map(|h| {
                HexDigest::from_hasher(DigestKind::Sha512, format!("{:x}", h.finalize()))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests() {
        let hashes = FileHasher::new().hash_bytes(b"hello world");

        assert_eq!(
            hashes.md5.unwrap().as_str(),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
        assert_eq!(
            hashes.sha256.unwrap().as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(hashes.sha512.unwrap().as_str().len(), 128);
    }

    #[test]
    fn test_disabled_digests_are_absent() {
        let hasher = FileHasher::new().with_md5(false).with_sha512(false);
        let hashes = hasher.hash_bytes(b"data");

        assert!(hashes.md5.is_none());
        assert!(hashes.sha256.is_some());
        assert!(hashes.sha512.is_none());
    }

    #[test]
    fn test_reader_matches_bytes() {
        let data = vec![7u8; 200 * 1024];
        let hasher = FileHasher::new();

        let from_bytes = hasher.hash_bytes(&data);
        let from_reader = hasher.hash_reader(&mut data.as_slice()).unwrap();
        assert_eq!(from_bytes, from_reader);
    }

    #[tokio::test]
    async fn test_hash_selected_bytes() {
        let file = SelectedFile::from_bytes("a.txt", b"hello world".to_vec()).unwrap();
        let hashes = FileHasher::new().hash_selected(&file).await.unwrap();
        assert_eq!(
            hashes.md5.unwrap().as_str(),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }
}
