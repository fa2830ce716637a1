//! Custom provider demo showing how to plug in a new verdict source.
//!
//! This demo shows how to:
//! - Implement the VerdictProvider trait
//! - Report scan phases through the ProgressReporter
//! - Run it behind the ScanService and render the verdict
//!
//! Run with: cargo run --example custom_provider

use async_trait::async_trait;
use scandesk::prelude::*;

use std::collections::HashSet;
use std::sync::Arc;

/// Flags files whose SHA-256 is on a local blocklist.
///
/// Every file counts as one engine, so the verdict is either 1/1 malicious
/// or 1/1 clean.
#[derive(Debug)]
struct BlocklistProvider {
    blocklist: HashSet<String>,
    hasher: FileHasher,
}

impl BlocklistProvider {
    fn new() -> Self {
        Self {
            blocklist: HashSet::new(),
            hasher: FileHasher::new().with_md5(false).with_sha512(false),
        }
    }

    fn with_blocked_hash(mut self, sha256: impl Into<String>) -> Self {
        self.blocklist.insert(sha256.into());
        self
    }
}

#[async_trait]
impl VerdictProvider for BlocklistProvider {
    fn name(&self) -> &str {
        "blocklist"
    }

    async fn submit(
        &self,
        file: &SelectedFile,
        progress: &ProgressReporter,
    ) -> Result<ScanVerdict, ScanError> {
        progress.enter(ScanPhase::Uploading);
        progress.enter(ScanPhase::ComputingHashes);
        let hashes = self.hasher.hash_selected(file).await?;

        progress.enter(ScanPhase::QueryingEngines);
        let blocked = hashes
            .sha256
            .as_ref()
            .is_some_and(|sha| self.blocklist.contains(sha.as_str()));

        tracing::debug!(file_name = %file.name(), blocked, "Blocklist checked");

        progress.enter(ScanPhase::AggregatingResults);
        let verdict = if blocked {
            ScanVerdict::new(1, 0, 0, 1)
        } else {
            ScanVerdict::new(0, 0, 1, 1)
        };
        progress.finish();
        Ok(verdict.with_hashes(hashes))
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Scandesk Custom Provider Demo ===\n");

    // SHA-256 of "hello world"
    let provider = BlocklistProvider::new()
        .with_blocked_hash("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
    let service = ScanService::spawn(Arc::new(provider), OrchestratorConfig::default());

    for (name, content) in [
        ("greeting.txt", b"hello world".to_vec()),
        ("notes.txt", b"nothing to see".to_vec()),
    ] {
        service
            .select_file(SelectedFile::from_bytes(name, content)?)
            .await?;
        let state = service.wait_for(|s| s.is_terminal()).await?;
        println!("{}", render(&state));
    }

    service.shutdown().await?;
    Ok(())
}
