//! Headless scan demonstrating the full desktop workflow in a terminal.
//!
//! This demo shows how to:
//! - Load configuration from the environment and initialise logging
//! - Optionally supervise the local backend process
//! - Feed a file through the intake and follow the scan
//! - Render every state change with the text presenter
//!
//! Run with: cargo run --example headless_scan -- <file> [--mock | --virustotal]

use scandesk::prelude::*;
use scandesk::presenter::text::render_text;
use scandesk::providers::MockProvider;
use scandesk::{AppConfig, BackendSupervisor};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let _guard = scandesk::logging::init_logging(config.log_dir.as_deref())?;

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next().map(PathBuf::from) else {
        eprintln!("usage: headless_scan <file> [--mock | --virustotal]");
        std::process::exit(2);
    };
    let mode = args.next().unwrap_or_default();

    println!("=== Scandesk Headless Scan ===\n");

    // Start the backend only when it will actually be used
    let supervisor = match config.backend_config() {
        Some(backend) if mode.is_empty() => Some(BackendSupervisor::start(backend).await?),
        _ => None,
    };

    let provider: ArcProvider = match mode.as_str() {
        "--mock" => Arc::new(MockProvider::clean().with_latency(Duration::from_millis(300))),
        "--virustotal" => {
            let vt = config
                .virustotal_config()
                .ok_or("VIRUSTOTAL_API_KEY is not set")?;
            Arc::new(scandesk::providers::VirusTotalProvider::new(vt)?)
        }
        _ => Arc::new(scandesk::providers::LocalBackendProvider::new(
            config.local_backend_config(),
        )?),
    };

    let service = ScanService::spawn(provider, config.orchestrator.clone());
    let intake = FileIntake::new(service.clone());
    let mut updates = service.subscribe();

    intake.on_browse(Some(path)).await?;
    if !config.orchestrator.auto_start_on_select {
        service.start_scan().await?;
    }

    // Print each published state until the scan finishes
    loop {
        let state = updates.borrow_and_update().clone();
        print!("{}", render_text(&render(&state)));
        if state.is_terminal() {
            break;
        }
        updates.changed().await?;
    }

    service.shutdown().await?;
    if let Some(supervisor) = supervisor {
        supervisor.shutdown().await?;
    }

    println!("\n=== Done ===");
    Ok(())
}
