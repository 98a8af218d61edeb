//! File upload.
//!
//! Demonstrates:
//! - Verifying the device before sending
//! - Uploading a file read from disk
//! - Handling bridge rejections
//!
//! Usage:
//!   cargo run --example upload -- firmware.bin
//!   cargo run --example upload -- firmware.bin --url ws://127.0.0.1:9000 --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use bridge_client::{BridgeClient, ClientEvent, ConnectionState, Error, FileUpload, Result};
use common::Args;
use tokio::sync::mpsc;

// ============================================================================
// Constants
// ============================================================================

const READY_TIMEOUT: Duration = Duration::from_secs(15);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let path = args
        .file
        .clone()
        .ok_or_else(|| Error::invalid_argument("usage: upload <file> [--url <ws://...>]"))?;

    println!("=== Bridge Upload ===\n");

    // ========================================================================
    // Read File
    // ========================================================================

    println!("[1] Reading {}...", path.display());
    let upload = FileUpload::read(&path).await?;
    println!("    ✓ {} ({:.1} KB)\n", upload.filename, upload.size as f64 / 1024.0);

    // ========================================================================
    // Connect
    // ========================================================================

    let (events, mut rx) = mpsc::unbounded_channel::<ClientEvent>();
    let client = BridgeClient::builder()
        .endpoint(args.endpoint())
        .spawn(events)?;

    println!("[2] Checking device...");
    let device = client.check_connection().await?;
    println!("    ✓ {}\n", device.label());

    let mut status = client.watch_status();
    tokio::time::timeout(READY_TIMEOUT, status.wait_for(|s| s.state == ConnectionState::Ready))
        .await
        .map_err(|_| Error::timeout("wait_ready", READY_TIMEOUT.as_millis() as u64))?
        .map_err(|_| Error::Shutdown)?;

    // ========================================================================
    // Upload
    // ========================================================================

    println!("[3] Uploading...");
    let start = Instant::now();
    let result = client.upload(upload).await;

    while let Ok(event) = rx.try_recv() {
        common::print_event(&event);
    }

    match result {
        Ok(receipt) => println!(
            "    ✓ {} ({} bytes) in {:.2?}\n",
            receipt.filename,
            receipt.size,
            start.elapsed()
        ),
        Err(e) => println!("    ✗ {}\n", e.reason()),
    }

    client.shutdown().await;
    Ok(())
}
