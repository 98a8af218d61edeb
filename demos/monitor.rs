//! Connection monitor.
//!
//! Demonstrates:
//! - Connecting to a transmit or receive bridge
//! - Automatic verification, liveness probing and reconnection
//! - Printing every observer event until Ctrl+C
//!
//! Usage:
//!   cargo run --example monitor
//!   cargo run --example monitor -- --receive
//!   cargo run --example monitor -- --url ws://192.168.1.20:8765 --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use bridge_client::{BridgeClient, ClientEvent, Result};
use common::Args;
use tokio::sync::mpsc;

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
    let endpoint = args.endpoint();

    println!("=== Bridge Monitor ===\n");
    println!("Endpoint: {} ({})\n", endpoint.url(), endpoint.role());

    // ========================================================================
    // Spawn Client
    // ========================================================================

    let (events, mut rx) = mpsc::unbounded_channel::<ClientEvent>();
    let client = BridgeClient::builder().endpoint(endpoint).spawn(events)?;

    client.connect()?;
    println!("[1] Watching events (Ctrl+C to exit)...\n");

    // ========================================================================
    // Event Loop
    // ========================================================================

    loop {
        tokio::select! {
            Some(event) = rx.recv() => common::print_event(&event),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    println!("\n[2] Shutting down...");
    client.shutdown().await;
    println!("    ✓ Final state: {}", client.state());

    Ok(())
}
