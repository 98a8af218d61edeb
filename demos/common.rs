//! Shared utilities for demos.
//!
//! Provides common functionality used across all demos:
//! - Command-line argument parsing
//! - Logging initialization
//! - Event printing

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;

use bridge_client::{ClientEvent, Endpoint};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub receive: bool,
    pub url: Option<String>,
    pub file: Option<PathBuf>,
}

impl Args {
    /// Parse command-line arguments.
    ///
    /// Flags: `--debug`, `--receive`, `--url <ws://...>`; the first other
    /// argument is taken as a file path.
    pub fn parse() -> Self {
        let mut args = Self {
            debug: false,
            receive: false,
            url: None,
            file: None,
        };

        let mut iter = std::env::args().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--debug" => args.debug = true,
                "--receive" => args.receive = true,
                "--url" => args.url = iter.next(),
                _ if args.file.is_none() => args.file = Some(PathBuf::from(arg)),
                _ => {}
            }
        }

        args
    }

    /// Endpoint selected by the flags.
    pub fn endpoint(&self) -> Endpoint {
        let role = if self.receive {
            bridge_client::Role::Receive
        } else {
            bridge_client::Role::Transmit
        };

        match &self.url {
            Some(url) => Endpoint::new(url.clone(), role),
            None => Endpoint::local(role),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug {
        "bridge_client=debug"
    } else {
        "bridge_client=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Print one observer event.
pub fn print_event(event: &ClientEvent) {
    match event {
        ClientEvent::ConnectionStatusChanged { text, is_error } => {
            let mark = if *is_error { "✗" } else { "•" };
            println!("    {mark} status: {text}");
        }
        ClientEvent::DeviceIndicatorChanged { connected, label } => {
            let mark = if *connected { "●" } else { "○" };
            println!("    {mark} device: {label}");
        }
        ClientEvent::TransferCompleted { ok, detail } => {
            let mark = if *ok { "✓" } else { "✗" };
            println!("    {mark} transfer: {detail}");
        }
        ClientEvent::Notification { text } => {
            println!("    ! {text}");
        }
    }
}
