//! Structured logging setup.
//!
//! Logging is controlled by `RUST_LOG` (default: `warn`). The pipeline
//! logs phase-level progress at `info` and per-page detail at `debug`;
//! pure components stay quiet on their hot paths.
//!
//! ```bash
//! # Default: warnings and errors only
//! taxdoc process inputs/ --yymm 2508
//!
//! # Phase-level progress
//! RUST_LOG=info taxdoc process inputs/ --yymm 2508
//!
//! # Per-page detail for the taxdoc crate only
//! RUST_LOG=taxdoc=debug taxdoc process inputs/ --yymm 2508
//! ```
//!
//! Set `TAXDOC_LOG_FILE` to divert output to a file.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if let Ok(path) = std::env::var("TAXDOC_LOG_FILE") {
        if let Ok(file) = std::fs::File::create(&path) {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
