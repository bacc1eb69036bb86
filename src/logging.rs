//! Logging and tracing configuration for the disc scrubber
//!
//! This module provides structured logging using the `tracing` crate.
//!
//! # Log Levels
//!
//! - `error` - Access failures, aborted rewrites, failed version stamps
//! - `warn`  - Non-standard image sizes, clipped regions
//! - `info`  - Run start/finish and outcome (default in release)
//! - `debug` - Every marked region and parsed partition (default in debug builds)
//! - `trace` - Per-cluster decisions during the rewrite pass
//!
//! # Environment Variable Control
//!
//! Set `RUST_LOG` to control log levels at runtime:
//! ```bash
//! RUST_LOG=debug disc-scrub game.iso
//! RUST_LOG=disc_scrubber::scrub::rewrite=trace disc-scrub game.iso
//! ```

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging/tracing system
///
/// Call this once at application startup (in main.rs)
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) || cfg!(feature = "debug-logging") {
            EnvFilter::new("disc_scrub=debug,disc_scrubber=debug")
        } else {
            EnvFilter::new("disc_scrub=info,disc_scrubber=info")
        }
    });

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    // Ignore the error if a subscriber is already installed
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Initialize logging with verbose output (file:line, thread IDs)
pub fn init_verbose() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .pretty(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Check if trace logging is enabled
/// Used to skip per-cluster formatting in the rewrite loop
#[inline]
pub fn is_trace_enabled() -> bool {
    tracing::enabled!(Level::TRACE)
}
