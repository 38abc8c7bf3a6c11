//! Logging utilities for the scan operator
//!
//! Scan lifecycle events (start, exhaustion, misplanned ranges, close, release)
//! are emitted under the [`LOG_TARGET`] target at debug level.

#[cfg(feature = "logging")]
use tracing_subscriber::{EnvFilter, fmt};

/// `tracing` target used by every event this crate emits.
pub const LOG_TARGET: &str = "colscan";

/// Filter directives used when `RUST_LOG` is unset.
///
/// The global level applies to everything; the scan target gets the same level
/// so that `init_with_level("debug")` surfaces the scan lifecycle.
pub fn default_directives(level: &str) -> String {
    format!("{level},{LOG_TARGET}={level}")
}

/// Initialize logging with default settings
///
/// # Environment Variables
/// - `RUST_LOG` - Log level filter (default: "info"), e.g. `colscan=debug`
///
/// # Example
/// ```rust
/// colscan_core::logging::init();
/// ```
#[cfg(feature = "logging")]
pub fn init() {
    init_with_level("info")
}

/// Initialize logging with a specific level
///
/// Does nothing if a global subscriber is already installed.
#[cfg(feature = "logging")]
pub fn init_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}

/// Initialize logging for tests (captured by the test harness).
#[cfg(feature = "logging")]
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new(default_directives("debug")))
        .with_test_writer()
        .try_init();
}

#[cfg(not(feature = "logging"))]
pub fn init() {}

#[cfg(not(feature = "logging"))]
pub fn init_with_level(_level: &str) {}

#[cfg(not(feature = "logging"))]
pub fn init_test() {}
