//! Shared helpers for integration tests.
//!
//! Set `RUST_LOG` (e.g. `RUST_LOG=tether=trace`) to see session logs.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Logging
// ============================================================================

/// Installs a test-friendly tracing subscriber once per test binary.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tether=warn"));

    // Already installed by another test in this binary
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Polling
// ============================================================================

/// Polls `condition` until it holds or five seconds pass.
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    condition()
}
