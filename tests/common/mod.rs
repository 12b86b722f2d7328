//! Shared helpers for the end-to-end suites.

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Initialize tracing output for a test binary. Safe to call repeatedly.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .with_thread_ids(true)
            .with_ansi(false)
            .try_init();
    });
}
