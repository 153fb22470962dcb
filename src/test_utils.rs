//! Shared test helpers.

/// Initializes tracing for tests. Safe to call repeatedly; only the first
/// call installs the subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}
