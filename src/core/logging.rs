//! Subscriber setup for binaries and tests embedding partwire.
//!
//! The library only emits `tracing` events; installing a sink is left to
//! the embedding application. These helpers cover the common cases.

use tracing::Level;

/// Install a global fmt subscriber at `level`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(level: Level) -> bool {
    tracing_subscriber::fmt().with_max_level(level).try_init().is_ok()
}

/// Install a debug-level subscriber that writes through the test harness
/// capture. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}
