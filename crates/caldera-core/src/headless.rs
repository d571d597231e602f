//! Process-wide headless (background) mode flag.
//!
//! When the host runs without a display (command-line batch renders, test
//! harnesses, headless export), no display resources should be materialized.
//! Subsystems that build such resources (icon previews, draw caches) consult
//! this flag and short-circuit to a no-op.
//!
//! The host sets the flag once during startup, before subsystems that read it
//! are constructed. Registries sample it at construction time so that tests
//! can override it per-instance instead of racing on the global.

use std::sync::atomic::{AtomicBool, Ordering};

static HEADLESS: AtomicBool = AtomicBool::new(false);

/// Mark the process as running with or without a display.
pub fn set_headless(headless: bool) {
    HEADLESS.store(headless, Ordering::SeqCst);
    tracing::debug!(target: "caldera_core::headless", headless, "headless mode updated");
}

/// Check whether the process is running in headless (background) mode.
#[inline]
pub fn is_headless() -> bool {
    HEADLESS.load(Ordering::Relaxed)
}
