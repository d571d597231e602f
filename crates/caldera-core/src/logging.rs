//! Logging conventions for Caldera.
//!
//! Caldera instruments its subsystems with the `tracing` crate. To see logs,
//! install a subscriber in the host application:
//!
//! ```ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! Each subsystem logs under a `caldera_<crate>::<module>` target; the
//! constants in [`targets`] can be used in filter directives, e.g.
//! `RUST_LOG=caldera_icons::registry=trace`.

/// Target names for log filtering.
pub mod targets {
    /// Thread tracking and affinity checks.
    pub const THREAD_CHECK: &str = "caldera_core::thread_check";
    /// Headless mode flag changes.
    pub const HEADLESS: &str = "caldera_core::headless";
    /// Icon registry bookkeeping (allocation, deletion, deferred drains).
    pub const ICON_REGISTRY: &str = "caldera_icons::registry";
    /// Preview image invalidation.
    pub const PREVIEW: &str = "caldera_icons::preview";
}
