//! Core systems for Caldera.
//!
//! This crate provides the foundational pieces shared by Caldera's resource
//! subsystems:
//!
//! - **Thread checking**: main-thread registration, assertion macros, and
//!   per-object [`ThreadAffinity`] for the single-writer discipline the
//!   registries follow
//! - **Headless mode**: the process-wide background flag consulted before
//!   materializing display resources
//! - **Logging**: `tracing` target conventions for filtering
//!
//! # Example
//!
//! ```
//! use caldera_core::thread_check::ThreadAffinity;
//!
//! // A context object created here is "owned" by this thread; its mutating
//! // operations assert the same thread in debug builds.
//! let affinity = ThreadAffinity::current();
//! assert!(affinity.is_same_thread());
//! ```

pub mod headless;
pub mod logging;
pub mod thread_check;

pub use headless::{is_headless, set_headless};
pub use thread_check::{is_main_thread, main_thread_id, set_main_thread, ThreadAffinity};
