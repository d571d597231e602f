//! Main-thread tracking and assertions.
//!
//! Caldera's resource registries follow a single-writer discipline: all
//! structural mutation happens on the main thread, with a mutex covering only
//! the bookkeeping that background workers touch. This module supplies the
//! pieces that enforce the discipline:
//!
//! - [`set_main_thread`] / [`is_main_thread`]: process-wide main thread
//!   registration, called once at host startup.
//! - [`assert_main_thread!`](crate::assert_main_thread) and
//!   [`debug_assert_main_thread!`](crate::debug_assert_main_thread), used at
//!   the top of main-thread-only entry points.
//! - [`ThreadAffinity`]: records the thread a context object was created on
//!   so the object can be exercised in isolation (tests build their own
//!   context on a worker thread and "main" means that thread).
//!
//! ```
//! use caldera_core::thread_check::ThreadAffinity;
//!
//! struct Registry {
//!     affinity: ThreadAffinity,
//! }
//!
//! impl Registry {
//!     fn new() -> Self {
//!         Self { affinity: ThreadAffinity::current() }
//!     }
//!
//!     fn mutate(&self) {
//!         self.affinity.debug_assert_same_thread();
//!         // ... structural mutation ...
//!     }
//! }
//! ```

use std::sync::OnceLock;
use std::thread::ThreadId;

/// Global storage for the main thread ID.
static MAIN_THREAD_ID: OnceLock<ThreadId> = OnceLock::new();

/// Register the current thread as the process main thread.
///
/// Called by the host application once at startup, before any worker threads
/// exist. Calling it again from the same thread is a no-op.
///
/// # Panics
///
/// Panics if called a second time from a different thread.
pub fn set_main_thread() {
    let current = std::thread::current().id();
    if MAIN_THREAD_ID.set(current).is_err() && MAIN_THREAD_ID.get() != Some(&current) {
        panic!("set_main_thread() called from a second thread; the main thread is fixed for the process lifetime");
    }
    tracing::debug!(target: "caldera_core::thread_check", ?current, "main thread registered");
}

/// Get the main thread ID, if it has been registered.
#[inline]
pub fn main_thread_id() -> Option<ThreadId> {
    MAIN_THREAD_ID.get().copied()
}

/// Check if the current thread is the main thread.
///
/// Returns `true` when the main thread has not been registered yet, so early
/// initialization code runs unimpeded.
#[inline]
pub fn is_main_thread() -> bool {
    match MAIN_THREAD_ID.get() {
        Some(&main_id) => std::thread::current().id() == main_id,
        None => true,
    }
}

/// Panics if the current thread is not the main thread.
///
/// Active in all build profiles. Use
/// [`debug_assert_main_thread!`](crate::debug_assert_main_thread) for checks
/// that should compile out of release builds.
#[macro_export]
macro_rules! assert_main_thread {
    () => {
        $crate::assert_main_thread!("operation must be performed on the main thread")
    };
    ($msg:expr) => {
        if !$crate::thread_check::is_main_thread() {
            $crate::thread_check::panic_not_main_thread($msg, file!(), line!());
        }
    };
}

/// Debug-only assertion that the current thread is the main thread.
///
/// No-op in release builds; use liberally at main-thread-only entry points.
#[macro_export]
macro_rules! debug_assert_main_thread {
    () => {
        #[cfg(debug_assertions)]
        $crate::assert_main_thread!()
    };
    ($msg:expr) => {
        #[cfg(debug_assertions)]
        $crate::assert_main_thread!($msg)
    };
}

#[cold]
#[inline(never)]
#[doc(hidden)]
pub fn panic_not_main_thread(msg: &str, file: &str, line: u32) -> ! {
    let current = std::thread::current();
    let name = current.name().unwrap_or("<unnamed>");
    panic!(
        "thread safety violation at {file}:{line}: {msg}\n\
         current thread: \"{name}\" ({:?}); structural registry mutation is \
         main-thread-only. Queue the request (e.g. a deferred delete) instead \
         of mutating directly from a worker.",
        current.id(),
    )
}

/// Records the thread an object was created on.
///
/// Context objects that follow the single-writer discipline capture an
/// affinity at construction and assert it at the top of their mutating
/// operations. Unlike the process-wide [`is_main_thread`] check, an affinity
/// is local to the object, which keeps the discipline testable: a test can
/// build its context on any thread and that thread becomes the writer.
#[derive(Debug, Clone, Copy)]
pub struct ThreadAffinity {
    thread_id: ThreadId,
}

impl Default for ThreadAffinity {
    fn default() -> Self {
        Self::current()
    }
}

impl ThreadAffinity {
    /// Create an affinity bound to the current thread.
    #[inline]
    pub fn current() -> Self {
        Self {
            thread_id: std::thread::current().id(),
        }
    }

    /// The thread ID this affinity is bound to.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Check if the current thread matches this affinity.
    #[inline]
    pub fn is_same_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Assert that we are on the affinity's thread. Active in all builds.
    ///
    /// # Panics
    ///
    /// Panics if called from a different thread.
    #[inline]
    pub fn assert_same_thread(&self) {
        if !self.is_same_thread() {
            self.panic_wrong_thread();
        }
    }

    /// Debug-only form of [`assert_same_thread`](Self::assert_same_thread).
    #[inline]
    pub fn debug_assert_same_thread(&self) {
        #[cfg(debug_assertions)]
        self.assert_same_thread();
    }

    #[cold]
    #[inline(never)]
    fn panic_wrong_thread(&self) -> ! {
        let current = std::thread::current();
        panic!(
            "thread affinity violation: object bound to thread {:?} accessed from \"{}\" ({:?})",
            self.thread_id,
            current.name().unwrap_or("<unnamed>"),
            current.id(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    // set_main_thread() backs onto a OnceLock, so the process-global paths
    // are exercised once by whichever test runs first; the affinity tests
    // below do not depend on it.

    #[test]
    fn affinity_matches_creating_thread() {
        let affinity = ThreadAffinity::current();
        assert!(affinity.is_same_thread());
        affinity.assert_same_thread();
    }

    #[test]
    fn affinity_rejects_other_threads() {
        let affinity = ThreadAffinity::current();
        let saw_mismatch = Arc::new(AtomicBool::new(false));
        let flag = saw_mismatch.clone();

        std::thread::spawn(move || {
            flag.store(!affinity.is_same_thread(), Ordering::SeqCst);
        })
        .join()
        .unwrap();

        assert!(saw_mismatch.load(Ordering::SeqCst));
    }

    #[test]
    fn affinity_assert_panics_on_wrong_thread() {
        let affinity = ThreadAffinity::current();
        let result = std::thread::spawn(move || affinity.assert_same_thread()).join();
        assert!(result.is_err(), "expected affinity violation panic");
    }

    #[test]
    fn affinity_default_is_current_thread() {
        let affinity = ThreadAffinity::default();
        assert!(affinity.is_same_thread());
        assert_eq!(affinity.thread_id(), std::thread::current().id());
    }
}
