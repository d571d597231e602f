//! Icon handle type.

use std::fmt;

/// A small integer identifying one icon/preview resource.
///
/// Handle `0` is the sentinel "no icon"; live handles are positive. Built-in
/// (reserved) icons occupy `[1, first_dynamic)` and are installed at startup
/// via [`IconRegistry::set`](crate::IconRegistry::set); everything from
/// `first_dynamic` upward is allocated dynamically.
///
/// Handles are process-local and never persisted: owner records reacquire a
/// fresh handle after deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IconHandle(u32);

impl IconHandle {
    /// The "no icon" sentinel.
    pub const NONE: IconHandle = IconHandle(0);

    /// Wrap a raw handle value. `0` yields [`IconHandle::NONE`].
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        IconHandle(raw)
    }

    /// The raw integer value, `0` for [`IconHandle::NONE`].
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// True for the "no icon" sentinel.
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// True for a live (non-sentinel) handle.
    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }
}

impl Default for IconHandle {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for IconHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "#none")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}
