//! Error types for the icon registry.

use thiserror::Error;

use crate::handle::IconHandle;

/// Errors that can occur during icon registry operations.
///
/// The registry never panics across its API boundary for runtime conditions:
/// every fallible operation reports failure through its return value. Contract
/// violations (off-main-thread mutation, wrong payload kind) are debug
/// assertions instead of error values.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconError {
    /// No record exists for the handle. Callers treat this as "no icon
    /// available", not a fatal condition.
    #[error("icon {0} not found")]
    NotFound(IconHandle),

    /// A record is already installed under the handle. Only reachable from
    /// reserved-handle bootstrap code; double registration is a programmer
    /// error, not a recoverable runtime condition.
    #[error("icon {0} already registered")]
    AlreadyExists(IconHandle),

    /// No free handle exists. Surfaced to most callers as
    /// [`IconHandle::NONE`]; callers skip icon creation for the data-block.
    #[error("icon handle space exhausted")]
    Exhausted,
}

/// Result type for icon registry operations.
pub type IconResult<T> = Result<T, IconError>;
