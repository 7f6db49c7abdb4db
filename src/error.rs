//! Error types shared by every layer of the crate.
//!
//! Two kinds of failure exist:
//! - recoverable runtime conditions (allocation failure, bad configuration),
//!   reported as [`DrError`];
//! - usage-contract violations (double init, mismatched deallocation, local
//!   access to memory the caller does not own), which are programming errors
//!   and panic through [`usage_violation!`](crate::usage_violation).

use crate::alloc::AllocError;

/// The error type for fallible distributed operations.
#[derive(Debug)]
pub enum DrError {
    /// Host or accelerator memory could not be allocated.
    Alloc(AllocError),
    /// A configuration value could not be parsed or is out of range.
    Config(String),
    /// The accelerator queue could not be created.
    Accelerator(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, DrError>;

impl core::fmt::Display for DrError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DrError::Alloc(err) => write!(f, "allocation failed: {err}"),
            DrError::Config(msg) => write!(f, "invalid configuration: {msg}"),
            DrError::Accelerator(msg) => write!(f, "accelerator unavailable: {msg}"),
        }
    }
}

impl std::error::Error for DrError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DrError::Alloc(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AllocError> for DrError {
    fn from(err: AllocError) -> Self {
        DrError::Alloc(err)
    }
}

impl From<serde_json::Error> for DrError {
    fn from(err: serde_json::Error) -> Self {
        DrError::Config(err.to_string())
    }
}

/// Reports a usage-contract violation and panics.
///
/// Violations are programming errors, not runtime conditions: they are logged
/// at `error` level and never returned as `Err`.
#[macro_export]
macro_rules! usage_violation {
    ($($arg:tt)+) => {{
        let message = format!($($arg)+);
        $crate::__tracing::error!(%message, "usage violation");
        panic!("usage violation: {}", message)
    }};
}
