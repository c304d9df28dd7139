//! Gate error types

use crate::profile::ProfileError;
use thiserror::Error;

/// Errors surfaced by the gate controller and runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// The caller asked the virtual clock to move backwards
    #[error("Clock regression: now is {now_ms}ms, requested {requested_ms}ms")]
    ClockRegression { now_ms: u64, requested_ms: u64 },

    /// The timing table failed validation
    #[error("Invalid timing profile: {0}")]
    Profile(#[from] ProfileError),

    /// The runtime owning the controller has been dropped
    #[error("Gate runtime is no longer running")]
    RuntimeGone,
}

/// Result type for gate operations
pub type Result<T> = std::result::Result<T, GateError>;
