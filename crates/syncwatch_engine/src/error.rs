//! Error types for the reconciliation engine.

use crate::driver::DriverError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while reconciling an entry.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The action that starts the remote sync could not be invoked.
    #[error("trigger failed: {0}")]
    Trigger(#[source] DriverError),

    /// A single read of external state failed.
    #[error("observation read failed: {0}")]
    ObservationRead(#[source] DriverError),

    /// The external system reported a failure.
    #[error("sync failed: {0}")]
    SyncFailure(String),

    /// The budget ran out before a verdict was reached.
    #[error("inconclusive after {attempts} observations: {reason}")]
    Inconclusive {
        /// Observations taken.
        attempts: u32,
        /// Why the session stopped.
        reason: String,
    },

    /// A reconciliation profile violates its constraints.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// Invalid state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl EngineError {
    /// Returns true if this error ends a session outright.
    ///
    /// Only a failed trigger and a reported sync failure are fatal; every
    /// other anomaly is absorbed by the polling loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Trigger(_) | EngineError::SyncFailure(_))
    }
}
