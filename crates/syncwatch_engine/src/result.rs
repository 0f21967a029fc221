//! Terminal outcome of a reconciliation session.

use crate::driver::DriverError;
use crate::error::{EngineError, EngineResult};
use crate::types::{Entry, Observation, ObservationStatus};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Final verdict of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The external system durably reports success.
    Success,
    /// The sync failed or could not be started.
    Failure,
    /// No confident verdict within the budget.
    Inconclusive,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Success => f.write_str("success"),
            Verdict::Failure => f.write_str("failure"),
            Verdict::Inconclusive => f.write_str("inconclusive"),
        }
    }
}

/// What caused a `Failure` verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureCause {
    /// The trigger action could not be invoked.
    #[serde(serialize_with = "display")]
    Trigger(DriverError),
    /// The external system reported failure.
    Reported(String),
    /// The profile given to the session was invalid.
    InvalidProfile(String),
}

fn display<S: serde::Serializer>(err: &DriverError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(err)
}

/// Result of reconciling one entry.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    /// The entry that was reconciled.
    pub entry: Entry,
    /// Final verdict.
    pub verdict: Verdict,
    /// Human-readable explanation.
    pub reason: String,
    /// Cause of a `Failure` verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<FailureCause>,
    /// Every observation taken, in order.
    pub observations: Vec<Observation>,
    /// Time from session start to verdict.
    #[serde(serialize_with = "millis")]
    pub elapsed: Duration,
}

fn millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

impl SyncResult {
    /// Returns true if the verdict is `Success`.
    pub fn is_success(&self) -> bool {
        self.verdict == Verdict::Success
    }

    /// Number of observations taken.
    pub fn observation_count(&self) -> u32 {
        self.observations.len() as u32
    }

    /// Statuses of all observations, in order.
    pub fn statuses(&self) -> Vec<ObservationStatus> {
        self.observations.iter().map(|o| o.status).collect()
    }

    /// Returns true if the trigger step failed.
    pub fn failed_at_trigger(&self) -> bool {
        matches!(self.cause, Some(FailureCause::Trigger(_)))
    }

    /// Converts a non-success verdict into an error.
    pub fn into_result(self) -> EngineResult<SyncResult> {
        match (self.verdict, self.cause.clone()) {
            (Verdict::Success, _) => Ok(self),
            (Verdict::Failure, Some(FailureCause::Trigger(e))) => Err(EngineError::Trigger(e)),
            (Verdict::Failure, Some(FailureCause::InvalidProfile(msg))) => {
                Err(EngineError::InvalidProfile(msg))
            }
            (Verdict::Failure, _) => Err(EngineError::SyncFailure(self.reason)),
            (Verdict::Inconclusive, _) => Err(EngineError::Inconclusive {
                attempts: self.observation_count(),
                reason: self.reason,
            }),
        }
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} after {} observation(s) in {:?} ({})",
            self.entry.label(),
            self.verdict,
            self.observations.len(),
            self.elapsed,
            self.reason
        )
    }
}
