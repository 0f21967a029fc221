//! Driver abstraction over the external system.

use crate::types::RawSignal;
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;

/// Result type for driver calls.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors a driver can report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The call did not complete within its timeout.
    #[error("driver timed out")]
    Timeout,

    /// The external system could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// A named action could not be performed.
    #[error("action '{action}' failed: {message}")]
    Action {
        /// Action name.
        action: String,
        /// Error message.
        message: String,
    },

    /// The snapshot could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl DriverError {
    /// Creates an action error.
    pub fn action(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Action {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error is likely to go away on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, DriverError::Timeout | DriverError::Unavailable(_))
    }
}

/// A driver performs actions against the external system and re-observes it.
///
/// This trait abstracts the automation layer, allowing for different
/// implementations (browser session, REST client, scripted for testing, etc.).
/// Methods take `&mut self` so a driver serves one session at a time.
pub trait SyncDriver {
    /// Asks the external system to begin or continue synchronizing.
    ///
    /// Errors only when the action itself cannot be invoked, not when the
    /// sync later fails.
    fn trigger(&mut self) -> DriverResult<()>;

    /// Fetches a fresh snapshot of external state.
    ///
    /// Must not serve cached state and should give up after `timeout`.
    fn observe(&mut self, timeout: Duration) -> DriverResult<RawSignal>;
}

impl<D: SyncDriver + ?Sized> SyncDriver for &mut D {
    fn trigger(&mut self) -> DriverResult<()> {
        (**self).trigger()
    }

    fn observe(&mut self, timeout: Duration) -> DriverResult<RawSignal> {
        (**self).observe(timeout)
    }
}

impl<D: SyncDriver + ?Sized> SyncDriver for Box<D> {
    fn trigger(&mut self) -> DriverResult<()> {
        (**self).trigger()
    }

    fn observe(&mut self, timeout: Duration) -> DriverResult<RawSignal> {
        (**self).observe(timeout)
    }
}

/// One scripted response to `observe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedStep {
    /// Return this snapshot.
    Signal(RawSignal),
    /// Fail with this error.
    Error(DriverError),
}

impl From<RawSignal> for ScriptedStep {
    fn from(signal: RawSignal) -> Self {
        ScriptedStep::Signal(signal)
    }
}

/// A driver that replays a fixed script, for tests and dry runs.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    steps: VecDeque<ScriptedStep>,
    fallback: Option<ScriptedStep>,
    trigger_error: Option<DriverError>,
    trigger_calls: u32,
    observe_calls: u32,
}

impl ScriptedDriver {
    /// Creates a driver that replays `steps` in order.
    pub fn new(steps: impl IntoIterator<Item = ScriptedStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Creates a driver from plain snapshots.
    pub fn from_signals(signals: impl IntoIterator<Item = RawSignal>) -> Self {
        Self::new(signals.into_iter().map(ScriptedStep::Signal))
    }

    /// Creates a driver that returns the same step forever.
    pub fn repeating(step: ScriptedStep) -> Self {
        Self::default().with_fallback(step)
    }

    /// Sets the step returned once the script runs out.
    pub fn with_fallback(mut self, step: ScriptedStep) -> Self {
        self.fallback = Some(step);
        self
    }

    /// Makes `trigger` fail with the given error.
    pub fn with_trigger_error(mut self, error: DriverError) -> Self {
        self.trigger_error = Some(error);
        self
    }

    /// Appends a step to the script.
    pub fn push(&mut self, step: impl Into<ScriptedStep>) {
        self.steps.push_back(step.into());
    }

    /// Number of times `trigger` was called.
    pub fn trigger_calls(&self) -> u32 {
        self.trigger_calls
    }

    /// Number of times `observe` was called.
    pub fn observe_calls(&self) -> u32 {
        self.observe_calls
    }

    /// Steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl SyncDriver for ScriptedDriver {
    fn trigger(&mut self) -> DriverResult<()> {
        self.trigger_calls += 1;
        match &self.trigger_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn observe(&mut self, _timeout: Duration) -> DriverResult<RawSignal> {
        self.observe_calls += 1;
        let step = self
            .steps
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| DriverError::Unavailable("script exhausted".into()))?;
        match step {
            ScriptedStep::Signal(signal) => Ok(signal),
            ScriptedStep::Error(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_driver_replays_in_order() {
        let mut driver = ScriptedDriver::new([
            ScriptedStep::Signal(RawSignal::text("Queued")),
            ScriptedStep::Error(DriverError::Timeout),
            ScriptedStep::Signal(RawSignal::success()),
        ]);

        let timeout = Duration::from_secs(1);
        assert_eq!(driver.observe(timeout).unwrap(), RawSignal::text("Queued"));
        assert_eq!(driver.observe(timeout), Err(DriverError::Timeout));
        assert_eq!(driver.observe(timeout).unwrap(), RawSignal::success());
        assert!(matches!(
            driver.observe(timeout),
            Err(DriverError::Unavailable(_))
        ));
        assert_eq!(driver.observe_calls(), 4);
    }

    #[test]
    fn scripted_driver_fallback() {
        let mut driver = ScriptedDriver::repeating(RawSignal::text("pending").into());
        for _ in 0..10 {
            assert_eq!(
                driver.observe(Duration::ZERO).unwrap(),
                RawSignal::text("pending")
            );
        }
        assert_eq!(driver.remaining(), 0);
    }

    #[test]
    fn scripted_driver_trigger_error() {
        let mut driver = ScriptedDriver::default()
            .with_trigger_error(DriverError::action("sync", "button not found"));
        let err = driver.trigger().unwrap_err();
        assert_eq!(err.to_string(), "action 'sync' failed: button not found");
        assert_eq!(driver.trigger_calls(), 1);
    }

    #[test]
    fn transient_errors() {
        assert!(DriverError::Timeout.is_transient());
        assert!(DriverError::Unavailable("reset".into()).is_transient());
        assert!(!DriverError::Decode("bad json".into()).is_transient());
        assert!(!DriverError::action("sync", "denied").is_transient());
    }
}
