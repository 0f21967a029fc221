//! Reconciliation session state machine.

use crate::config::ReconciliationProfile;
use crate::error::{EngineError, EngineResult};
use crate::result::Verdict;
use crate::types::{Entry, Observation, ObservationStatus};

/// The current state of a reconciliation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session created, nothing done yet.
    Idle,
    /// The remote sync was triggered.
    Triggered,
    /// Observing, no success streak in progress.
    Observing,
    /// At least one success seen, waiting for it to hold.
    Stabilizing,
    /// A verdict was reached.
    Terminal(Verdict),
}

impl SessionState {
    /// Returns true if observations can be recorded.
    pub fn is_observing(&self) -> bool {
        matches!(self, SessionState::Observing | SessionState::Stabilizing)
    }

    /// Returns true once a verdict exists.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Terminal(_))
    }
}

/// One run of the engine for one entry.
///
/// Observations are append-only and never exceed the profile's attempt
/// budget. The verdict is set once.
#[derive(Debug)]
pub struct ReconciliationSession {
    entry: Entry,
    profile: ReconciliationProfile,
    attempts: Vec<Observation>,
    state: SessionState,
    consecutive_successes: u32,
}

impl ReconciliationSession {
    /// Creates an idle session.
    pub fn new(entry: Entry, profile: ReconciliationProfile) -> Self {
        let capacity = profile.max_attempts.min(64) as usize;
        Self {
            entry,
            profile,
            attempts: Vec::with_capacity(capacity),
            state: SessionState::Idle,
            consecutive_successes: 0,
        }
    }

    /// Gets the entry.
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Gets the profile.
    pub fn profile(&self) -> &ReconciliationProfile {
        &self.profile
    }

    /// Gets the current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Observations recorded so far.
    pub fn attempts(&self) -> &[Observation] {
        &self.attempts
    }

    /// Length of the current success streak.
    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    /// Observations still allowed.
    pub fn remaining_attempts(&self) -> u32 {
        self.profile
            .max_attempts
            .saturating_sub(self.attempts.len() as u32)
    }

    /// The verdict, once reached.
    pub fn verdict(&self) -> Option<Verdict> {
        match self.state {
            SessionState::Terminal(verdict) => Some(verdict),
            _ => None,
        }
    }

    fn transition(&mut self, expected: &[SessionState], to: SessionState) -> EngineResult<()> {
        if !expected.contains(&self.state) {
            return Err(EngineError::InvalidStateTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", to),
            });
        }
        self.state = to;
        Ok(())
    }

    /// Idle → Triggered.
    pub fn mark_triggered(&mut self) -> EngineResult<()> {
        self.transition(&[SessionState::Idle], SessionState::Triggered)
    }

    /// Triggered → Observing.
    pub fn begin_observing(&mut self) -> EngineResult<()> {
        self.transition(&[SessionState::Triggered], SessionState::Observing)
    }

    /// Records an observation and returns the verdict if it ends the session.
    ///
    /// A failure ends the session at once. A success extends the streak and
    /// ends the session once the streak reaches the required length. Any
    /// other status breaks the streak. Using up the last attempt without a
    /// verdict yields `Inconclusive`.
    pub fn record(&mut self, observation: Observation) -> EngineResult<Option<Verdict>> {
        if !self.state.is_observing() {
            return Err(EngineError::InvalidStateTransition {
                from: format!("{:?}", self.state),
                to: "record observation".into(),
            });
        }
        if self.remaining_attempts() == 0 {
            return Err(EngineError::InvalidStateTransition {
                from: format!("{:?}", self.state),
                to: format!("observation {}", self.attempts.len() + 1),
            });
        }

        let status = observation.status;
        self.attempts.push(observation);

        match status {
            ObservationStatus::Failure => {
                self.consecutive_successes = 0;
                self.conclude(Verdict::Failure)?;
                return Ok(Some(Verdict::Failure));
            }
            ObservationStatus::Success => {
                self.consecutive_successes += 1;
                if self.consecutive_successes >= self.profile.required_stable_observations {
                    self.conclude(Verdict::Success)?;
                    return Ok(Some(Verdict::Success));
                }
                self.state = SessionState::Stabilizing;
            }
            ObservationStatus::Pending | ObservationStatus::Unknown => {
                self.consecutive_successes = 0;
                self.state = SessionState::Observing;
            }
        }

        if self.remaining_attempts() == 0 {
            self.conclude(Verdict::Inconclusive)?;
            return Ok(Some(Verdict::Inconclusive));
        }
        Ok(None)
    }

    /// Sets the verdict. Fails if one is already set.
    pub fn conclude(&mut self, verdict: Verdict) -> EngineResult<()> {
        if let SessionState::Terminal(current) = self.state {
            return Err(EngineError::InvalidStateTransition {
                from: format!("Terminal({:?})", current),
                to: format!("Terminal({:?})", verdict),
            });
        }
        self.state = SessionState::Terminal(verdict);
        Ok(())
    }

    /// Consumes the session, returning the entry and its observations.
    pub fn into_parts(self) -> (Entry, Vec<Observation>) {
        (self.entry, self.attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn obs(attempt: u32, status: ObservationStatus) -> Observation {
        Observation {
            attempt,
            status,
            raw: None,
            captured_at: Instant::now(),
            note: None,
        }
    }

    fn observing(profile: ReconciliationProfile) -> ReconciliationSession {
        let mut session = ReconciliationSession::new(Entry::existing("SJ-7"), profile);
        session.mark_triggered().unwrap();
        session.begin_observing().unwrap();
        session
    }

    fn profile(required: u32, max_attempts: u32) -> ReconciliationProfile {
        ReconciliationProfile::new(required, Duration::from_millis(100), max_attempts)
    }

    #[test]
    fn state_checks() {
        assert!(SessionState::Observing.is_observing());
        assert!(SessionState::Stabilizing.is_observing());
        assert!(!SessionState::Triggered.is_observing());
        assert!(SessionState::Terminal(Verdict::Failure).is_terminal());
        assert!(!SessionState::Idle.is_terminal());
    }

    #[test]
    fn cannot_record_before_observing() {
        let mut session = ReconciliationSession::new(Entry::created("SJ-1"), profile(1, 3));
        let err = session
            .record(obs(1, ObservationStatus::Success))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidStateTransition { .. }));

        assert!(session.begin_observing().is_err());
    }

    #[test]
    fn stabilizing_then_success() {
        let mut session = observing(profile(2, 5));

        assert_eq!(session.record(obs(1, ObservationStatus::Success)).unwrap(), None);
        assert_eq!(session.state(), SessionState::Stabilizing);
        assert_eq!(session.consecutive_successes(), 1);

        assert_eq!(
            session.record(obs(2, ObservationStatus::Success)).unwrap(),
            Some(Verdict::Success)
        );
        assert_eq!(session.verdict(), Some(Verdict::Success));
    }

    #[test]
    fn pending_resets_streak() {
        let mut session = observing(profile(2, 5));

        session.record(obs(1, ObservationStatus::Success)).unwrap();
        session.record(obs(2, ObservationStatus::Pending)).unwrap();
        assert_eq!(session.state(), SessionState::Observing);
        assert_eq!(session.consecutive_successes(), 0);

        assert_eq!(session.record(obs(3, ObservationStatus::Success)).unwrap(), None);
        assert_eq!(
            session.record(obs(4, ObservationStatus::Success)).unwrap(),
            Some(Verdict::Success)
        );
    }

    #[test]
    fn failure_is_immediate() {
        let mut session = observing(profile(2, 5));
        session.record(obs(1, ObservationStatus::Success)).unwrap();
        assert_eq!(
            session.record(obs(2, ObservationStatus::Failure)).unwrap(),
            Some(Verdict::Failure)
        );
        assert_eq!(session.remaining_attempts(), 3);
    }

    #[test]
    fn exhaustion_is_inconclusive() {
        let mut session = observing(profile(1, 3));
        assert_eq!(session.record(obs(1, ObservationStatus::Pending)).unwrap(), None);
        assert_eq!(session.record(obs(2, ObservationStatus::Unknown)).unwrap(), None);
        assert_eq!(
            session.record(obs(3, ObservationStatus::Pending)).unwrap(),
            Some(Verdict::Inconclusive)
        );
        assert_eq!(session.attempts().len(), 3);

        let err = session
            .record(obs(4, ObservationStatus::Success))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidStateTransition { .. }));
        assert_eq!(session.attempts().len(), 3);
    }

    #[test]
    fn verdict_is_set_once() {
        let mut session = observing(profile(1, 3));
        session.conclude(Verdict::Inconclusive).unwrap();
        assert!(session.conclude(Verdict::Success).is_err());
        assert_eq!(session.verdict(), Some(Verdict::Inconclusive));
    }

    #[test]
    fn trigger_failure_can_conclude_from_triggered() {
        let mut session = ReconciliationSession::new(Entry::created("SJ-3"), profile(1, 3));
        session.mark_triggered().unwrap();
        session.conclude(Verdict::Failure).unwrap();

        let (entry, attempts) = session.into_parts();
        assert_eq!(entry, Entry::created("SJ-3"));
        assert!(attempts.is_empty());
    }
}
