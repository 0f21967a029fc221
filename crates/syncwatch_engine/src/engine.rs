//! Reconciliation engine: trigger, wait, observe, decide.

use crate::classifier::BranchClassifier;
use crate::clock::{Clock, SystemClock};
use crate::config::{EngineConfig, ReconciliationProfile};
use crate::driver::SyncDriver;
use crate::error::EngineResult;
use crate::reader::ObservationReader;
use crate::result::{FailureCause, SyncResult, Verdict};
use crate::session::ReconciliationSession;
use crate::types::{Entry, Observation};
use parking_lot::RwLock;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Statistics across all sessions run by an engine.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Sessions started.
    pub sessions_started: u64,
    /// Sessions that ended in `Success`.
    pub successes: u64,
    /// Sessions that ended in `Failure`.
    pub failures: u64,
    /// Sessions that ended in `Inconclusive`.
    pub inconclusive: u64,
    /// Observations taken.
    pub observations: u64,
    /// Observations whose read failed or overran the read timeout.
    pub read_errors: u64,
    /// Reason of the most recent verdict.
    pub last_reason: Option<String>,
}

/// Internal outcome of a run, before it is packaged into a `SyncResult`.
struct Conclusion {
    verdict: Verdict,
    reason: String,
    cause: Option<FailureCause>,
}

impl Conclusion {
    fn new(verdict: Verdict, reason: String) -> Self {
        Self {
            verdict,
            reason,
            cause: None,
        }
    }

    fn failure(reason: String, cause: FailureCause) -> Self {
        Self {
            verdict: Verdict::Failure,
            reason,
            cause: Some(cause),
        }
    }
}

/// The reconciliation engine confirms the outcome of an external sync.
///
/// The engine holds no per-session state: every call to `reconcile` builds
/// its own session, triggers its own sync and observes independently.
pub struct ReconciliationEngine<K: Clock = SystemClock> {
    config: EngineConfig,
    classifier: BranchClassifier,
    reader: ObservationReader,
    clock: K,
    stats: RwLock<EngineStats>,
}

impl ReconciliationEngine<SystemClock> {
    /// Creates an engine that waits in real time.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<K: Clock> ReconciliationEngine<K> {
    /// Creates an engine with a custom clock.
    pub fn with_clock(config: EngineConfig, clock: K) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            classifier: BranchClassifier::from_config(&config),
            reader: ObservationReader::new(config.status_vocabulary.clone(), config.read_timeout),
            config,
            clock,
            stats: RwLock::new(EngineStats::default()),
        })
    }

    /// Gets the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Gets the classifier.
    pub fn classifier(&self) -> &BranchClassifier {
        &self.classifier
    }

    /// Gets the observation reader.
    pub fn reader(&self) -> &ObservationReader {
        &self.reader
    }

    /// Gets the clock.
    pub fn clock(&self) -> &K {
        &self.clock
    }

    /// Gets the current stats.
    pub fn stats(&self) -> EngineStats {
        self.stats.read().clone()
    }

    /// Reconciles an entry using the profile its lifecycle selects.
    pub fn reconcile<D>(&self, entry: &Entry, driver: &mut D) -> SyncResult
    where
        D: SyncDriver + ?Sized,
    {
        let profile = self.classifier.classify(entry);
        self.reconcile_with_profile(entry, profile, driver)
    }

    /// Reconciles an entry with an explicit profile.
    ///
    /// Never fails: every problem ends up in the verdict and reason.
    pub fn reconcile_with_profile<D>(
        &self,
        entry: &Entry,
        profile: ReconciliationProfile,
        driver: &mut D,
    ) -> SyncResult
    where
        D: SyncDriver + ?Sized,
    {
        let start = self.clock.now();
        self.stats.write().sessions_started += 1;
        info!(
            entry = %entry.label(),
            required = profile.required_stable_observations,
            max_attempts = profile.max_attempts,
            "starting reconciliation"
        );

        let mut session = ReconciliationSession::new(entry.clone(), profile);

        let fits = session
            .profile()
            .validate()
            .and_then(|()| self.config.check_fits_deadline(session.profile()));
        let conclusion = match fits {
            Err(e) => {
                let reason = e.to_string();
                let _ = session.conclude(Verdict::Failure);
                Conclusion::failure(reason.clone(), FailureCause::InvalidProfile(reason))
            }
            Ok(()) => match self.run(&mut session, driver, start) {
                Ok(conclusion) => conclusion,
                Err(e) => {
                    warn!(entry = %entry.label(), error = %e, "session aborted");
                    let _ = session.conclude(Verdict::Inconclusive);
                    Conclusion::new(Verdict::Inconclusive, format!("session aborted: {}", e))
                }
            },
        };

        self.finish(session, conclusion, start)
    }

    /// Reconciles several entries, one isolated session each, in order.
    pub fn reconcile_batch<D, I>(&self, items: I) -> Vec<SyncResult>
    where
        D: SyncDriver,
        I: IntoIterator<Item = (Entry, D)>,
    {
        items
            .into_iter()
            .map(|(entry, mut driver)| self.reconcile(&entry, &mut driver))
            .collect()
    }

    fn run<D>(
        &self,
        session: &mut ReconciliationSession,
        driver: &mut D,
        start: Instant,
    ) -> EngineResult<Conclusion>
    where
        D: SyncDriver + ?Sized,
    {
        if let Err(e) = driver.trigger() {
            warn!(entry = %session.entry().label(), error = %e, "trigger failed");
            session.conclude(Verdict::Failure)?;
            return Ok(Conclusion::failure(
                format!("could not trigger sync: {}", e),
                FailureCause::Trigger(e),
            ));
        }
        session.mark_triggered()?;

        self.clock.sleep(self.config.settle_delay);
        session.begin_observing()?;

        let interval = session.profile().refresh_interval;
        let mut read_errors = 0u32;

        loop {
            if let Some(deadline) = self.config.deadline {
                let elapsed = self.clock.now().saturating_duration_since(start);
                if elapsed + interval > deadline {
                    let taken = session.attempts().len();
                    session.conclude(Verdict::Inconclusive)?;
                    return Ok(Conclusion::new(
                        Verdict::Inconclusive,
                        format!(
                            "deadline of {:?} reached after {} observation(s){}",
                            deadline,
                            taken,
                            read_error_suffix(read_errors)
                        ),
                    ));
                }
            }

            self.clock.sleep(interval);

            let attempt = session.attempts().len() as u32 + 1;
            let observation = self.reader.read(driver, &self.clock, attempt);
            debug!(
                entry = %session.entry().label(),
                attempt,
                status = %observation.status,
                streak = session.consecutive_successes(),
                "observed"
            );
            let read_failed = observation.note.is_some();
            {
                let mut stats = self.stats.write();
                stats.observations += 1;
                if read_failed {
                    stats.read_errors += 1;
                }
            }
            if read_failed {
                read_errors += 1;
            }

            let detail = failure_detail(&observation);
            let last_status = observation.status;

            match session.record(observation)? {
                None => continue,
                Some(Verdict::Success) => {
                    return Ok(Conclusion::new(
                        Verdict::Success,
                        format!(
                            "{} consecutive success observation(s) by attempt {}",
                            session.profile().required_stable_observations,
                            attempt
                        ),
                    ));
                }
                Some(Verdict::Failure) => {
                    return Ok(Conclusion::failure(
                        format!(
                            "external system reported failure on observation {}: {}",
                            attempt, detail
                        ),
                        FailureCause::Reported(detail),
                    ));
                }
                Some(Verdict::Inconclusive) => {
                    return Ok(Conclusion::new(
                        Verdict::Inconclusive,
                        format!(
                            "no stable verdict after {} observation(s), last status {}{}",
                            attempt,
                            last_status,
                            read_error_suffix(read_errors)
                        ),
                    ));
                }
            }
        }
    }

    fn finish(
        &self,
        session: ReconciliationSession,
        conclusion: Conclusion,
        start: Instant,
    ) -> SyncResult {
        let elapsed = self.clock.now().saturating_duration_since(start);
        let (entry, observations) = session.into_parts();

        {
            let mut stats = self.stats.write();
            match conclusion.verdict {
                Verdict::Success => stats.successes += 1,
                Verdict::Failure => stats.failures += 1,
                Verdict::Inconclusive => stats.inconclusive += 1,
            }
            stats.last_reason = Some(conclusion.reason.clone());
        }

        info!(
            entry = %entry.label(),
            verdict = %conclusion.verdict,
            observations = observations.len(),
            ?elapsed,
            reason = %conclusion.reason,
            "reconciliation finished"
        );

        SyncResult {
            entry,
            verdict: conclusion.verdict,
            reason: conclusion.reason,
            cause: conclusion.cause,
            observations,
            elapsed,
        }
    }
}

fn failure_detail(observation: &Observation) -> String {
    observation
        .raw
        .as_ref()
        .and_then(|raw| raw.detail.clone().or_else(|| raw.status_text.clone()))
        .unwrap_or_else(|| "failure indicator shown".into())
}

fn read_error_suffix(read_errors: u32) -> String {
    if read_errors == 0 {
        String::new()
    } else {
        format!(" ({} read error(s) absorbed)", read_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::driver::{DriverError, ScriptedDriver, ScriptedStep};
    use crate::types::{ObservationStatus, RawSignal};
    use std::time::Duration;

    fn engine(config: EngineConfig) -> ReconciliationEngine<ManualClock> {
        ReconciliationEngine::with_clock(config, ManualClock::new()).unwrap()
    }

    fn quick_config() -> EngineConfig {
        EngineConfig::new()
            .with_settle_delay(Duration::from_millis(500))
            .with_new_entry_profile(ReconciliationProfile::new(1, Duration::from_secs(1), 5))
            .with_existing_entry_profile(ReconciliationProfile::new(2, Duration::from_secs(1), 5))
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig::new().with_new_entry_profile(ReconciliationProfile::new(
            0,
            Duration::from_secs(1),
            3,
        ));
        assert!(ReconciliationEngine::with_clock(config, ManualClock::new()).is_err());
    }

    #[test]
    fn waits_settle_then_interval() {
        let engine = engine(quick_config());
        let mut driver = ScriptedDriver::from_signals([RawSignal::text("queued"), RawSignal::success()]);

        let result = engine.reconcile(&Entry::created("SJ-1"), &mut driver);

        assert!(result.is_success());
        assert_eq!(
            engine.clock().sleeps(),
            vec![
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(1)
            ]
        );
        assert_eq!(result.elapsed, Duration::from_millis(2500));
    }

    #[test]
    fn invalid_profile_is_a_failure_verdict() {
        let engine = engine(quick_config());
        let mut driver = ScriptedDriver::repeating(RawSignal::success().into());

        let result = engine.reconcile_with_profile(
            &Entry::created("SJ-2"),
            ReconciliationProfile::new(3, Duration::from_secs(1), 2),
            &mut driver,
        );

        assert_eq!(result.verdict, Verdict::Failure);
        assert!(matches!(result.cause, Some(FailureCause::InvalidProfile(_))));
        assert_eq!(driver.trigger_calls(), 0);
        assert_eq!(driver.observe_calls(), 0);
    }

    #[test]
    fn reported_failure_carries_detail() {
        let engine = engine(quick_config());
        let mut driver = ScriptedDriver::from_signals([
            RawSignal::text("syncing"),
            RawSignal::failure("account 4000 is archived"),
        ]);

        let result = engine.reconcile(&Entry::created("SJ-3"), &mut driver);

        assert_eq!(result.verdict, Verdict::Failure);
        assert_eq!(
            result.cause,
            Some(FailureCause::Reported("account 4000 is archived".into()))
        );
        assert!(result.reason.contains("observation 2"));
    }

    /// Driver whose every read takes `delay` of virtual time.
    struct SlowDriver<'a> {
        clock: &'a ManualClock,
        delay: Duration,
        signal: RawSignal,
    }

    impl SyncDriver for SlowDriver<'_> {
        fn trigger(&mut self) -> crate::driver::DriverResult<()> {
            Ok(())
        }

        fn observe(&mut self, _timeout: Duration) -> crate::driver::DriverResult<RawSignal> {
            self.clock.advance(self.delay);
            Ok(self.signal.clone())
        }
    }

    #[test]
    fn deadline_stops_early() {
        let clock = ManualClock::new();
        let config = quick_config().with_deadline(Duration::from_secs(10));
        let engine = ReconciliationEngine::with_clock(config, &clock).unwrap();
        let mut driver = SlowDriver {
            clock: &clock,
            delay: Duration::from_secs(3),
            signal: RawSignal::text("pending"),
        };

        let result = engine.reconcile(&Entry::created("SJ-4"), &mut driver);

        assert_eq!(result.verdict, Verdict::Inconclusive);
        assert_eq!(result.observation_count(), 3);
        assert!(result.reason.contains("deadline"));
    }

    #[test]
    fn profile_longer_than_deadline_is_rejected_per_session() {
        let engine = engine(quick_config().with_deadline(Duration::from_secs(10)));
        let mut driver = ScriptedDriver::repeating(RawSignal::text("pending").into());

        let result = engine.reconcile_with_profile(
            &Entry::created("SJ-4b"),
            ReconciliationProfile::new(1, Duration::from_secs(2), 8),
            &mut driver,
        );

        assert_eq!(result.verdict, Verdict::Failure);
        assert!(matches!(result.cause, Some(FailureCause::InvalidProfile(_))));
        assert!(result.reason.contains("deadline"));
        assert_eq!(driver.trigger_calls(), 0);
    }

    #[test]
    fn slow_failure_read_still_fails() {
        let clock = ManualClock::new();
        let config = quick_config().with_read_timeout(Duration::from_secs(1));
        let engine = ReconciliationEngine::with_clock(config, &clock).unwrap();
        let mut driver = SlowDriver {
            clock: &clock,
            delay: Duration::from_secs(2),
            signal: RawSignal::failure("contact is archived"),
        };

        let result = engine.reconcile(&Entry::created("SJ-4c"), &mut driver);

        assert_eq!(result.verdict, Verdict::Failure);
        assert_eq!(
            result.cause,
            Some(FailureCause::Reported("contact is archived".into()))
        );
        assert_eq!(result.observation_count(), 1);
    }

    #[test]
    fn overlong_reads_count_as_read_errors() {
        let clock = ManualClock::new();
        let config = quick_config()
            .with_read_timeout(Duration::from_secs(1))
            .with_new_entry_profile(ReconciliationProfile::new(1, Duration::from_secs(1), 3));
        let engine = ReconciliationEngine::with_clock(config, &clock).unwrap();
        let mut driver = SlowDriver {
            clock: &clock,
            delay: Duration::from_secs(2),
            signal: RawSignal::success(),
        };

        let result = engine.reconcile(&Entry::created("SJ-4d"), &mut driver);

        assert_eq!(result.verdict, Verdict::Inconclusive);
        assert!(result.observations.iter().all(|o| o.raw.is_some()));
        assert!(result.reason.contains("3 read error(s)"));
        assert_eq!(engine.stats().read_errors, 3);
    }

    #[test]
    fn read_errors_are_reported_in_reason() {
        let config = quick_config()
            .with_new_entry_profile(ReconciliationProfile::new(1, Duration::from_secs(1), 3));
        let engine = engine(config);
        let mut driver = ScriptedDriver::new([
            ScriptedStep::Error(DriverError::Timeout),
            ScriptedStep::Signal(RawSignal::text("pending")),
            ScriptedStep::Error(DriverError::Unavailable("502".into())),
        ]);

        let result = engine.reconcile(&Entry::created("SJ-5"), &mut driver);

        assert_eq!(result.verdict, Verdict::Inconclusive);
        assert_eq!(
            result.statuses(),
            vec![
                ObservationStatus::Unknown,
                ObservationStatus::Pending,
                ObservationStatus::Unknown
            ]
        );
        assert!(result.reason.contains("2 read error(s)"));
        assert_eq!(engine.stats().read_errors, 2);
    }

    #[test]
    fn stats_accumulate() {
        let engine = engine(quick_config());

        let mut ok = ScriptedDriver::from_signals([RawSignal::success()]);
        engine.reconcile(&Entry::created("A"), &mut ok);

        let mut broken = ScriptedDriver::default().with_trigger_error(DriverError::Timeout);
        engine.reconcile(&Entry::created("B"), &mut broken);

        let stats = engine.stats();
        assert_eq!(stats.sessions_started, 2);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.observations, 1);
        assert!(stats.last_reason.unwrap().contains("could not trigger"));
    }

    #[test]
    fn batch_runs_isolated_sessions() {
        let engine = engine(quick_config());
        let results = engine.reconcile_batch(vec![
            (
                Entry::created("A"),
                ScriptedDriver::from_signals([RawSignal::success()]),
            ),
            (
                Entry::existing("B"),
                ScriptedDriver::from_signals([RawSignal::success(), RawSignal::success()]),
            ),
            (
                Entry::existing("C"),
                ScriptedDriver::from_signals([RawSignal::failure("locked period")]),
            ),
        ]);

        let verdicts: Vec<_> = results.iter().map(|r| r.verdict).collect();
        assert_eq!(
            verdicts,
            vec![Verdict::Success, Verdict::Success, Verdict::Failure]
        );
        assert_eq!(results[1].observation_count(), 2);
    }
}
