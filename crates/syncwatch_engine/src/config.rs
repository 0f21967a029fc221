//! Configuration for the reconciliation engine.

use crate::error::{EngineError, EngineResult};
use crate::reader::StatusVocabulary;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How many observations a session may take and what counts as stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationProfile {
    /// Consecutive `Success` observations needed to conclude success.
    pub required_stable_observations: u32,
    /// Wait before each observation.
    #[serde(rename = "refreshIntervalMs", with = "duration_ms")]
    pub refresh_interval: Duration,
    /// Maximum number of observations.
    pub max_attempts: u32,
}

impl ReconciliationProfile {
    /// Creates a new profile.
    pub fn new(
        required_stable_observations: u32,
        refresh_interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            required_stable_observations,
            refresh_interval,
            max_attempts,
        }
    }

    /// Profile for entries synced for the first time.
    pub fn first_sync() -> Self {
        Self::new(1, Duration::from_secs(2), 10)
    }

    /// Profile for entries that existed before this run.
    ///
    /// The first observation after a re-sync regresses to pending once, so
    /// two consecutive successes are required.
    pub fn resync() -> Self {
        Self::new(2, Duration::from_secs(2), 10)
    }

    /// Sets the number of consecutive successes required.
    pub fn with_required_stable_observations(mut self, count: u32) -> Self {
        self.required_stable_observations = count;
        self
    }

    /// Sets the refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Sets the maximum number of observations.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Checks the profile constraints.
    pub fn validate(&self) -> EngineResult<()> {
        if self.required_stable_observations == 0 {
            return Err(EngineError::InvalidProfile(
                "requiredStableObservations must be at least 1".into(),
            ));
        }
        if self.refresh_interval.is_zero() {
            return Err(EngineError::InvalidProfile(
                "refreshIntervalMs must be greater than 0".into(),
            ));
        }
        if self.max_attempts < self.required_stable_observations {
            return Err(EngineError::InvalidProfile(format!(
                "maxAttempts ({}) must be at least requiredStableObservations ({})",
                self.max_attempts, self.required_stable_observations
            )));
        }
        Ok(())
    }

    /// Longest time the observation loop can spend waiting.
    pub fn observation_budget(&self) -> Duration {
        self.refresh_interval.saturating_mul(self.max_attempts)
    }
}

/// Configuration for the engine as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Wait after triggering, before the observation loop starts.
    #[serde(rename = "settleDelayMs", with = "duration_ms")]
    pub settle_delay: Duration,
    /// Timeout handed to the driver for every read.
    #[serde(rename = "readTimeoutMs", with = "duration_ms")]
    pub read_timeout: Duration,
    /// Wall-clock ceiling for one session, measured from the trigger.
    #[serde(rename = "deadlineMs", with = "option_duration_ms")]
    pub deadline: Option<Duration>,
    /// Profile for entries synced for the first time.
    pub new_entry: ReconciliationProfile,
    /// Profile for entries that existed before this run.
    pub existing_entry: ReconciliationProfile,
    /// Words used to classify status text.
    pub status_vocabulary: StatusVocabulary,
}

impl EngineConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self {
            settle_delay: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            deadline: Some(Duration::from_secs(60)),
            new_entry: ReconciliationProfile::first_sync(),
            existing_entry: ReconciliationProfile::resync(),
            status_vocabulary: StatusVocabulary::default(),
        }
    }

    /// Sets the settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the per-read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the session deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Removes the session deadline; only the attempt budget applies.
    pub fn without_deadline(mut self) -> Self {
        self.deadline = None;
        self
    }

    /// Sets the profile for new entries.
    pub fn with_new_entry_profile(mut self, profile: ReconciliationProfile) -> Self {
        self.new_entry = profile;
        self
    }

    /// Sets the profile for existing entries.
    pub fn with_existing_entry_profile(mut self, profile: ReconciliationProfile) -> Self {
        self.existing_entry = profile;
        self
    }

    /// Sets the status vocabulary.
    pub fn with_status_vocabulary(mut self, vocabulary: StatusVocabulary) -> Self {
        self.status_vocabulary = vocabulary;
        self
    }

    /// Checks every constraint.
    pub fn validate(&self) -> EngineResult<()> {
        self.new_entry.validate()?;
        self.existing_entry.validate()?;
        if self.read_timeout.is_zero() {
            return Err(EngineError::Config("readTimeoutMs must be greater than 0".into()));
        }
        if self.deadline.is_some_and(|d| d.is_zero()) {
            return Err(EngineError::Config("deadlineMs must be greater than 0".into()));
        }
        self.check_fits_deadline(&self.new_entry)?;
        self.check_fits_deadline(&self.existing_entry)?;
        Ok(())
    }

    /// Checks that a profile's full attempt budget fits inside the deadline.
    ///
    /// Settle delay plus `max_attempts` refreshes must not exceed the
    /// deadline, otherwise the deadline would cut the budget short.
    pub fn check_fits_deadline(&self, profile: &ReconciliationProfile) -> EngineResult<()> {
        let Some(deadline) = self.deadline else {
            return Ok(());
        };
        let needed = self
            .settle_delay
            .saturating_add(profile.observation_budget());
        if needed > deadline {
            return Err(EngineError::InvalidProfile(format!(
                "settle delay plus {} refreshes of {:?} needs {:?}, longer than the {:?} deadline",
                profile.max_attempts, profile.refresh_interval, needed, deadline
            )));
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: &Path) -> EngineResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
