//! Branch classifier: picks the reconciliation profile for an entry.

use crate::config::{EngineConfig, ReconciliationProfile};
use crate::types::{Entry, Lifecycle};
use tracing::debug;

/// Chooses between the first-sync and re-sync profiles.
#[derive(Debug, Clone)]
pub struct BranchClassifier {
    new_entry: ReconciliationProfile,
    existing_entry: ReconciliationProfile,
}

impl BranchClassifier {
    /// Creates a classifier from two profiles.
    pub fn new(new_entry: ReconciliationProfile, existing_entry: ReconciliationProfile) -> Self {
        Self {
            new_entry,
            existing_entry,
        }
    }

    /// Creates a classifier from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.new_entry.clone(), config.existing_entry.clone())
    }

    /// Returns the profile for a lifecycle.
    pub fn profile_for(&self, lifecycle: Lifecycle) -> &ReconciliationProfile {
        match lifecycle {
            Lifecycle::New => &self.new_entry,
            Lifecycle::Existing => &self.existing_entry,
        }
    }

    /// Returns the profile that applies to `entry`.
    pub fn classify(&self, entry: &Entry) -> ReconciliationProfile {
        let profile = self.profile_for(entry.lifecycle()).clone();
        debug!(
            entry = %entry.label(),
            required = profile.required_stable_observations,
            max_attempts = profile.max_attempts,
            "classified entry"
        );
        profile
    }
}

impl Default for BranchClassifier {
    fn default() -> Self {
        Self::new(
            ReconciliationProfile::first_sync(),
            ReconciliationProfile::resync(),
        )
    }
}
