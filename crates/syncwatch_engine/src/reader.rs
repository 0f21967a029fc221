//! Observation reader: turns raw driver snapshots into statuses.

use crate::clock::Clock;
use crate::driver::SyncDriver;
use crate::error::EngineError;
use crate::types::{Observation, ObservationStatus, RawSignal};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Words recognized in a snapshot's status text.
///
/// Matching is case-insensitive and looks for the word anywhere in the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusVocabulary {
    /// Words meaning the sync finished.
    pub success: Vec<String>,
    /// Words meaning the sync is still running.
    pub pending: Vec<String>,
    /// Words meaning the sync failed.
    pub failure: Vec<String>,
}

impl StatusVocabulary {
    fn matches(words: &[String], text: &str) -> bool {
        words.iter().any(|w| text.contains(&w.to_lowercase()))
    }

    /// Maps status text to a status.
    ///
    /// Failure words win over success words, which win over pending words,
    /// so "sync failed after success" never reads as a success.
    pub fn classify_text(&self, text: &str) -> ObservationStatus {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return ObservationStatus::Unknown;
        }
        if Self::matches(&self.failure, &text) {
            ObservationStatus::Failure
        } else if Self::matches(&self.success, &text) {
            ObservationStatus::Success
        } else if Self::matches(&self.pending, &text) {
            ObservationStatus::Pending
        } else {
            ObservationStatus::Unknown
        }
    }
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|w| w.to_string()).collect();
        Self {
            success: words(&["synced", "success", "exported", "completed"]),
            pending: words(&["pending", "queued", "syncing", "in progress", "processing"]),
            failure: words(&["failed", "failure", "error", "rejected"]),
        }
    }
}

/// Reads the external state through a driver.
#[derive(Debug, Clone)]
pub struct ObservationReader {
    vocabulary: StatusVocabulary,
    read_timeout: Duration,
}

impl ObservationReader {
    /// Creates a reader.
    pub fn new(vocabulary: StatusVocabulary, read_timeout: Duration) -> Self {
        Self {
            vocabulary,
            read_timeout,
        }
    }

    /// Returns the per-read timeout.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Maps a raw snapshot to a status.
    ///
    /// Explicit markers take precedence over status text, and a failure
    /// marker over a success marker.
    pub fn classify_signal(&self, raw: &RawSignal) -> ObservationStatus {
        if raw.failure_marker {
            return ObservationStatus::Failure;
        }
        if raw.success_marker {
            return ObservationStatus::Success;
        }
        raw.status_text
            .as_deref()
            .map(|text| self.vocabulary.classify_text(text))
            .unwrap_or(ObservationStatus::Unknown)
    }

    /// Takes one observation.
    ///
    /// Read problems never surface as errors: a failed read is recorded as
    /// `Unknown` with a note. A read that overran the timeout keeps a
    /// failure it reported but cannot count as a success.
    pub fn read<D, K>(&self, driver: &mut D, clock: &K, attempt: u32) -> Observation
    where
        D: SyncDriver + ?Sized,
        K: Clock + ?Sized,
    {
        let started = clock.now();
        let outcome = driver.observe(self.read_timeout);
        let captured_at = clock.now();
        let took = captured_at.saturating_duration_since(started);

        match outcome {
            Ok(raw) if took > self.read_timeout => {
                let status = match self.classify_signal(&raw) {
                    ObservationStatus::Success => ObservationStatus::Unknown,
                    other => other,
                };
                warn!(attempt, ?took, %status, "observation exceeded read timeout");
                Observation {
                    attempt,
                    status,
                    raw: Some(raw),
                    captured_at,
                    note: Some(format!(
                        "read took {:?}, longer than the {:?} timeout",
                        took, self.read_timeout
                    )),
                }
            }
            Ok(raw) => Observation {
                attempt,
                status: self.classify_signal(&raw),
                raw: Some(raw),
                captured_at,
                note: None,
            },
            Err(e) => {
                warn!(
                    attempt,
                    error = %e,
                    transient = e.is_transient(),
                    "observation read failed"
                );
                Observation {
                    attempt,
                    status: ObservationStatus::Unknown,
                    raw: None,
                    captured_at,
                    note: Some(EngineError::ObservationRead(e).to_string()),
                }
            }
        }
    }
}

impl Default for ObservationReader {
    fn default() -> Self {
        Self::new(StatusVocabulary::default(), Duration::from_secs(10))
    }
}
