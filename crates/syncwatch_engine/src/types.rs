//! Core data types for sync verification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Opaque identifier of an entry in the external system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Creates a new entry ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Whether an entry existed in the external system before this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// First-time creation; nothing was synced before.
    New,
    /// The entry was already synced once and is being re-synced.
    Existing,
}

impl Lifecycle {
    /// Derives the lifecycle from a pre-existing-record marker.
    ///
    /// The marker is whatever the caller saw before triggering sync that
    /// proves the record already exists, such as a view/edit toggle.
    pub fn from_marker(marker_present: bool) -> Self {
        if marker_present {
            Lifecycle::Existing
        } else {
            Lifecycle::New
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::New => f.write_str("new"),
            Lifecycle::Existing => f.write_str("existing"),
        }
    }
}

/// The unit of work being synchronized.
///
/// The lifecycle is fixed at construction and cannot change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    id: Option<EntryId>,
    lifecycle: Lifecycle,
}

impl Entry {
    /// Creates an entry with a known lifecycle.
    pub fn new(id: Option<EntryId>, lifecycle: Lifecycle) -> Self {
        Self { id, lifecycle }
    }

    /// Creates an entry that is being synced for the first time.
    pub fn created(id: impl Into<EntryId>) -> Self {
        Self::new(Some(id.into()), Lifecycle::New)
    }

    /// Creates an entry that already existed before this run.
    pub fn existing(id: impl Into<EntryId>) -> Self {
        Self::new(Some(id.into()), Lifecycle::Existing)
    }

    /// Returns the entry ID, if one has been assigned.
    pub fn id(&self) -> Option<&EntryId> {
        self.id.as_ref()
    }

    /// Returns the lifecycle.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Returns true if the entry existed before this run.
    pub fn existed_before_this_run(&self) -> bool {
        self.lifecycle == Lifecycle::Existing
    }

    /// Label used in logs.
    pub(crate) fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("{} ({})", id, self.lifecycle),
            None => format!("<unassigned> ({})", self.lifecycle),
        }
    }
}

/// Raw snapshot returned by a driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignal {
    /// A success indicator was visible.
    #[serde(default)]
    pub success_marker: bool,
    /// A failure indicator was visible.
    #[serde(default)]
    pub failure_marker: bool,
    /// Free-form status text, if any was shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    /// Extra detail (error message, export reference, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RawSignal {
    /// A snapshot showing the success indicator.
    pub fn success() -> Self {
        Self {
            success_marker: true,
            ..Self::default()
        }
    }

    /// A snapshot showing the failure indicator.
    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            failure_marker: true,
            detail: Some(detail.into()),
            ..Self::default()
        }
    }

    /// A snapshot carrying only status text.
    pub fn text(status: impl Into<String>) -> Self {
        Self {
            status_text: Some(status.into()),
            ..Self::default()
        }
    }

    /// A snapshot with no recognizable content.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Normalized sync status of one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationStatus {
    /// Nothing recognizable, or the read failed.
    Unknown,
    /// The external system is still working.
    Pending,
    /// The external system reports success.
    Success,
    /// The external system reports failure.
    Failure,
}

impl ObservationStatus {
    /// Returns true for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, ObservationStatus::Success)
    }
}

impl fmt::Display for ObservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObservationStatus::Unknown => "unknown",
            ObservationStatus::Pending => "pending",
            ObservationStatus::Success => "success",
            ObservationStatus::Failure => "failure",
        };
        f.write_str(s)
    }
}

/// One normalized snapshot of externally visible state.
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    /// 1-based position in the session.
    pub attempt: u32,
    /// Derived status.
    pub status: ObservationStatus,
    /// The raw snapshot, absent when the read failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawSignal>,
    /// When the snapshot was taken.
    #[serde(skip)]
    pub captured_at: Instant,
    /// Set when the read failed or overran the read timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_from_marker() {
        assert_eq!(Lifecycle::from_marker(true), Lifecycle::Existing);
        assert_eq!(Lifecycle::from_marker(false), Lifecycle::New);
    }

    #[test]
    fn entry_existence_follows_lifecycle() {
        let entry = Entry::existing("SJ-1001");
        assert!(entry.existed_before_this_run());
        assert_eq!(entry.id().map(EntryId::as_str), Some("SJ-1001"));

        let entry = Entry::new(None, Lifecycle::New);
        assert!(!entry.existed_before_this_run());
        assert!(entry.label().contains("<unassigned>"));
    }

    #[test]
    fn raw_signal_json_defaults() {
        let raw: RawSignal = serde_json::from_str(r#"{"status_text":"Queued"}"#).unwrap();
        assert_eq!(raw, RawSignal::text("Queued"));
    }

    #[test]
    fn status_display() {
        assert_eq!(ObservationStatus::Pending.to_string(), "pending");
        assert_eq!(
            serde_json::to_string(&ObservationStatus::Success).unwrap(),
            "\"success\""
        );
    }
}
