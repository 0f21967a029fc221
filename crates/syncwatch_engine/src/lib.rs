//! # Syncwatch Engine
//!
//! Reconciliation engine for confirming that an entry pushed to an external,
//! eventually-consistent system has really finished synchronizing.
//!
//! This crate provides:
//! - Sync verification state machine (idle → triggered → observing → terminal)
//! - Branch classification between first-time and repeat syncs
//! - Observation reading with status normalization
//! - Attempt budget and deadline enforcement
//! - Driver abstraction with scripted and HTTP implementations
//!
//! ## Architecture
//!
//! The engine follows a **trigger-then-observe** model:
//! 1. Classify the entry to choose a reconciliation profile
//! 2. Trigger the remote sync exactly once
//! 3. Wait for the settle delay, then re-observe at a fixed interval
//! 4. Stop on the first terminal verdict or when the budget runs out
//!
//! ## Key Invariants
//!
//! - A failed trigger is never followed by an observation
//! - Any reported failure ends the session immediately
//! - Successes only count when they are consecutive
//! - A session never records more than `max_attempts` observations
//! - The verdict of a session is set exactly once

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod classifier;
mod clock;
mod config;
mod driver;
mod engine;
mod error;
mod http;
mod reader;
mod result;
mod session;
mod types;

pub use classifier::BranchClassifier;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, ReconciliationProfile};
pub use driver::{DriverError, DriverResult, ScriptedDriver, ScriptedStep, SyncDriver};
pub use engine::{EngineStats, ReconciliationEngine};
pub use error::{EngineError, EngineResult};
pub use http::{HttpClient, HttpStatusDriver, StatusBody};
pub use reader::{ObservationReader, StatusVocabulary};
pub use result::{FailureCause, SyncResult, Verdict};
pub use session::{ReconciliationSession, SessionState};
pub use types::{Entry, EntryId, Lifecycle, Observation, ObservationStatus, RawSignal};
