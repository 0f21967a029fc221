//! Simulate command implementation.

use super::print_result;
use crate::Format;
use syncwatch_engine::{
    DriverError, EngineConfig, Entry, EntryId, Lifecycle, ManualClock, RawSignal,
    ReconciliationEngine, ScriptedDriver, ScriptedStep,
};
use thiserror::Error;
use tracing::info;

/// Errors in the signal script.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScriptError {
    /// No signals were given.
    #[error("at least one signal is required")]
    Empty,

    /// A signal token was blank.
    #[error("signal {0} is empty")]
    BlankToken(usize),
}

/// Parses one signal token.
pub fn parse_step(token: &str) -> ScriptedStep {
    let token = token.trim();
    match token.to_lowercase().as_str() {
        "success" | "ok" => ScriptedStep::Signal(RawSignal::success()),
        "failure" | "fail" => ScriptedStep::Signal(RawSignal::failure("simulated failure")),
        "pending" => ScriptedStep::Signal(RawSignal::text("pending")),
        "unknown" => ScriptedStep::Signal(RawSignal::empty()),
        "timeout" => ScriptedStep::Error(DriverError::Timeout),
        "error" => ScriptedStep::Error(DriverError::Unavailable("simulated read error".into())),
        _ => ScriptedStep::Signal(RawSignal::text(token)),
    }
}

/// Parses a list of signal tokens.
pub fn parse_script(tokens: &[String]) -> Result<Vec<ScriptedStep>, ScriptError> {
    if tokens.is_empty() {
        return Err(ScriptError::Empty);
    }
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            if token.trim().is_empty() {
                Err(ScriptError::BlankToken(i + 1))
            } else {
                Ok(parse_step(token))
            }
        })
        .collect()
}

/// Runs the simulate command.
pub fn run(
    config: EngineConfig,
    lifecycle: Lifecycle,
    tokens: &[String],
    trigger_fails: bool,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let steps = parse_script(tokens)?;
    info!("Simulating {} reconciliation over {} signal(s)", lifecycle, steps.len());

    let mut driver = ScriptedDriver::new(steps)
        .with_fallback(ScriptedStep::Signal(RawSignal::text("pending")));
    if trigger_fails {
        driver = driver.with_trigger_error(DriverError::action("sync", "simulated trigger failure"));
    }

    let engine = ReconciliationEngine::with_clock(config, ManualClock::new())?;
    let entry = Entry::new(Some(EntryId::new("simulated")), lifecycle);
    let result = engine.reconcile(&entry, &mut driver);

    print_result(&result, format)
}
