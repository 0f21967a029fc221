//! Profiles command implementation.

use syncwatch_engine::EngineConfig;

/// Prints the effective configuration as JSON.
pub fn run(config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
