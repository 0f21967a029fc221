//! CLI command implementations.

pub mod profiles;
pub mod simulate;
pub mod watch;

use crate::Format;
use syncwatch_engine::SyncResult;

/// Prints a reconciliation result in the requested format.
pub fn print_result(result: &SyncResult, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        Format::Text => {
            println!("Entry:        {}", describe_entry(result));
            println!("Verdict:      {}", result.verdict);
            println!("Reason:       {}", result.reason);
            println!("Elapsed:      {:?}", result.elapsed);
            println!("Observations: {}", result.observations.len());
            for obs in &result.observations {
                match &obs.note {
                    Some(note) => println!("  #{:<3} {:<8} ({})", obs.attempt, obs.status, note),
                    None => println!("  #{:<3} {}", obs.attempt, obs.status),
                }
            }
        }
    }
    Ok(())
}

fn describe_entry(result: &SyncResult) -> String {
    let id = result
        .entry
        .id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "<unassigned>".into());
    format!("{} ({})", id, result.entry.lifecycle())
}
