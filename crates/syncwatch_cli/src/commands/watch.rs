//! Watch command implementation.

use super::print_result;
use crate::Format;
use reqwest::StatusCode;
use std::time::Duration;
use syncwatch_engine::{
    DriverError, DriverResult, EngineConfig, Entry, EntryId, HttpClient, HttpStatusDriver,
    Lifecycle, ReconciliationEngine,
};
use tracing::info;

/// Blocking reqwest client for the status driver.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with a default request timeout.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("syncwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

fn map_error(err: reqwest::Error) -> DriverError {
    if err.is_timeout() {
        DriverError::Timeout
    } else if err.is_decode() {
        DriverError::Decode(err.to_string())
    } else {
        DriverError::Unavailable(err.to_string())
    }
}

/// Maps a non-success HTTP status to a driver error.
///
/// A client error on the trigger means the sync action itself was refused;
/// everything else is the status endpoint being unavailable.
fn status_error(status: StatusCode, on_trigger: bool) -> Option<DriverError> {
    if status.is_success() {
        None
    } else if on_trigger && status.is_client_error() {
        Some(DriverError::action("sync", format!("HTTP {}", status)))
    } else {
        Some(DriverError::Unavailable(format!("HTTP {}", status)))
    }
}

fn read_body(response: reqwest::blocking::Response, on_trigger: bool) -> DriverResult<Vec<u8>> {
    if let Some(err) = status_error(response.status(), on_trigger) {
        return Err(err);
    }
    response
        .bytes()
        .map(|b| b.to_vec())
        .map_err(map_error)
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, timeout: Duration) -> DriverResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .map_err(map_error)?;
        read_body(response, false)
    }

    fn post(&self, url: &str, body: Vec<u8>) -> DriverResult<Vec<u8>> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(map_error)?;
        read_body(response, true)
    }
}

/// Runs the watch command.
pub fn run(
    config: EngineConfig,
    url: &str,
    entry_id: &str,
    lifecycle: Lifecycle,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = ReqwestClient::new(config.read_timeout)?;
    let entry_id = EntryId::new(entry_id);
    let mut driver = HttpStatusDriver::new(url, entry_id.clone(), client);
    info!("Watching sync of {} via {}", entry_id, driver.status_url());

    let engine = ReconciliationEngine::new(config)?;
    let entry = Entry::new(Some(entry_id), lifecycle);
    let result = engine.reconcile(&entry, &mut driver);

    print_result(&result, format)?;

    if result.is_success() {
        Ok(())
    } else {
        Err(format!("sync not confirmed: {}", result.verdict).into())
    }
}
