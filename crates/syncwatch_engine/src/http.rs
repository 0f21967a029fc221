//! HTTP status driver.
//!
//! This module provides a driver that triggers the sync through a REST
//! endpoint and polls a status endpoint instead of re-rendering a page.
//! The actual HTTP client is abstracted via a trait to allow different
//! implementations (reqwest, ureq, a loopback for tests, etc.).

use crate::driver::{DriverError, DriverResult, SyncDriver};
use crate::types::{EntryId, RawSignal};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP client abstraction.
pub trait HttpClient {
    /// Sends a GET request and returns the response body.
    fn get(&self, url: &str, timeout: Duration) -> DriverResult<Vec<u8>>;

    /// Sends a POST request with a JSON body and returns the response body.
    fn post(&self, url: &str, body: Vec<u8>) -> DriverResult<Vec<u8>>;
}

/// JSON body of the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    /// Status word reported by the server.
    #[serde(default)]
    pub status: Option<String>,
    /// Explicit success flag.
    #[serde(default)]
    pub success: Option<bool>,
    /// Explicit failure flag.
    #[serde(default)]
    pub failed: Option<bool>,
    /// Error or detail message.
    #[serde(default)]
    pub message: Option<String>,
}

impl From<StatusBody> for RawSignal {
    fn from(body: StatusBody) -> Self {
        RawSignal {
            success_marker: body.success.unwrap_or(false),
            failure_marker: body.failed.unwrap_or(false),
            status_text: body.status,
            detail: body.message,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerBody<'a> {
    entry_id: &'a str,
}

/// Driver that talks to a REST API.
///
/// `trigger` posts to `{base}/entries/{id}/sync` and `observe` reads
/// `{base}/entries/{id}/sync-status`.
pub struct HttpStatusDriver<C: HttpClient> {
    base_url: String,
    entry_id: EntryId,
    client: C,
    last_error: Option<String>,
}

impl<C: HttpClient> HttpStatusDriver<C> {
    /// Creates a new HTTP status driver.
    pub fn new(base_url: impl Into<String>, entry_id: EntryId, client: C) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            entry_id,
            client,
            last_error: None,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// URL that starts the sync.
    pub fn trigger_url(&self) -> String {
        format!("{}/sync", self.entry_url())
    }

    /// URL that reports sync status.
    pub fn status_url(&self) -> String {
        format!("{}/sync-status", self.entry_url())
    }

    /// The entry ID is a single path segment, so it is percent-encoded.
    fn entry_url(&self) -> String {
        format!(
            "{}/entries/{}",
            self.base_url,
            urlencoding::encode(self.entry_id.as_str())
        )
    }

    fn track<T>(&mut self, result: DriverResult<T>) -> DriverResult<T> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => self.last_error = Some(e.to_string()),
        }
        result
    }
}

impl<C: HttpClient> SyncDriver for HttpStatusDriver<C> {
    fn trigger(&mut self) -> DriverResult<()> {
        let body = serde_json::to_vec(&TriggerBody {
            entry_id: self.entry_id.as_str(),
        })
        .map_err(|e| DriverError::action("sync", format!("failed to encode request: {}", e)))?;

        let url = self.trigger_url();
        let result = self
            .client
            .post(&url, body)
            .map(|_| ())
            .map_err(|e| match e {
                DriverError::Action { .. } => e,
                other => DriverError::action("sync", other.to_string()),
            });
        self.track(result)
    }

    fn observe(&mut self, timeout: Duration) -> DriverResult<RawSignal> {
        let url = self.status_url();
        let result = self.client.get(&url, timeout).and_then(|bytes| {
            serde_json::from_slice::<StatusBody>(&bytes)
                .map(RawSignal::from)
                .map_err(|e| DriverError::Decode(format!("failed to decode status: {}", e)))
        });
        self.track(result)
    }
}
