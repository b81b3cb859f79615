//! Remote fetch (debrid) job lifecycle
//!
//! Drives one "add a magnet, wait, get a direct link, delete" job against the
//! remote fetch service. The account quota is a few gigabytes shared across
//! all items, so remote state is reclaimed unconditionally on every terminal
//! path before `fetch` returns.
//!
//! The service's field naming is inconsistent between API revisions; every
//! response is read through ordered alias lists rather than fixed structs.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::json_fields::{first_i64, first_string};

/// Accepted aliases for the transfer identifier
pub const TRANSFER_ID_ALIASES: &[&str] = &["id", "transfer_id"];
/// Accepted aliases for the result folder handle
pub const FOLDER_ID_ALIASES: &[&str] = &["folder_id", "folder"];
/// Accepted aliases for the status string
pub const STATUS_ALIASES: &[&str] = &["status", "state"];
/// Accepted aliases for the file identifier inside a folder listing
pub const FILE_ID_ALIASES: &[&str] = &["id", "file_id"];
/// Accepted aliases for the direct download URL
pub const DIRECT_URL_ALIASES: &[&str] = &["download_url", "url"];

/// Status strings that mean the transfer completed
const SUCCESS_STATUSES: &[&str] = &["finished", "seeding", "done", "complete"];
/// Status strings that mean the transfer failed
const FAILURE_STATUSES: &[&str] = &["error", "failed"];

/// Terminal state of one remote fetch job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed,
    TimedOut,
}

/// Transport boundary to the remote fetch service.
///
/// Every call returns the raw JSON body; the fetcher owns all field-alias
/// interpretation so the lifecycle logic stays testable against mocks.
#[async_trait]
pub trait RemoteFetchApi: Send + Sync {
    async fn add_magnet(&self, magnet: &str) -> Result<Value>;
    async fn transfer_info(&self, transfer_id: i64) -> Result<Value>;
    async fn list_folder(&self, folder_id: i64) -> Result<Value>;
    async fn file_link(&self, file_id: i64) -> Result<Value>;
    async fn delete_folder(&self, folder_id: i64) -> Result<Value>;
    async fn delete_transfer(&self, transfer_id: i64) -> Result<Value>;
}

/// HTTP implementation against the Seedr-style REST API (Basic Auth)
pub struct HttpRemoteFetch {
    client: Client,
    base_url: String,
    email: String,
    password: String,
}

impl HttpRemoteFetch {
    pub fn new(base_url: String, email: String, password: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            email,
            password,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.email, Some(&self.password))
            .send()
            .await
            .context("Remote fetch GET failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Remote fetch GET {} returned {}", path, response.status());
        }

        response.json().await.context("Invalid JSON from remote fetch")
    }

    async fn post(&self, path: &str, form: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.email, Some(&self.password))
            .form(form)
            .send()
            .await
            .context("Remote fetch POST failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Remote fetch POST {} returned {}", path, response.status());
        }

        response.json().await.context("Invalid JSON from remote fetch")
    }
}

#[async_trait]
impl RemoteFetchApi for HttpRemoteFetch {
    async fn add_magnet(&self, magnet: &str) -> Result<Value> {
        self.post("/rest/transfer/magnet", &[("magnet", magnet.to_string())])
            .await
    }

    async fn transfer_info(&self, transfer_id: i64) -> Result<Value> {
        // Some API revisions expose per-id lookup, others only the full list
        if let Ok(info) = self.get(&format!("/rest/transfer/{}", transfer_id)).await {
            return Ok(info);
        }

        let listing = self.get("/rest/transfer").await?;
        let transfers = listing
            .get("transfers")
            .and_then(Value::as_array)
            .context("Transfer listing missing 'transfers' array")?;

        transfers
            .iter()
            .find(|t| first_i64(t, TRANSFER_ID_ALIASES) == Some(transfer_id))
            .cloned()
            .with_context(|| format!("Transfer {} not present in listing", transfer_id))
    }

    async fn list_folder(&self, folder_id: i64) -> Result<Value> {
        self.get(&format!("/rest/folder/{}", folder_id)).await
    }

    async fn file_link(&self, file_id: i64) -> Result<Value> {
        self.get(&format!("/rest/file/{}", file_id)).await
    }

    async fn delete_folder(&self, folder_id: i64) -> Result<Value> {
        self.post(&format!("/rest/folder/{}/delete", folder_id), &[])
            .await
    }

    async fn delete_transfer(&self, transfer_id: i64) -> Result<Value> {
        self.post(
            "/rest/transfer/delete",
            &[("transfer_id", transfer_id.to_string())],
        )
        .await
    }
}

/// Drives the submit/poll/collect/teardown lifecycle for one magnet
pub struct RemoteFetcher<A: RemoteFetchApi> {
    api: A,
    poll_interval: Duration,
    max_wait: Duration,
}

impl<A: RemoteFetchApi> RemoteFetcher<A> {
    pub fn new(api: A, poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            api,
            poll_interval,
            max_wait,
        }
    }

    /// Fetch one magnet to a direct download URL.
    ///
    /// Returns `None` on any terminal non-success state; no error crosses
    /// this boundary. Remote state is torn down exactly once on every path
    /// that created it.
    pub async fn fetch(&self, magnet: &str) -> Option<String> {
        let transfer_id = match self.submit(magnet).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Magnet submission failed");
                return None;
            }
        };

        info!(transfer_id, "Magnet submitted to remote fetch service");

        let (outcome, folder_id) = self.poll(transfer_id).await;

        let direct_url = match outcome {
            JobOutcome::Completed => self.collect_direct_url(folder_id).await,
            JobOutcome::Failed => {
                warn!(transfer_id, "Remote transfer failed");
                None
            }
            JobOutcome::TimedOut => {
                warn!(transfer_id, "Remote transfer timed out");
                None
            }
        };

        // Mandatory reclaim: the remote quota is tiny and shared
        self.teardown(transfer_id, folder_id).await;

        direct_url
    }

    async fn submit(&self, magnet: &str) -> Result<i64> {
        let response = self.api.add_magnet(magnet).await?;

        // Response shape varies: a transfer list, a single object, or the
        // transfer inlined at the top level
        let transfer = match response.get("transfers").or_else(|| response.get("transfer")) {
            Some(Value::Array(items)) => items.last().cloned().unwrap_or(Value::Null),
            Some(obj @ Value::Object(_)) => obj.clone(),
            _ => response.clone(),
        };

        first_i64(&transfer, TRANSFER_ID_ALIASES)
            .context("No transfer id in magnet submission response")
    }

    /// Poll until a terminal status or the wall-clock budget runs out.
    ///
    /// Unrecognized statuses and transient fetch errors wait and retry
    /// without counting as failures.
    async fn poll(&self, transfer_id: i64) -> (JobOutcome, Option<i64>) {
        let poll_ms = self.poll_interval.as_millis().max(1);
        let attempts = (self.max_wait.as_millis() / poll_ms).max(1);

        for _ in 0..attempts {
            let info = match self.api.transfer_info(transfer_id).await {
                Ok(info) => info,
                Err(e) => {
                    warn!(transfer_id, error = %e, "Transfer status fetch failed, retrying");
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
            };

            let status = first_string(&info, STATUS_ALIASES)
                .unwrap_or_default()
                .to_lowercase();

            debug!(transfer_id, status = %status, "Polled transfer");

            if SUCCESS_STATUSES.contains(&status.as_str()) {
                let folder_id = first_i64(&info, FOLDER_ID_ALIASES);
                return (JobOutcome::Completed, folder_id);
            }

            if FAILURE_STATUSES.contains(&status.as_str()) {
                return (JobOutcome::Failed, None);
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        (JobOutcome::TimedOut, None)
    }

    /// List the result folder, pick the largest file (the ancillary
    /// metadata/subtitle files are always smaller), and resolve its direct
    /// link.
    async fn collect_direct_url(&self, folder_id: Option<i64>) -> Option<String> {
        let folder_id = match folder_id {
            Some(id) => id,
            None => {
                warn!("Transfer completed without a folder handle");
                return None;
            }
        };

        let listing = match self.api.list_folder(folder_id).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(folder_id, error = %e, "Folder listing failed");
                return None;
            }
        };

        let files = listing.get("files").and_then(Value::as_array)?;

        let largest = files
            .iter()
            .max_by_key(|f| first_i64(f, &["size"]).unwrap_or(0))?;

        let file_id = first_i64(largest, FILE_ID_ALIASES)?;

        info!(
            folder_id,
            file_id,
            size = first_i64(largest, &["size"]).unwrap_or(0),
            "Selected largest file from result folder"
        );

        let link_response = match self.api.file_link(file_id).await {
            Ok(response) => response,
            Err(e) => {
                warn!(file_id, error = %e, "Direct link fetch failed");
                return None;
            }
        };

        first_string(&link_response, DIRECT_URL_ALIASES)
    }

    /// Delete the result folder (if one exists) and the transfer entry.
    /// Errors are logged and swallowed; there is nothing else to do with a
    /// failed delete.
    async fn teardown(&self, transfer_id: i64, folder_id: Option<i64>) {
        if let Some(folder_id) = folder_id {
            match self.api.delete_folder(folder_id).await {
                Ok(_) => debug!(folder_id, "Deleted remote folder"),
                Err(e) => warn!(folder_id, error = %e, "Remote folder delete failed"),
            }
        }

        match self.api.delete_transfer(transfer_id).await {
            Ok(_) => debug!(transfer_id, "Deleted remote transfer"),
            Err(e) => warn!(transfer_id, error = %e, "Remote transfer delete failed"),
        }
    }
}
