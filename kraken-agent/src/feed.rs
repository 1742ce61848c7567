//! DOA feed client
//!
//! The DOA software serves its latest estimates as CSV on its own web
//! server. Fetching is soft-fail: any network, HTTP status or decode problem
//! is logged and reported as "no records", so `get_doa` always has an answer.

use anyhow::Context;
use kraken_common::config::DoaFeedConfig;
use kraken_common::doa::parse_doa_csv;
use kraken_common::{DoaRecord, Error};
use std::time::Duration;
use tracing::{debug, warn};

/// Path of the CSV document on the device's web server
pub const DOA_FEED_PATH: &str = "/DOA_value.html";

#[derive(Debug, Clone)]
pub struct DoaFeedClient {
    http_client: reqwest::Client,
    host: String,
    port: u16,
}

impl DoaFeedClient {
    pub fn new(config: &DoaFeedConfig) -> Result<Self, Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            host: config.host.clone(),
            port: config.port,
        })
    }

    /// Host the agent reads its own device's feed from
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn feed_url(&self, host: &str) -> String {
        format!("http://{}:{}{}", host, self.port, DOA_FEED_PATH)
    }

    /// Fetch the feed from `host` and parse every usable row
    pub async fn fetch_and_process(&self, host: &str) -> Vec<DoaRecord> {
        match self.fetch_body(host).await {
            Ok(body) => {
                let records = parse_doa_csv(&body);
                debug!(host, records = records.len(), "Fetched DOA feed");
                records
            }
            Err(e) => {
                warn!("Error fetching DOA feed: {:#}", e);
                Vec::new()
            }
        }
    }

    async fn fetch_body(&self, host: &str) -> anyhow::Result<String> {
        let url = self.feed_url(host);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("GET {} returned an error status", url))?;

        response
            .text()
            .await
            .with_context(|| format!("Failed to read body from {}", url))
    }
}
