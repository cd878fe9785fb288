//! Keyword metrics provider client.
//!
//! Fetches average monthly searches and competition tiers for a keyword list.
//! The provider accepts at most 20 keywords per request, so the list is split
//! into batches that are all sent concurrently. A run either returns metrics
//! for every batch or fails as a whole: one non-success batch aborts it.

mod chunk;
mod merge;

use std::time::Duration;

use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use keyplan_shared::{KeyplanError, MetricsOptions, Result};

pub use chunk::chunk_keywords;
pub use merge::{MetricsMap, MetricsRecord, merge_batches, parse_batch};

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("keyplan/", env!("CARGO_PKG_VERSION"));

/// Service name used in provider error messages.
const SERVICE: &str = "metrics provider";

/// Shown when an error response carries no JSON payload.
const NO_DETAILS: &str = "No additional information.";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Request body for one batch.
#[derive(Debug, Serialize)]
struct MetricsRequest<'a> {
    keywords: &'a [String],
    options: TargetingOptions<'a>,
}

/// Regional/language targeting sent with every batch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TargetingOptions<'a> {
    language_constant: &'a str,
    geo_target_constants: &'a [String],
    /// Always false; adult keywords are never requested.
    include_adult_keywords: bool,
}

// ---------------------------------------------------------------------------
// MetricsClient
// ---------------------------------------------------------------------------

/// Handle to the metrics provider. Build once, share by reference.
#[derive(Debug, Clone)]
pub struct MetricsClient {
    client: Client,
    options: MetricsOptions,
}

impl MetricsClient {
    /// Create a client for the given endpoint and targeting options.
    pub fn new(options: MetricsOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .map_err(|e| KeyplanError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, options })
    }

    /// Fetch metrics for `keywords`, returning provider key → record.
    ///
    /// Keys are the provider's spelling, which may contain token-separating
    /// whitespace the input keywords lack. An empty input makes no request.
    #[instrument(skip_all, fields(keywords = keywords.len()))]
    pub async fn fetch_metrics(&self, keywords: &[String]) -> Result<MetricsMap> {
        if keywords.is_empty() {
            debug!("no keywords, skipping metrics fetch");
            return Ok(MetricsMap::new());
        }

        let batches = chunk_keywords(keywords, self.options.chunk_size)?;
        info!(batches = batches.len(), "fetching keyword metrics");

        // All batches are in flight together; results are inspected only once every one has settled.
        let settled = join_all(
            batches
                .iter()
                .enumerate()
                .map(|(index, batch)| self.fetch_batch(index, batch)),
        )
        .await;

        let mut parsed = Vec::with_capacity(settled.len());
        for result in settled {
            parsed.push(result?);
        }

        let merged = merge_batches(parsed);
        info!(records = merged.len(), "keyword metrics merged");

        Ok(merged)
    }

    /// POST one batch and decode its body.
    async fn fetch_batch(&self, index: usize, batch: &[String]) -> Result<MetricsMap> {
        let request = MetricsRequest {
            keywords: batch,
            options: TargetingOptions {
                language_constant: &self.options.language_constant,
                geo_target_constants: &self.options.geo_target_constants,
                include_adult_keywords: false,
            },
        };

        let response = self
            .client
            .post(self.options.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| KeyplanError::Network(format!("{}: {e}", self.options.endpoint)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            KeyplanError::Network(format!("{}: failed to read body: {e}", self.options.endpoint))
        })?;

        if !status.is_success() {
            warn!(batch = index, %status, "metrics batch failed");
            return Err(KeyplanError::Provider {
                service: SERVICE,
                status: status.as_u16(),
                message: error_payload(&body),
            });
        }

        let records = parse_batch(&body)?;
        debug!(batch = index, size = batch.len(), records = records.len(), "metrics batch fetched");

        Ok(records)
    }
}

/// Extract a displayable error payload: the `error` field if present, else the whole JSON body.
fn error_payload(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => json.get("error").unwrap_or(&json).to_string(),
        Err(_) => NO_DETAILS.to_string(),
    }
}
