use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::config::UpstreamConfig;
use crate::upstream::query::ReportQuery;

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream answered with a non-success status. The raw body text
    /// is preserved so callers can surface it verbatim.
    #[error("upstream returned status {status}")]
    Status { status: u16, body: String },
    /// The request never produced an upstream answer (connect, read, or
    /// body-decode failure).
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Seam between orchestration and the real HTTP client, so fetch cycles can
/// be exercised against a scripted fake in tests.
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    async fn fetch(&self, query: &ReportQuery) -> Result<Value, UpstreamError>;
}

/// reqwest-backed report fetcher. Never caches and never retries: every
/// call is a fresh round trip, and a hung upstream call is the transport's
/// problem to time out (or not).
pub struct AnalyticsApi {
    client: Client,
    config: UpstreamConfig,
}

impl AnalyticsApi {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build HTTP client for the analytics upstream")?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl ReportFetcher for AnalyticsApi {
    async fn fetch(&self, query: &ReportQuery) -> Result<Value, UpstreamError> {
        let built = query.build(&self.config);

        let mut request = self.client.get(&built.url);
        for (name, value) in &built.headers {
            request = request.header(*name, value.as_str());
        }

        let response = request.send().await.map_err(|err| {
            error!(url = %built.url, "analytics upstream request failed to send: {err}");
            UpstreamError::Transport(
                anyhow::Error::new(err).context("failed to reach the analytics upstream"),
            )
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            UpstreamError::Transport(
                anyhow::Error::new(err).context("failed to read the upstream response body"),
            )
        })?;

        if !status.is_success() {
            // The URL never carries the bearer token, so it is safe to log.
            error!(
                url = %built.url,
                status = status.as_u16(),
                body = %body,
                "analytics upstream rejected the request"
            );
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|err| {
            error!(url = %built.url, "upstream returned a non-JSON body: {err}");
            UpstreamError::Transport(
                anyhow::Error::new(err).context("failed to parse the upstream response as JSON"),
            )
        })
    }
}
