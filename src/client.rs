//! HTTP client a collector uses to talk to the hub
//!
//! ```text
//! register ──► heartbeat ──► heartbeat ──► ... (every interval)
//!                  │
//!                  └─ 404: the hub does not know us → register again
//!                        └─ 410: we were deleted → stop
//! ```

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};
use url::Url;

use crate::{
    Collector, Millis,
    api::types::{HeartbeatRequest, HeartbeatResponse, RegisterRequest},
};

pub struct HeartbeatClient {
    client: reqwest::Client,
    base: Url,
    name: String,
    version: String,
}

impl HeartbeatClient {
    pub fn new(hub_url: &str, name: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let base = Url::parse(hub_url).with_context(|| format!("invalid hub url '{hub_url}'"))?;
        if base.cannot_be_a_base() {
            bail!("hub url '{hub_url}' cannot be used as a base url");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base,
            name: name.into(),
            version: version.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("hub url cannot be a base"))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    /// Register (or re-register) this collector with the hub
    ///
    /// Returns `None` when the hub refuses because this collector was
    /// deleted; the caller should stop instead of retrying.
    #[instrument(skip(self), fields(collector = %self.name))]
    pub async fn register(&self) -> Result<Option<Collector>> {
        let url = self.endpoint(&["collectors"])?;
        trace!("registering at {url}");

        let response = self
            .client
            .post(url)
            .json(&RegisterRequest {
                name: self.name.clone(),
                version: self.version.clone(),
            })
            .send()
            .await
            .context("failed to send registration")?;

        if response.status() == StatusCode::GONE {
            debug!("hub deleted this collector");
            return Ok(None);
        }

        let collector: Collector = decode(response).await?;
        debug!("registered as id={}", collector.id);
        Ok(Some(collector))
    }

    /// Send a heartbeat
    ///
    /// Returns `None` when the hub does not know this collector (anymore), in
    /// which case the caller should register again.
    #[instrument(skip(self), fields(collector = %self.name))]
    pub async fn heartbeat(&self, timestamp: Option<Millis>) -> Result<Option<HeartbeatResponse>> {
        let url = self.endpoint(&["collectors", self.name.as_str(), "heartbeat"])?;

        let response = self
            .client
            .post(url)
            .json(&HeartbeatRequest { timestamp })
            .send()
            .await
            .context("failed to send heartbeat")?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("hub does not know this collector");
            return Ok(None);
        }

        decode(response).await.map(Some)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message = body
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("no error message");
        bail!("hub returned {status}: {message}");
    }

    response.json().await.context("failed to parse hub response")
}
