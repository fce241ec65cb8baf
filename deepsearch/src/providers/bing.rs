//! Bing custom search client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SearchClient;
use crate::errors::{DeepSearchError, Result};
use crate::observability::SpanTimer;

/// Connection settings for the Bing custom search API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BingConfig {
    /// Search endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// `Ocp-Apim-Subscription-Key` value.
    #[serde(default)]
    pub subscription_key: String,
    /// Custom search configuration ID.
    #[serde(default)]
    pub custom_config_id: String,
}

fn default_endpoint() -> String {
    "https://api.bing.microsoft.com/v7.0/custom/search".to_string()
}

impl Default for BingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            subscription_key: String::new(),
            custom_config_id: String::new(),
        }
    }
}

impl BingConfig {
    /// Creates a configuration for the public endpoint.
    pub fn new(subscription_key: impl Into<String>, custom_config_id: impl Into<String>) -> Self {
        Self {
            subscription_key: subscription_key.into(),
            custom_config_id: custom_config_id.into(),
            ..Self::default()
        }
    }

    /// Overrides the endpoint (used against local mock servers).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// [`SearchClient`] backed by the Bing custom search v7 API.
#[derive(Debug, Clone)]
pub struct BingSearchClient {
    client: reqwest::Client,
    config: BingConfig,
}

impl BingSearchClient {
    /// Creates a client sharing the given `reqwest` client.
    #[must_use]
    pub fn new(client: reqwest::Client, config: BingConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl SearchClient for BingSearchClient {
    async fn search(&self, query: &str, count: usize, market: &str) -> Result<serde_json::Value> {
        let timer = SpanTimer::start("bing_search");
        let count = count.to_string();
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("q", query),
                ("customconfig", self.config.custom_config_id.as_str()),
                ("mkt", market),
                ("count", count.as_str()),
            ])
            .header("Ocp-Apim-Subscription-Key", &self.config.subscription_key)
            .send()
            .await
            .map_err(|e| DeepSearchError::Search(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeepSearchError::Search(format!("HTTP {status}: {body}")));
        }

        let results = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| DeepSearchError::Search(format!("invalid response body: {e}")))?;
        debug!(duration_ms = timer.finish(), "Bing search completed");
        Ok(results)
    }
}
