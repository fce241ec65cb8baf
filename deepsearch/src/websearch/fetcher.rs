//! HTTP implementation of [`PageFetcher`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use super::config::FetchConfig;
use super::extract::clean_html;
use super::protocols::{FetchedPage, PageFetcher};
use crate::errors::{DeepSearchError, Result};
use crate::observability::{unix_now, TimingRecord};

/// Fetches pages over a shared, connection-pooling `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    /// Builds the fetcher and its client.
    ///
    /// # Errors
    ///
    /// Returns [`DeepSearchError::Config`] if the client cannot be constructed.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| DeepSearchError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<FetchedPage> {
        let fetch_start = unix_now();
        let fetch_clock = Instant::now();

        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| DeepSearchError::fetch(url, e))?;
        let body = response
            .text()
            .await
            .map_err(|e| DeepSearchError::fetch(url, e))?;
        let fetch_duration = fetch_clock.elapsed().as_secs_f64();

        let parse_start = unix_now();
        let parse_clock = Instant::now();
        let text = tokio::task::spawn_blocking(move || clean_html(&body))
            .await
            .map_err(|e| DeepSearchError::parse(url, e))?;
        let parse_duration = parse_clock.elapsed().as_secs_f64();

        debug!(url, fetch_duration, parse_duration, chars = text.len(), "Page cleaned");

        Ok(FetchedPage {
            text,
            timing: TimingRecord {
                url: url.to_string(),
                fetch_start,
                fetch_duration,
                parse_start,
                parse_duration,
            },
        })
    }
}
