//! Protocol trait for page fetching.
//!
//! The retriever depends only on this trait so that the HTTP implementation
//! can be swapped for scripted fetchers in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::Result;
use crate::observability::TimingRecord;

/// Result of fetching and cleaning one page.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// Cleaned visible text.
    pub text: String,
    /// When and how long fetching and cleaning took.
    pub timing: TimingRecord,
}

/// Protocol for retrieving one page as clean text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` with the given headers and timeout and cleans the body.
    ///
    /// # Errors
    ///
    /// [`crate::errors::DeepSearchError::Fetch`] on network, timeout or
    /// non-2xx failures; [`crate::errors::DeepSearchError::Parse`] if the
    /// cleaning step fails.
    async fn fetch_page(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<FetchedPage>;
}
