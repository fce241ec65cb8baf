//! Bounded concurrent page retrieval with per-URL failure isolation.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::config::FetchConfig;
use super::models::{FetchedContent, SelectedUrl};
use super::protocols::{FetchedPage, PageFetcher};
use crate::cancellation::CancellationToken;
use crate::errors::Result;
use crate::events::{EventSink, PipelineEvent};
use crate::observability::{aggregate_duration, TimingRecord};

/// What a retrieval batch produced.
#[derive(Debug, Clone, Default)]
pub struct RetrievalOutcome {
    /// Successfully fetched pages, in completion order.
    pub contents: Vec<FetchedContent>,
    /// One timing record per entry of `contents`.
    pub timings: Vec<TimingRecord>,
    /// Number of URLs that failed to fetch or parse.
    pub failed: usize,
    /// Whether the batch stopped early because the run was cancelled.
    pub cancelled: bool,
}

impl RetrievalOutcome {
    /// Number of URLs that were attempted and finished, successfully or not.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.contents.len() + self.failed
    }

    /// Wall-clock span of the batch in seconds.
    #[must_use]
    pub fn aggregate_duration(&self) -> f64 {
        aggregate_duration(&self.timings)
    }
}

/// Runs a [`PageFetcher`] over many URLs on a fixed-size worker pool.
#[derive(Clone)]
pub struct ConcurrentRetriever {
    fetcher: Arc<dyn PageFetcher>,
    config: FetchConfig,
}

impl ConcurrentRetriever {
    /// Creates a retriever.
    #[must_use]
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: FetchConfig) -> Self {
        Self { fetcher, config }
    }

    /// Returns the fetch configuration.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetches every URL, at most `max_concurrent` at a time.
    ///
    /// Results are consumed in completion order. Each success emits one
    /// `url_processed` event before the next result is looked at. Failures are
    /// logged and counted, never returned. When the sink closes or `cancel`
    /// fires, pending workers are aborted and the partial outcome is returned.
    pub async fn retrieve(
        &self,
        urls: &[SelectedUrl],
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> RetrievalOutcome {
        let pool = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let headers = Arc::new(self.config.request_headers());
        let timeout = self.config.timeout();

        let mut workers: JoinSet<(SelectedUrl, Result<FetchedPage>)> = JoinSet::new();
        for selected in urls.iter().cloned() {
            let fetcher = Arc::clone(&self.fetcher);
            let pool = Arc::clone(&pool);
            let headers = Arc::clone(&headers);
            workers.spawn(async move {
                // The semaphore is never closed, so acquiring cannot fail.
                let _permit = pool.acquire_owned().await.ok();
                let result = fetcher.fetch_page(&selected.url, &headers, timeout).await;
                (selected, result)
            });
        }

        let mut outcome = RetrievalOutcome::default();
        loop {
            let joined = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    outcome.cancelled = true;
                    break;
                }
                joined = workers.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok((selected, Ok(page))) => {
                    let content = FetchedContent::from_selection(&selected, page.text);
                    let title = content.title.clone();
                    outcome.contents.push(content);
                    outcome.timings.push(page.timing);
                    if sink.emit(PipelineEvent::url_processed(title)).await.is_err() {
                        outcome.cancelled = true;
                        break;
                    }
                }
                Ok((selected, Err(err))) => {
                    outcome.failed += 1;
                    warn!(url = %selected.url, error = %err, kind = err.kind(), "URL generated an exception");
                }
                Err(join_err) => {
                    outcome.failed += 1;
                    warn!(error = %join_err, "Fetch worker did not complete");
                }
            }
        }

        if outcome.cancelled {
            workers.abort_all();
            info!(
                completed = outcome.attempted(),
                requested = urls.len(),
                "Retrieval abandoned"
            );
        } else {
            info!(
                fetched = outcome.contents.len(),
                failed = outcome.failed,
                total_seconds = outcome.aggregate_duration(),
                "Retrieval finished"
            );
        }
        outcome
    }
}

impl std::fmt::Debug for ConcurrentRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentRetriever")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
