//! Scripted collaborators for testing.

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::{DeepSearchError, Result};
use crate::observability::{unix_now, TimingRecord};
use crate::providers::{CompletionClient, CompletionRequest, FragmentStream, SearchClient};
use crate::websearch::{FetchedPage, PageFetcher};

/// Builds a provider-shaped search response with `count` hits.
///
/// Hit `i` has URL `https://r{i}.test`, title `Result {i}` and snippet
/// `Snippet {i}`.
#[must_use]
pub fn search_response(count: usize) -> serde_json::Value {
    let hits: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "url": format!("https://r{i}.test"),
                "name": format!("Result {i}"),
                "snippet": format!("Snippet {i}"),
            })
        })
        .collect();
    serde_json::json!({"webPages": {"value": hits}})
}

#[derive(Debug, Clone)]
enum PageBehavior {
    Text(String),
    Fail,
    Hang,
}

/// How a [`ScriptedFetcher`] answers one URL.
#[derive(Debug, Clone)]
pub struct ScriptedPage {
    behavior: PageBehavior,
    delay: Duration,
}

impl ScriptedPage {
    /// Returns `text` as the cleaned page.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            behavior: PageBehavior::Text(text.into()),
            delay: Duration::ZERO,
        }
    }

    /// Fails with a fetch error.
    #[must_use]
    pub fn fail() -> Self {
        Self {
            behavior: PageBehavior::Fail,
            delay: Duration::ZERO,
        }
    }

    /// Never answers; the fetch timeout applies.
    #[must_use]
    pub fn timeout() -> Self {
        Self {
            behavior: PageBehavior::Hang,
            delay: Duration::ZERO,
        }
    }

    /// Answers after `ms` milliseconds.
    #[must_use]
    pub fn delayed(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

/// A [`PageFetcher`] answering from a fixed script.
///
/// Unknown URLs fail. The fetch timeout is honored the way the HTTP fetcher
/// honors it. Tracks the highest number of concurrent fetches seen.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, ScriptedPage>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a page to the script.
    #[must_use]
    pub fn with(mut self, url: impl Into<String>, page: ScriptedPage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    /// Highest number of fetches in flight at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// URLs requested so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    async fn answer(&self, url: &str) -> Result<String> {
        let Some(page) = self.pages.get(url) else {
            return Err(DeepSearchError::fetch(url, "HTTP 404 Not Found"));
        };
        tokio::time::sleep(page.delay).await;
        match &page.behavior {
            PageBehavior::Text(text) => Ok(text.clone()),
            PageBehavior::Fail => Err(DeepSearchError::fetch(url, "connection refused")),
            PageBehavior::Hang => {
                std::future::pending::<()>().await;
                Err(DeepSearchError::fetch(url, "unreachable"))
            }
        }
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(
        &self,
        url: &str,
        _headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<FetchedPage> {
        self.calls.lock().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let fetch_start = unix_now();
        let result = tokio::time::timeout(timeout, self.answer(url)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let text = match result {
            Ok(answer) => answer?,
            Err(_) => return Err(DeepSearchError::fetch(url, "operation timed out")),
        };
        let parse_start = unix_now();
        Ok(FetchedPage {
            text,
            timing: TimingRecord {
                url: url.to_string(),
                fetch_start,
                fetch_duration: parse_start - fetch_start,
                parse_start,
                parse_duration: 0.0,
            },
        })
    }
}

/// A [`SearchClient`] returning a canned response or error.
#[derive(Debug)]
pub struct ScriptedSearch {
    response: std::result::Result<serde_json::Value, String>,
    delay: Duration,
    calls: Mutex<Vec<(String, usize, String)>>,
}

impl ScriptedSearch {
    /// Succeeds with `response`.
    #[must_use]
    pub fn ok(response: serde_json::Value) -> Self {
        Self {
            response: Ok(response),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fails with a search error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers after `ms` milliseconds.
    #[must_use]
    pub fn delayed(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    /// `(query, count, market)` of every call.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, usize, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SearchClient for ScriptedSearch {
    async fn search(&self, query: &str, count: usize, market: &str) -> Result<serde_json::Value> {
        self.calls
            .lock()
            .push((query.to_string(), count, market.to_string()));
        tokio::time::sleep(self.delay).await;
        self.response.clone().map_err(DeepSearchError::Search)
    }
}

/// A [`CompletionClient`] with a scripted selection answer and fragment
/// stream. Records every request.
#[derive(Debug)]
pub struct ScriptedCompletion {
    selection: String,
    fragments: Vec<String>,
    stream_error: Option<String>,
    start_error: Option<String>,
    stalls: bool,
    selection_delay: Duration,
    stream_start_delay: Duration,
    complete_requests: Mutex<Vec<CompletionRequest>>,
    stream_requests: Mutex<Vec<CompletionRequest>>,
}

impl Default for ScriptedCompletion {
    fn default() -> Self {
        Self {
            selection: r#"{"selected_urls": []}"#.to_string(),
            fragments: Vec::new(),
            stream_error: None,
            start_error: None,
            stalls: false,
            selection_delay: Duration::ZERO,
            stream_start_delay: Duration::ZERO,
            complete_requests: Mutex::new(Vec::new()),
            stream_requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedCompletion {
    /// Selects nothing and streams nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers selection calls by choosing `urls`.
    #[must_use]
    pub fn selecting(mut self, urls: &[&str]) -> Self {
        let choices: Vec<serde_json::Value> = urls
            .iter()
            .map(|url| serde_json::json!({"url": url, "reason": "relevant"}))
            .collect();
        self.selection = serde_json::json!({ "selected_urls": choices }).to_string();
        self
    }

    /// Answers selection calls with raw text.
    #[must_use]
    pub fn selection_text(mut self, text: impl Into<String>) -> Self {
        self.selection = text.into();
        self
    }

    /// Streams `fragments` in order.
    #[must_use]
    pub fn streaming(mut self, fragments: &[&str]) -> Self {
        self.fragments = fragments.iter().map(|f| (*f).to_string()).collect();
        self
    }

    /// Ends the stream with an error after the scripted fragments.
    #[must_use]
    pub fn failing_stream_after(mut self, message: impl Into<String>) -> Self {
        self.stream_error = Some(message.into());
        self
    }

    /// Fails before the stream opens.
    #[must_use]
    pub fn failing_stream_start(mut self, message: impl Into<String>) -> Self {
        self.start_error = Some(message.into());
        self
    }

    /// Never ends the stream after the scripted fragments.
    #[must_use]
    pub fn stalling(mut self) -> Self {
        self.stalls = true;
        self
    }

    /// Answers selection calls after `ms` milliseconds.
    #[must_use]
    pub fn selection_delayed(mut self, ms: u64) -> Self {
        self.selection_delay = Duration::from_millis(ms);
        self
    }

    /// Opens the stream after `ms` milliseconds.
    #[must_use]
    pub fn stream_start_delayed(mut self, ms: u64) -> Self {
        self.stream_start_delay = Duration::from_millis(ms);
        self
    }

    /// Non-streaming requests received.
    #[must_use]
    pub fn complete_requests(&self) -> Vec<CompletionRequest> {
        self.complete_requests.lock().clone()
    }

    /// Streaming requests received.
    #[must_use]
    pub fn stream_requests(&self) -> Vec<CompletionRequest> {
        self.stream_requests.lock().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.complete_requests.lock().push(request);
        tokio::time::sleep(self.selection_delay).await;
        Ok(self.selection.clone())
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<FragmentStream> {
        self.stream_requests.lock().push(request);
        tokio::time::sleep(self.stream_start_delay).await;
        if let Some(message) = &self.start_error {
            return Err(DeepSearchError::Completion(message.clone()));
        }
        let mut items: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.stream_error {
            items.push(Err(DeepSearchError::Completion(message.clone())));
        }
        let scripted = futures::stream::iter(items);
        if self.stalls {
            Ok(Box::pin(scripted.chain(futures::stream::pending())))
        } else {
            Ok(Box::pin(scripted))
        }
    }
}
