//! Clients for the external search and language-model services.
//!
//! The pipeline only sees the [`SearchClient`] and [`CompletionClient`]
//! traits; the HTTP implementations live in the submodules.

mod bing;
mod openai;
mod sse;

pub use bing::{BingConfig, BingSearchClient};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use sse::{SseEvent, SseLineParser};

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::errors::Result;

/// Lazy, finite, non-restartable sequence of answer fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Maps a query to a raw, provider-shaped result document.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Runs a web search.
    ///
    /// # Errors
    ///
    /// [`crate::errors::DeepSearchError::Search`] when the provider call fails.
    async fn search(&self, query: &str, count: usize, market: &str) -> Result<serde_json::Value>;
}

/// One chat-style completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// System instruction.
    pub system: String,
    /// User message.
    pub user: String,
    /// Model identifier.
    pub model: String,
    /// Answer token budget.
    pub max_tokens: u32,
    /// Ask for a JSON object response.
    pub json_mode: bool,
}

impl CompletionRequest {
    /// Creates a plain-text request.
    pub fn new(
        system: impl Into<String>,
        user: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            model: model.into(),
            max_tokens,
            json_mode: false,
        }
    }

    /// Requests a JSON object response.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Language-model completion service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the whole completion text.
    ///
    /// # Errors
    ///
    /// [`crate::errors::DeepSearchError::Completion`] when the call fails.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Starts a streamed completion.
    ///
    /// # Errors
    ///
    /// [`crate::errors::DeepSearchError::Completion`] when the call cannot be
    /// started. Failures after the first fragment arrive as stream items.
    async fn complete_stream(&self, request: CompletionRequest) -> Result<FragmentStream>;
}
