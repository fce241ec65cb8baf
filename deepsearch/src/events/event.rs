//! The event type written to the outbound stream.

use serde::{Deserialize, Serialize};

use crate::pipeline::RunHeaders;

/// Status text emitted right before URL selection.
pub const STATUS_SELECTING: &str = "Determining which results to leverage";
/// Status text emitted when page retrieval starts.
pub const STATUS_FETCHING: &str = "Visiting pages and reading contents";
/// Status text emitted when answer generation starts.
pub const STATUS_GENERATING: &str = "Generating response...";

/// Payload of the first event of every successful search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialResponse {
    /// The query exactly as received.
    #[serde(rename = "User Query")]
    pub user_query: String,
    /// Raw search provider response.
    #[serde(rename = "Bing Search Results")]
    pub search_results: serde_json::Value,
    /// Effective run configuration.
    #[serde(rename = "Headers")]
    pub headers: RunHeaders,
}

/// One unit of the outbound stream.
///
/// Serializes as `{"event": <tag>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Search results and run configuration.
    InitialResponse(InitialResponse),
    /// Stage transition notice.
    ProcessingStatus {
        /// Human-readable status line.
        status: String,
    },
    /// One page finished processing. Carries the page title under `url`.
    UrlProcessed {
        /// Page title.
        url: String,
    },
    /// One answer fragment.
    AiResponse {
        /// Fragment text.
        content: String,
    },
    /// Fatal run failure.
    Error {
        /// Human-readable message.
        message: String,
    },
}

impl PipelineEvent {
    /// Creates a `processing_status` event.
    pub fn status(status: impl Into<String>) -> Self {
        Self::ProcessingStatus {
            status: status.into(),
        }
    }

    /// Creates a `url_processed` event for a page title.
    pub fn url_processed(title: impl Into<String>) -> Self {
        Self::UrlProcessed { url: title.into() }
    }

    /// Creates an `ai_response` event.
    pub fn ai_response(content: impl Into<String>) -> Self {
        Self::AiResponse {
            content: content.into(),
        }
    }

    /// Creates an `error` event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// The wire tag of this event.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::InitialResponse(_) => "initial_response",
            Self::ProcessingStatus { .. } => "processing_status",
            Self::UrlProcessed { .. } => "url_processed",
            Self::AiResponse { .. } => "ai_response",
            Self::Error { .. } => "error",
        }
    }

    /// Encodes the event as one newline-terminated JSON line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
