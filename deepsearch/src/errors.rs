//! Error types for the deepsearch pipeline.
//!
//! Per-URL failures ([`DeepSearchError::Fetch`], [`DeepSearchError::Parse`])
//! never leave the retriever. Every other variant ends a pipeline run with a
//! single `error` event.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, DeepSearchError>;

/// The main error type for deepsearch operations.
#[derive(Debug, Error)]
pub enum DeepSearchError {
    /// The search provider call failed or returned an unusable response.
    #[error("Search failed: {0}")]
    Search(String),

    /// URL selection failed, either at the provider or while parsing its answer.
    #[error("URL selection failed: {0}")]
    Selection(String),

    /// A single page could not be retrieved.
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        /// The URL that was being fetched.
        url: String,
        /// What went wrong.
        message: String,
    },

    /// A single page could not be turned into text.
    #[error("Parse failed for {url}: {message}")]
    Parse {
        /// The URL whose body was being parsed.
        url: String,
        /// What went wrong.
        message: String,
    },

    /// The answer completion call or its stream failed.
    #[error("Completion failed: {0}")]
    Completion(String),

    /// A stage exceeded its time budget.
    #[error("{stage} timed out after {seconds:.1}s")]
    Timeout {
        /// Stage name.
        stage: &'static str,
        /// Budget in seconds.
        seconds: f64,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeepSearchError {
    /// Creates a fetch error for `url`.
    pub fn fetch(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Creates a parse error for `url`.
    pub fn parse(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error is confined to a single page and must not abort a run.
    #[must_use]
    pub fn is_page_local(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Parse { .. })
    }

    /// Short machine-friendly name of the error kind, used in log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Search(_) => "search",
            Self::Selection(_) => "selection",
            Self::Fetch { .. } => "fetch",
            Self::Parse { .. } => "parse",
            Self::Completion(_) => "completion",
            Self::Timeout { .. } => "timeout",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_local_errors() {
        assert!(DeepSearchError::fetch("https://a.test", "timeout").is_page_local());
        assert!(DeepSearchError::parse("https://a.test", "boom").is_page_local());
        assert!(!DeepSearchError::Search("down".into()).is_page_local());
        assert!(!DeepSearchError::Completion("eof".into()).is_page_local());
    }

    #[test]
    fn test_error_display() {
        let err = DeepSearchError::fetch("https://a.test", "HTTP 404");
        assert_eq!(err.to_string(), "Fetch failed for https://a.test: HTTP 404");

        let err = DeepSearchError::Timeout {
            stage: "search",
            seconds: 15.0,
        };
        assert_eq!(err.to_string(), "search timed out after 15.0s");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(DeepSearchError::Selection("bad json".into()).kind(), "selection");
        let io = DeepSearchError::from(std::io::Error::new(std::io::ErrorKind::Other, "x"));
        assert_eq!(io.kind(), "io");
    }
}
