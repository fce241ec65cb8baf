//! Per-request run configuration.

use serde::{Deserialize, Serialize};

use crate::errors::{DeepSearchError, Result};

/// Effective configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Model used for answer generation.
    #[serde(default = "default_model")]
    pub set_model: String,
    /// Answer token budget.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Number of search results requested from the provider.
    #[serde(default = "default_initial_search_results")]
    pub initial_search_results: usize,
    /// Maximum number of URLs the selector may pick.
    #[serde(default = "default_deep_search_quantity")]
    pub deep_search_quantity: usize,
    /// Model used for URL selection.
    #[serde(default = "default_model")]
    pub deep_search_model: String,
    /// Select and fetch pages. When off, the answer is built from snippets.
    #[serde(default = "default_true")]
    pub deep_search: bool,
    /// Stop after fetching; no answer is generated.
    #[serde(default)]
    pub context_only: bool,
    /// Emit a status line counting pages that could not be loaded.
    #[serde(default)]
    pub report_fetch_failures: bool,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_initial_search_results() -> usize {
    5
}

fn default_deep_search_quantity() -> usize {
    3
}

fn default_true() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            set_model: default_model(),
            max_tokens: default_max_tokens(),
            initial_search_results: default_initial_search_results(),
            deep_search_quantity: default_deep_search_quantity(),
            deep_search_model: default_model(),
            deep_search: true,
            context_only: false,
            report_fetch_failures: false,
        }
    }
}

impl RunConfig {
    /// Sets the selection count.
    #[must_use]
    pub fn with_deep_search_quantity(mut self, quantity: usize) -> Self {
        self.deep_search_quantity = quantity;
        self
    }

    /// Sets the search breadth.
    #[must_use]
    pub fn with_initial_search_results(mut self, count: usize) -> Self {
        self.initial_search_results = count;
        self
    }

    /// Enables or disables deep search.
    #[must_use]
    pub fn with_deep_search(mut self, enabled: bool) -> Self {
        self.deep_search = enabled;
        self
    }

    /// Enables or disables context-only runs.
    #[must_use]
    pub fn with_context_only(mut self, enabled: bool) -> Self {
        self.context_only = enabled;
        self
    }

    /// Enables or disables the fetch-failure status line.
    #[must_use]
    pub fn with_report_fetch_failures(mut self, enabled: bool) -> Self {
        self.report_fetch_failures = enabled;
        self
    }

    /// Checks the numeric limits.
    ///
    /// # Errors
    ///
    /// [`DeepSearchError::Config`] when a count or the token budget is zero,
    /// or a model name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(DeepSearchError::Config("max_tokens must be at least 1".into()));
        }
        if self.initial_search_results == 0 {
            return Err(DeepSearchError::Config(
                "initial_search_results must be at least 1".into(),
            ));
        }
        if self.deep_search_quantity == 0 {
            return Err(DeepSearchError::Config(
                "deep_search_quantity must be at least 1".into(),
            ));
        }
        if self.set_model.trim().is_empty() || self.deep_search_model.trim().is_empty() {
            return Err(DeepSearchError::Config("model names must not be empty".into()));
        }
        Ok(())
    }

    /// The configuration as echoed in `initial_response`.
    #[must_use]
    pub fn headers(&self) -> RunHeaders {
        RunHeaders {
            set_model: self.set_model.clone(),
            max_tokens: self.max_tokens,
            initial_search_results: self.initial_search_results,
            deep_search_quantity: self.deep_search_quantity,
            deep_search_model: self.deep_search_model.clone(),
            deep_search: self.deep_search,
            context_only: self.context_only,
        }
    }
}

/// Wire form of [`RunConfig`] under the `Headers` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHeaders {
    /// Answer model.
    #[serde(rename = "Set-Model")]
    pub set_model: String,
    /// Answer token budget.
    #[serde(rename = "Max-Tokens")]
    pub max_tokens: u32,
    /// Search breadth.
    #[serde(rename = "Initial-Search-Results")]
    pub initial_search_results: usize,
    /// Selection count.
    #[serde(rename = "Deep-Search-Quantity")]
    pub deep_search_quantity: usize,
    /// Selection model.
    #[serde(rename = "Deep-Search-Model")]
    pub deep_search_model: String,
    /// Whether pages are selected and fetched.
    #[serde(rename = "Deep-Search")]
    pub deep_search: bool,
    /// Whether answer generation is skipped.
    #[serde(rename = "Context-Only")]
    pub context_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.set_model, "gpt-4o");
        assert_eq!(config.max_tokens, 1000);
        assert_eq!(config.initial_search_results, 5);
        assert_eq!(config.deep_search_quantity, 3);
        assert!(config.deep_search);
        assert!(!config.context_only);
        assert!(!config.report_fetch_failures);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{"context_only": true}"#).unwrap();
        assert!(config.context_only);
        assert_eq!(config.deep_search_quantity, 3);
        assert!(config.deep_search);
    }

    #[test]
    fn test_validate_rejects_zero_counts() {
        assert!(RunConfig::default().with_deep_search_quantity(0).validate().is_err());
        assert!(RunConfig::default().with_initial_search_results(0).validate().is_err());
        let config = RunConfig {
            max_tokens: 0,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(DeepSearchError::Config(_))));
    }

    #[test]
    fn test_headers_wire_names() {
        let value = serde_json::to_value(RunConfig::default().headers()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "Set-Model": "gpt-4o",
                "Max-Tokens": 1000,
                "Initial-Search-Results": 5,
                "Deep-Search-Quantity": 3,
                "Deep-Search-Model": "gpt-4o",
                "Deep-Search": true,
                "Context-Only": false
            })
        );
    }
}
