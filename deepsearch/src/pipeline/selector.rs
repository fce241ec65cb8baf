//! Language-model ranking of search candidates.

use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

use crate::errors::{DeepSearchError, Result};
use crate::providers::{CompletionClient, CompletionRequest};
use crate::websearch::{SearchResult, UrlChoice};

static CODE_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$").ok());

#[derive(Debug, Deserialize)]
struct SelectionResponse {
    #[serde(default)]
    selected_urls: Vec<UrlChoice>,
}

/// Builds the ranking instruction for a selection of up to `quantity` URLs.
#[must_use]
pub fn selection_instruction(quantity: usize) -> String {
    format!(
        "Please select up to {quantity} URLs from the provided list that best answer the query. \
Provide reasons for your selection along with each of the URLs selected in JSON format.
Example format:
{{
    \"selected_urls\": [
        {{\"url\": \"URL1\", \"reason\": \"Reason1\"}},
        {{\"url\": \"URL2\", \"reason\": \"Reason2\"}}
    ]
}}"
    )
}

/// Builds the user message listing the query and every candidate.
#[must_use]
pub fn selection_message(query: &str, candidates: &[SearchResult]) -> String {
    let listing = candidates
        .iter()
        .map(|c| {
            serde_json::json!({"url": c.url, "title": c.title, "snippet": c.snippet}).to_string()
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("Query: {query}\n\nURLs:\n{listing}")
}

/// Parses the model's answer into at most `limit` choices.
///
/// Markdown code fences around the JSON are tolerated. A missing
/// `selected_urls` key is an empty selection.
///
/// # Errors
///
/// [`DeepSearchError::Selection`] when the text is not a JSON object of the
/// expected shape.
pub fn parse_selection(raw: &str, limit: usize) -> Result<Vec<UrlChoice>> {
    let body = CODE_FENCE
        .as_ref()
        .and_then(|re| re.captures(raw))
        .and_then(|caps| caps.get(1))
        .map_or(raw, |m| m.as_str());

    let response: SelectionResponse = serde_json::from_str(body.trim())
        .map_err(|e| DeepSearchError::Selection(format!("unparseable selection: {e}")))?;

    let mut choices = response.selected_urls;
    choices.truncate(limit);
    Ok(choices)
}

/// Asks a completion model which candidates best answer a query.
#[derive(Clone)]
pub struct UrlSelector {
    client: Arc<dyn CompletionClient>,
}

impl UrlSelector {
    /// Creates a selector over the given completion client.
    #[must_use]
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Picks up to `quantity` candidate URLs.
    ///
    /// # Errors
    ///
    /// [`DeepSearchError::Selection`] when the model call fails or its answer
    /// cannot be parsed.
    pub async fn select(
        &self,
        query: &str,
        candidates: &[SearchResult],
        model: &str,
        max_tokens: u32,
        quantity: usize,
    ) -> Result<Vec<UrlChoice>> {
        let request = CompletionRequest::new(
            selection_instruction(quantity),
            selection_message(query, candidates),
            model,
            max_tokens,
        )
        .json();

        let raw = self.client.complete(request).await.map_err(|e| match e {
            DeepSearchError::Selection(_) => e,
            other => DeepSearchError::Selection(other.to_string()),
        })?;
        debug!(response_len = raw.len(), "Selection response received");

        let choices = parse_selection(&raw, quantity)?;
        info!(
            candidates = candidates.len(),
            selected = choices.len(),
            "URLs selected"
        );
        Ok(choices)
    }
}

impl std::fmt::Debug for UrlSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSelector").finish_non_exhaustive()
    }
}
