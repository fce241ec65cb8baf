//! Data models for search results, URL selections and fetched pages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Placeholder for a result without a title.
pub const NO_TITLE: &str = "No title provided";
/// Placeholder for a result without a snippet.
pub const NO_SNIPPET: &str = "No snippet provided";

/// One flattened search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result URL, unique within one request.
    pub url: String,
    /// Result title.
    #[serde(rename = "name")]
    pub title: String,
    /// Result snippet.
    pub snippet: String,
}

impl SearchResult {
    /// Creates a new search result.
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }
}

/// Read-only lookup of the candidates of one request, keyed by URL.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    by_url: HashMap<String, SearchResult>,
}

impl CandidateSet {
    /// Builds the set. On duplicate URLs the first occurrence wins.
    #[must_use]
    pub fn from_results(results: &[SearchResult]) -> Self {
        let mut by_url = HashMap::with_capacity(results.len());
        for result in results {
            by_url
                .entry(result.url.clone())
                .or_insert_with(|| result.clone());
        }
        Self { by_url }
    }

    /// Looks up a candidate.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<&SearchResult> {
        self.by_url.get(url)
    }

    /// Whether the URL is a candidate.
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.by_url.contains_key(url)
    }

    /// Number of distinct candidate URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    /// Whether there are no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }
}

/// A URL picked by the selector, as returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlChoice {
    /// Chosen URL.
    pub url: String,
    /// Why the model chose it.
    #[serde(default)]
    pub reason: String,
}

/// A selected URL enriched with its candidate metadata.
///
/// `title` and `snippet` are empty when the selector returned a URL that was
/// not among the candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedUrl {
    /// Chosen URL.
    pub url: String,
    /// Selection rationale.
    pub reason: String,
    /// Candidate title, or empty.
    pub title: String,
    /// Candidate snippet, or empty.
    pub snippet: String,
}

/// Cleaned text of one successfully fetched page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedContent {
    /// Page title from the search result.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Whitespace-normalized visible text.
    pub content: String,
    /// Search snippet.
    pub snippet: String,
}

impl FetchedContent {
    /// Combines a selection with the text fetched for it.
    #[must_use]
    pub fn from_selection(selected: &SelectedUrl, content: String) -> Self {
        Self {
            title: non_empty_or(&selected.title, NO_TITLE),
            url: selected.url.clone(),
            content,
            snippet: non_empty_or(&selected.snippet, NO_SNIPPET),
        }
    }
}

fn non_empty_or(value: &str, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_set_first_occurrence_wins() {
        let results = vec![
            SearchResult::new("https://a.test", "First", "one"),
            SearchResult::new("https://b.test", "B", "two"),
            SearchResult::new("https://a.test", "Second", "three"),
        ];
        let set = CandidateSet::from_results(&results);

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("https://a.test").map(|r| r.title.as_str()), Some("First"));
        assert!(set.contains("https://b.test"));
        assert!(!set.contains("https://c.test"));
    }

    #[test]
    fn test_fetched_content_placeholders() {
        let selected = SelectedUrl {
            url: "https://unknown.test".to_string(),
            reason: "looked useful".to_string(),
            title: String::new(),
            snippet: String::new(),
        };
        let content = FetchedContent::from_selection(&selected, "body".to_string());

        assert_eq!(content.title, NO_TITLE);
        assert_eq!(content.snippet, NO_SNIPPET);
        assert_eq!(content.url, "https://unknown.test");
        assert_eq!(content.content, "body");
    }

    #[test]
    fn test_url_choice_reason_optional() {
        let choice: UrlChoice = serde_json::from_str(r#"{"url": "https://a.test"}"#).unwrap();
        assert_eq!(choice.reason, "");
    }

    #[test]
    fn test_search_result_serializes_title_as_name() {
        let value = serde_json::to_value(SearchResult::new("u", "t", "s")).unwrap();
        assert_eq!(value, serde_json::json!({"url": "u", "name": "t", "snippet": "s"}));
    }
}
