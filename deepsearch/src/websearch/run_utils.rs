//! Helpers that shape search and selection data for the retriever.

use serde_json::Value;

use super::models::{CandidateSet, SearchResult, SelectedUrl, UrlChoice, NO_SNIPPET, NO_TITLE};

/// Flattens a search provider response into an ordered result list.
///
/// Every entry of `webPages.value` yields one result, immediately followed by
/// one result per entry of its `deepLinks`. Missing names and snippets get
/// placeholders; entries without a URL are skipped.
#[must_use]
pub fn extract_urls(response: &Value) -> Vec<SearchResult> {
    let Some(pages) = response
        .get("webPages")
        .and_then(|w| w.get("value"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut results = Vec::new();
    for page in pages {
        results.extend(result_from_entry(page));
        if let Some(deep_links) = page.get("deepLinks").and_then(Value::as_array) {
            results.extend(deep_links.iter().filter_map(result_from_entry));
        }
    }
    results
}

/// `None` for an entry without a URL: it can be neither selected nor fetched.
fn result_from_entry(entry: &Value) -> Option<SearchResult> {
    let url = entry.get("url").and_then(Value::as_str)?;
    let text_or = |key: &str, placeholder: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(placeholder)
            .to_string()
    };
    Some(SearchResult {
        url: url.to_string(),
        title: text_or("name", NO_TITLE),
        snippet: text_or("snippet", NO_SNIPPET),
    })
}

/// Joins the selector's choices with candidate metadata.
///
/// Choices are kept in order. A URL missing from the candidate set is kept
/// with an empty title and snippet.
#[must_use]
pub fn merge_selection(choices: Vec<UrlChoice>, candidates: &CandidateSet) -> Vec<SelectedUrl> {
    choices
        .into_iter()
        .map(|choice| {
            let (title, snippet) = candidates
                .get(&choice.url)
                .map(|c| (c.title.clone(), c.snippet.clone()))
                .unwrap_or_default();
            SelectedUrl {
                url: choice.url,
                reason: choice.reason,
                title,
                snippet,
            }
        })
        .collect()
}
