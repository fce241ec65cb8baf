//! Answer prompt assembly.

use crate::websearch::{FetchedContent, SearchResult};

/// Builds the user message from fetched pages: one `title url content` line
/// per page, in retrieval order.
#[must_use]
pub fn build_user_message(query: &str, contents: &[FetchedContent]) -> String {
    let context = contents
        .iter()
        .map(|c| format!("{} {} {}", c.title, c.url, c.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!("User Message: {query}\nContextual Content: {context}")
}

/// Builds the user message from search snippets when no page was fetched.
#[must_use]
pub fn build_snippet_message(query: &str, results: &[SearchResult]) -> String {
    let context = results
        .iter()
        .map(|r| format!("{} {} {}", r.title, r.url, r.snippet))
        .collect::<Vec<_>>()
        .join("\n");
    format!("User Message: {query}\nContextual Content: {context}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(title: &str, url: &str, content: &str) -> FetchedContent {
        FetchedContent {
            title: title.into(),
            url: url.into(),
            content: content.into(),
            snippet: String::new(),
        }
    }

    #[test]
    fn test_user_message_layout() {
        let message = build_user_message(
            "weather today",
            &[
                page("Forecast", "https://a.test", "sunny"),
                page("Radar", "https://b.test", "clear"),
            ],
        );
        assert_eq!(
            message,
            "User Message: weather today\nContextual Content: Forecast https://a.test sunny\nRadar https://b.test clear"
        );
    }

    #[test]
    fn test_user_message_without_pages() {
        assert_eq!(build_user_message("q", &[]), "User Message: q\nContextual Content: ");
    }

    #[test]
    fn test_snippet_message() {
        let message = build_snippet_message(
            "q",
            &[SearchResult::new("https://a.test", "A", "alpha")],
        );
        assert_eq!(message, "User Message: q\nContextual Content: A https://a.test alpha");
    }
}
