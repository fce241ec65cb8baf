//! Visible-text extraction from HTML.
//!
//! Parses with the lenient html5ever-based parser from `scraper`, skips
//! boilerplate subtrees and flattens the remaining text under `<body>`.

use scraper::{ElementRef, Html, Selector};

/// Elements whose whole subtree is dropped.
const NOISE_TAGS: &[&str] = &["header", "nav", "footer", "aside", "script", "style"];

/// Class fragments marking overlay containers.
const NOISE_CLASS_MARKERS: &[&str] = &["modal", "popup", "overlay"];

/// Reduces an HTML document to clean, single-spaced visible text.
///
/// Malformed markup is recovered by the parser, so this never fails; a page
/// without body text yields an empty string.
#[must_use]
pub fn clean_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(body_selector) = Selector::parse("body") else {
        return String::new();
    };

    let mut fragments = Vec::new();
    for body in document.select(&body_selector) {
        collect_text(body, &mut fragments);
    }
    normalize_whitespace(&fragments.join(" "))
}

fn collect_text<'a>(element: ElementRef<'a>, out: &mut Vec<&'a str>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if !is_noise(child_element) {
                collect_text(child_element, out);
            }
        }
    }
}

fn is_noise(element: ElementRef<'_>) -> bool {
    let value = element.value();
    if NOISE_TAGS.contains(&value.name()) {
        return true;
    }
    value
        .attr("class")
        .is_some_and(|class| NOISE_CLASS_MARKERS.iter().any(|marker| class.contains(marker)))
}

/// Collapses every whitespace run to a single space and trims both ends.
///
/// Idempotent: normalizing already-normalized text returns it unchanged.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
