//! Page acquisition: search result flattening, HTML cleaning and the bounded
//! concurrent retriever.
//!
//! This module provides:
//! - Data models for search results, selections and fetched pages
//! - Visible-text extraction from HTML
//! - An HTTP page fetcher with User-Agent rotation
//! - The concurrent retriever with per-URL failure isolation

mod config;
mod extract;
mod fetcher;
mod models;
mod protocols;
mod retriever;
mod run_utils;

pub use config::{FetchConfig, DEFAULT_USER_AGENTS};
pub use extract::{clean_html, normalize_whitespace};
pub use fetcher::HttpPageFetcher;
pub use models::{
    CandidateSet, FetchedContent, SearchResult, SelectedUrl, UrlChoice, NO_SNIPPET, NO_TITLE,
};
pub use protocols::{FetchedPage, PageFetcher};
pub use retriever::{ConcurrentRetriever, RetrievalOutcome};
pub use run_utils::{extract_urls, merge_selection};
