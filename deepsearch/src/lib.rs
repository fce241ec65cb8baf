//! # Deepsearch
//!
//! Retrieval-augmented web search with a streamed answer.
//!
//! A query flows through a fixed sequence of stages:
//!
//! - **Search**: a web search provider returns ranked results
//! - **Selection**: a language model picks the most relevant URLs
//! - **Retrieval**: the chosen pages are fetched and cleaned concurrently
//! - **Generation**: an answer is streamed back fragment by fragment
//!
//! Progress and answer fragments are multiplexed into one ordered stream of
//! newline-delimited JSON events.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use deepsearch::prelude::*;
//!
//! let config = load_config(None)?;
//! let pipeline = Arc::new(build_pipeline(&config)?);
//! let (mut events, _run) = pipeline.spawn("weather today");
//! while let Some(event) = events.recv().await {
//!     print!("{}", event.to_line()?);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod providers;
pub mod server;
pub mod testing;
pub mod websearch;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{load_config, ServiceConfig, StageTimeouts};
    pub use crate::errors::{DeepSearchError, Result};
    pub use crate::events::{
        ChannelEventSink, CollectingEventSink, EventSink, PipelineEvent,
    };
    pub use crate::pipeline::{PipelineOrchestrator, PipelineState, RunConfig, RunReport};
    pub use crate::providers::{CompletionClient, SearchClient};
    pub use crate::server::{build_pipeline, router};
    pub use crate::websearch::{
        ConcurrentRetriever, FetchConfig, FetchedContent, PageFetcher, SearchResult, SelectedUrl,
    };
}
