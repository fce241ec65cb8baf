//! Testing utilities for deepsearch pipelines.
//!
//! This module provides:
//! - Scripted search, completion and page-fetching collaborators
//! - A canned provider search response
//!
//! The collecting event sink lives in [`crate::events`].

mod mocks;

pub use mocks::{
    search_response, ScriptedCompletion, ScriptedFetcher, ScriptedPage, ScriptedSearch,
};
