//! Per-fetch timing records and aggregate latency.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current wall-clock time as fractional seconds since the Unix epoch.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Timing of one successful page fetch. All values are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    /// The fetched URL.
    pub url: String,
    /// When the HTTP request started (Unix seconds).
    pub fetch_start: f64,
    /// How long the HTTP request took.
    pub fetch_duration: f64,
    /// When HTML cleaning started (Unix seconds).
    pub parse_start: f64,
    /// How long HTML cleaning took.
    pub parse_duration: f64,
}

impl TimingRecord {
    /// When HTML cleaning finished.
    #[must_use]
    pub fn parse_end(&self) -> f64 {
        self.parse_start + self.parse_duration
    }
}

/// Wall-clock span covered by a batch of fetches:
/// `max(parse_end) - min(fetch_start)`, or `0.0` for an empty batch.
#[must_use]
pub fn aggregate_duration(records: &[TimingRecord]) -> f64 {
    let Some(earliest_start) = records
        .iter()
        .map(|r| r.fetch_start)
        .min_by(f64::total_cmp)
    else {
        return 0.0;
    };
    let latest_end = records
        .iter()
        .map(TimingRecord::parse_end)
        .max_by(f64::total_cmp)
        .unwrap_or(earliest_start);
    latest_end - earliest_start
}

/// Durations of the pipeline stages of one run, in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageTimings {
    /// Search provider call.
    pub search_ms: Option<f64>,
    /// URL selection call.
    pub selection_ms: Option<f64>,
    /// Aggregate page retrieval span.
    pub retrieval_ms: Option<f64>,
    /// Prompt assembly.
    pub prompt_ms: Option<f64>,
    /// Answer streaming, first request to last fragment.
    pub generation_ms: Option<f64>,
}

impl StageTimings {
    /// Sum of all recorded stages.
    #[must_use]
    pub fn total_ms(&self) -> f64 {
        [
            self.search_ms,
            self.selection_ms,
            self.retrieval_ms,
            self.prompt_ms,
            self.generation_ms,
        ]
        .into_iter()
        .flatten()
        .sum()
    }
}
