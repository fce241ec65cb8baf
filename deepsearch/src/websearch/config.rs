//! Configuration for page fetching.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Browser User-Agent strings rotated across retrieval batches.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (Linux; Android 10; SM-G973F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/89.0.4389.105 Mobile Safari/537.36",
];

/// Configuration for HTTP page fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-page timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// Maximum number of pages fetched at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// User-Agent rotation pool.
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
    /// Value of the `Accept` header.
    #[serde(default = "default_accept")]
    pub accept: String,
}

fn default_timeout() -> f64 {
    5.0
}

fn default_max_concurrent() -> usize {
    10
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agents() -> Vec<String> {
    DEFAULT_USER_AGENTS.iter().map(|ua| (*ua).to_string()).collect()
}

fn default_accept() -> String {
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_concurrent: default_max_concurrent(),
            max_redirects: default_max_redirects(),
            user_agents: default_user_agents(),
            accept: default_accept(),
        }
    }
}

impl FetchConfig {
    /// Creates a new fetch configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the worker pool size.
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds.max(0.0))
    }

    /// Picks a User-Agent from the rotation pool.
    #[must_use]
    pub fn random_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map_or(DEFAULT_USER_AGENTS[0], String::as_str)
    }

    /// Header set shared by every request of one retrieval batch.
    #[must_use]
    pub fn request_headers(&self) -> HashMap<String, String> {
        HashMap::from([
            ("User-Agent".to_string(), self.random_user_agent().to_string()),
            ("Accept".to_string(), self.accept.clone()),
        ])
    }
}
