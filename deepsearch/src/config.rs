//! Service configuration.
//!
//! Layered with `figment`: built-in defaults, then an optional TOML file, then
//! `DEEPSEARCH_`-prefixed environment variables (`__` separates nested keys),
//! then the provider credentials under their conventional variable names.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::errors::{DeepSearchError, Result};
use crate::pipeline::RunConfig;
use crate::providers::{BingConfig, OpenAiConfig};
use crate::websearch::FetchConfig;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "deepsearch.toml";

/// Time budgets of the pipeline stages that call external services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTimeouts {
    /// Search provider call.
    #[serde(default = "default_search_seconds")]
    pub search_seconds: f64,
    /// URL selection call.
    #[serde(default = "default_model_seconds")]
    pub selection_seconds: f64,
    /// Time until the answer stream is open.
    #[serde(default = "default_model_seconds")]
    pub completion_start_seconds: f64,
    /// Longest gap allowed between two answer fragments.
    #[serde(default = "default_model_seconds")]
    pub fragment_idle_seconds: f64,
}

fn default_search_seconds() -> f64 {
    15.0
}

fn default_model_seconds() -> f64 {
    60.0
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            search_seconds: default_search_seconds(),
            selection_seconds: default_model_seconds(),
            completion_start_seconds: default_model_seconds(),
            fragment_idle_seconds: default_model_seconds(),
        }
    }
}

impl StageTimeouts {
    /// Sets every budget to `seconds`.
    #[must_use]
    pub fn uniform(seconds: f64) -> Self {
        Self {
            search_seconds: seconds,
            selection_seconds: seconds,
            completion_start_seconds: seconds,
            fragment_idle_seconds: seconds,
        }
    }

    /// Search budget.
    #[must_use]
    pub fn search(&self) -> Duration {
        budget(self.search_seconds)
    }

    /// Selection budget.
    #[must_use]
    pub fn selection(&self) -> Duration {
        budget(self.selection_seconds)
    }

    /// Completion start budget.
    #[must_use]
    pub fn completion_start(&self) -> Duration {
        budget(self.completion_start_seconds)
    }

    /// Fragment idle budget.
    #[must_use]
    pub fn fragment_idle(&self) -> Duration {
        budget(self.fragment_idle_seconds)
    }

    /// Rejects budgets that are not positive and finite.
    ///
    /// # Errors
    ///
    /// [`DeepSearchError::Config`] if any budget is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.all().iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(DeepSearchError::Config(
                "stage timeouts must be positive".into(),
            ));
        }
        Ok(())
    }

    fn all(&self) -> [f64; 4] {
        [
            self.search_seconds,
            self.selection_seconds,
            self.completion_start_seconds,
            self.fragment_idle_seconds,
        ]
    }
}

fn budget(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO)
}

/// Process-wide, immutable service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Listen address of the HTTP server.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Search market passed to the provider.
    #[serde(default = "default_market")]
    pub market: String,
    /// File holding the answer system prompt.
    #[serde(default = "default_system_prompt_path")]
    pub system_prompt_path: PathBuf,
    /// Allow cross-origin requests.
    #[serde(default = "default_cors")]
    pub cors: bool,
    /// Completion API settings.
    #[serde(default)]
    pub openai: OpenAiConfig,
    /// Search API settings.
    #[serde(default)]
    pub bing: BingConfig,
    /// Page fetching settings.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Stage time budgets.
    #[serde(default)]
    pub timeouts: StageTimeouts,
    /// Run configuration applied to every request.
    #[serde(default)]
    pub run: RunConfig,
}

fn default_bind() -> String {
    "0.0.0.0:5001".to_string()
}

fn default_market() -> String {
    "en-US".to_string()
}

fn default_system_prompt_path() -> PathBuf {
    PathBuf::from("prompts/sysprompt.txt")
}

fn default_cors() -> bool {
    true
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            market: default_market(),
            system_prompt_path: default_system_prompt_path(),
            cors: default_cors(),
            openai: OpenAiConfig::default(),
            bing: BingConfig::default(),
            fetch: FetchConfig::default(),
            timeouts: StageTimeouts::default(),
            run: RunConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Builds the layered figment without extracting it.
    ///
    /// `path` overrides the default file location; a missing file is skipped.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("DEEPSEARCH_").split("__"))
            .merge(
                Env::raw()
                    .only(&["OPENAI_API_KEY"])
                    .map(|_| "openai.api_key".into()),
            )
            .merge(
                Env::raw()
                    .only(&["BING_SUBSCRIPTION_KEY"])
                    .map(|_| "bing.subscription_key".into()),
            )
            .merge(
                Env::raw()
                    .only(&["CUSTOM_CONFIG_ID"])
                    .map(|_| "bing.custom_config_id".into()),
            )
    }

    /// Extracts and validates a configuration from `figment`.
    ///
    /// # Errors
    ///
    /// [`DeepSearchError::Config`] on extraction or validation failure.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| DeepSearchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that serde cannot.
    ///
    /// # Errors
    ///
    /// [`DeepSearchError::Config`] naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.run.validate()?;
        if self.fetch.max_concurrent == 0 {
            return Err(DeepSearchError::Config(
                "fetch.max_concurrent must be at least 1".into(),
            ));
        }
        if !(self.fetch.timeout_seconds.is_finite() && self.fetch.timeout_seconds > 0.0) {
            return Err(DeepSearchError::Config(
                "fetch.timeout_seconds must be positive".into(),
            ));
        }
        self.timeouts.validate()
    }
}

/// Loads the service configuration.
///
/// # Errors
///
/// [`DeepSearchError::Config`] if a layer is malformed or a value is invalid.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let config = ServiceConfig::from_figment(&ServiceConfig::figment(path))?;
    info!(
        bind = %config.bind,
        market = %config.market,
        max_concurrent = config.fetch.max_concurrent,
        "Configuration loaded"
    );
    Ok(config)
}

/// Reads the answer system prompt.
///
/// # Errors
///
/// [`DeepSearchError::Config`] if the file cannot be read.
pub fn load_system_prompt(path: &Path) -> Result<String> {
    let prompt = std::fs::read_to_string(path).map_err(|e| {
        DeepSearchError::Config(format!(
            "cannot read system prompt {}: {e}",
            path.display()
        ))
    })?;
    info!(path = %path.display(), chars = prompt.len(), "System prompt loaded");
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.bind, "0.0.0.0:5001");
        assert_eq!(config.market, "en-US");
        assert!(config.cors);
        assert_eq!(config.fetch.max_concurrent, 10);
        assert_eq!(config.timeouts.search(), Duration::from_secs(15));
        assert_eq!(config.timeouts.fragment_idle(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "market = \"en-GB\"\n\n[fetch]\nmax_concurrent = 4\n\n[run]\ncontext_only = true\n\n[timeouts]\nsearch_seconds = 2.5"
        )
        .unwrap();

        let config = ServiceConfig::from_figment(&ServiceConfig::figment(Some(file.path()))).unwrap();
        assert_eq!(config.market, "en-GB");
        assert_eq!(config.fetch.max_concurrent, 4);
        assert_eq!(config.fetch.timeout_seconds, 5.0);
        assert!(config.run.context_only);
        assert_eq!(config.run.deep_search_quantity, 3);
        assert_eq!(config.timeouts.search(), Duration::from_millis(2500));
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let figment = ServiceConfig::figment(Some(&dir.path().join("absent.toml")));
        let config = ServiceConfig::from_figment(&figment).unwrap();
        assert_eq!(config.bind, "0.0.0.0:5001");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = ServiceConfig::default();
        config.fetch.max_concurrent = 0;
        assert!(matches!(config.validate(), Err(DeepSearchError::Config(_))));

        let mut config = ServiceConfig::default();
        config.timeouts.selection_seconds = 0.0;
        assert!(config.validate().is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[run]\ndeep_search_quantity = 0").unwrap();
        assert!(ServiceConfig::from_figment(&ServiceConfig::figment(Some(file.path()))).is_err());
    }

    #[test]
    fn test_invalid_stage_timeouts_do_not_panic() {
        let timeouts = StageTimeouts::uniform(-1.0);
        assert_eq!(timeouts.search(), Duration::ZERO);
        assert!(timeouts.validate().is_err());

        let timeouts = StageTimeouts::uniform(f64::NAN);
        assert_eq!(timeouts.fragment_idle(), Duration::ZERO);
        assert!(timeouts.validate().is_err());

        assert!(StageTimeouts::uniform(0.5).validate().is_ok());
    }

    #[test]
    fn test_load_system_prompt() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "You are helpful.").unwrap();
        assert_eq!(load_system_prompt(file.path()).unwrap(), "You are helpful.");

        let dir = tempfile::tempdir().unwrap();
        let err = load_system_prompt(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, DeepSearchError::Config(ref m) if m.contains("missing.txt")));
    }
}
