//! Service configuration, sourced from the environment or built in code.
//!
//! `from_env` loads a `.env` file when present and reads the variables the
//! original deployment used (`TX_LEGISLATURE_SESSION`, `INFERENCE_URL`,
//! `INFERENCE_KEY`, `INFERENCE_MODEL_ID`) plus tuning knobs; every value can
//! also be set programmatically through the `with_*` builders.

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::analysis::model::ModelConfig;
use crate::cache;
use crate::fetcher::FetcherConfig;
use crate::locator;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("missing required environment variable {name}")]
    #[diagnostic(
        code(billscope::config::missing_var),
        help("Set {name} or construct the configuration programmatically.")
    )]
    MissingVar { name: &'static str },

    #[error("environment variable {name} has an invalid value: {value:?}")]
    #[diagnostic(code(billscope::config::invalid_var))]
    InvalidVar { name: &'static str, value: String },
}

/// Everything the service needs to run.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Current legislative session applied when input carries none.
    pub session: String,
    /// Base URL of the publishing site.
    pub base_url: String,
    /// Default cache entry lifetime.
    pub cache_ttl: Duration,
    pub fetcher: FetcherConfig,
    pub model: ModelConfig,
    /// Bills whose probed Content-Length exceeds this go to a background
    /// worker instead of running inline.
    pub background_threshold_bytes: u64,
    /// How long a synchronous caller waits on an in-flight or background
    /// analysis before receiving a "still processing" reply.
    pub sync_wait: Duration,
    pub worker_count: usize,
}

impl ServiceConfig {
    pub fn new(model: ModelConfig) -> Self {
        Self {
            session: "89R".to_string(),
            base_url: locator::DEFAULT_BASE_URL.to_string(),
            cache_ttl: cache::DEFAULT_TTL,
            fetcher: FetcherConfig::default(),
            model,
            background_threshold_bytes: 1_048_576,
            sync_wait: Duration::from_secs(20),
            worker_count: 2,
        }
    }

    /// Build from environment variables, loading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let model = ModelConfig {
            endpoint: require("INFERENCE_URL")?,
            api_key: require("INFERENCE_KEY")?,
            model_id: require("INFERENCE_MODEL_ID")?,
            timeout: duration_var("INFERENCE_TIMEOUT_SECS", 120)?,
            max_retries: u32_var("INFERENCE_MAX_RETRIES", 2)?,
        };

        let mut config = Self::new(model);
        if let Ok(session) = std::env::var("TX_LEGISLATURE_SESSION") {
            if !session.trim().is_empty() {
                config.session = session.trim().to_uppercase();
            }
        }
        if let Ok(base_url) = std::env::var("TELICON_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.base_url = base_url.trim().to_string();
            }
        }
        config.cache_ttl = duration_var("BILL_CACHE_TTL_SECS", 86_400)?;
        config.fetcher.fetch_timeout = duration_var("FETCH_TIMEOUT_SECS", 60)?;
        config.fetcher.probe_timeout = duration_var("PROBE_TIMEOUT_SECS", 5)?;
        config.fetcher.attempts_per_url = u32_var("FETCH_ATTEMPTS_PER_URL", 2)?;
        config.background_threshold_bytes = u64_var("BACKGROUND_THRESHOLD_BYTES", 1_048_576)?;
        config.sync_wait = duration_var("SYNC_WAIT_SECS", 20)?;
        config.worker_count = u32_var("ANALYSIS_WORKERS", 2)? as usize;
        Ok(config)
    }

    #[must_use]
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = session.into();
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: FetcherConfig) -> Self {
        self.fetcher = fetcher;
        self
    }

    #[must_use]
    pub fn with_background_threshold(mut self, bytes: u64) -> Self {
        self.background_threshold_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_sync_wait(mut self, wait: Duration) -> Self {
        self.sync_wait = wait;
        self
    }

    #[must_use]
    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar { name }),
    }
}

fn u64_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidVar { name, value: raw }),
        Err(_) => Ok(default),
    }
}

fn u32_var(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidVar { name, value: raw }),
        Err(_) => Ok(default),
    }
}

fn duration_var(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(u64_var(name, default_secs)?))
}
