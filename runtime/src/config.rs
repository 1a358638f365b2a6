//! Pipeline configuration.
//!
//! Every section can be toggled and every field has a default, so an empty
//! TOML document is a valid configuration.
//!
//! # Example
//!
//! ```
//! use courier_runtime::config::PipelineConfig;
//!
//! let config = PipelineConfig::from_toml_str(
//!     r#"
//!     [cache]
//!     lifetime_secs = 300
//!     vary_headers = ["Accept"]
//!
//!     [retry]
//!     max_retries = 5
//!     backoff = "linear"
//!     "#,
//! )?;
//!
//! assert_eq!(config.cache.lifetime_secs, 300);
//! assert_eq!(config.retry.max_retries, 5);
//! assert!(config.history.enabled);
//! # Ok::<(), courier_runtime::config::ConfigError>(())
//! ```
//!
//! # Environment variables
//!
//! [`PipelineConfig::from_env`] starts from the defaults and applies any of:
//!
//! | Variable                          | Field                        |
//! |-----------------------------------|------------------------------|
//! | `COURIER_HISTORY_ENABLED`         | `history.enabled`            |
//! | `COURIER_HISTORY_JOURNAL_LIMIT`   | `history.journal_limit`      |
//! | `COURIER_CACHE_ENABLED`           | `cache.enabled`              |
//! | `COURIER_CACHE_LIFETIME_SECS`     | `cache.lifetime_secs`        |
//! | `COURIER_CACHE_FORCE`             | `cache.force_cache`          |
//! | `COURIER_CACHE_VARY_HEADERS`      | `cache.vary_headers` (comma separated) |
//! | `COURIER_RETRY_ENABLED`           | `retry.enabled`              |
//! | `COURIER_RETRY_MAX_RETRIES`       | `retry.max_retries`          |
//! | `COURIER_RETRY_INITIAL_DELAY_MS`  | `retry.initial_delay_ms`     |
//! | `COURIER_RETRY_MAX_DELAY_MS`      | `retry.max_delay_ms`         |
//! | `COURIER_RETRY_MULTIPLIER`        | `retry.multiplier`           |
//! | `COURIER_RETRY_BACKOFF`           | `retry.backoff`              |
//! | `COURIER_RETRY_JITTER`            | `retry.jitter`               |
//! | `COURIER_STATUS_CODE_ENABLED`     | `status_code.enabled`        |
//! | `COURIER_LOGGING_ENABLED`         | `logging.enabled`            |
//! | `COURIER_METRICS_ENABLED`         | `metrics.enabled`            |

use crate::retry::{Backoff, RetryPolicy};
use courier_core::journal::DEFAULT_JOURNAL_LIMIT;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The TOML document could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// An environment variable holds an unusable value
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv {
        /// Variable name
        var: String,
        /// Offending value
        value: String,
    },

    /// The configuration is inconsistent
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// History subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Register the history subscriber
    pub enabled: bool,
    /// Maximum number of journal entries
    pub journal_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            journal_limit: DEFAULT_JOURNAL_LIMIT,
        }
    }
}

/// Cache subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Register the cache subscriber
    pub enabled: bool,
    /// Entry lifetime in seconds, 0 for no expiry
    pub lifetime_secs: u64,
    /// Cache every method instead of only GET and HEAD
    pub force_cache: bool,
    /// Request headers whose values are part of the cache key
    pub vary_headers: Vec<String>,
}

impl CacheConfig {
    /// Entry lifetime as a [`Duration`].
    #[must_use]
    pub const fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lifetime_secs: 3600,
            force_cache: false,
            vary_headers: Vec::new(),
        }
    }
}

/// Retry subscriber settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Register the retry subscriber
    pub enabled: bool,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Cap on every delay, in milliseconds
    pub max_delay_ms: u64,
    /// Exponential growth factor
    pub multiplier: f64,
    /// Delay curve
    pub backoff: Backoff,
    /// Randomize delays
    pub jitter: bool,
}

impl RetryConfig {
    /// The policy described by this section.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.max_retries)
            .initial_delay(Duration::from_millis(self.initial_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .multiplier(self.multiplier)
            .backoff(self.backoff)
            .jitter(self.jitter)
            .build()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            backoff: Backoff::Exponential,
            jitter: false,
        }
    }
}

/// Toggle for a subscriber without settings.
///
/// `ON` is the value used both when the section is missing and when it is
/// present without `enabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Toggle<const ON: bool> {
    /// Register the subscriber
    pub enabled: bool,
}

// Serde's derive does not support const generics; this mirrors
// `#[derive(Deserialize)] #[serde(default)]`.
impl<'de, const ON: bool> Deserialize<'de> for Toggle<ON> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Repr {
            enabled: Option<bool>,
        }
        let repr = Repr::deserialize(deserializer)?;
        Ok(Self {
            enabled: repr.enabled.unwrap_or(ON),
        })
    }
}

impl<const ON: bool> Default for Toggle<ON> {
    fn default() -> Self {
        Self { enabled: ON }
    }
}

/// Section enabled unless configured otherwise.
pub type EnabledByDefault = Toggle<true>;

/// Section disabled unless configured otherwise.
pub type DisabledByDefault = Toggle<false>;

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// History subscriber
    pub history: HistoryConfig,
    /// Cache subscriber
    pub cache: CacheConfig,
    /// Retry subscriber
    pub retry: RetryConfig,
    /// Status code subscriber
    pub status_code: DisabledByDefault,
    /// Logger subscriber
    pub logging: EnabledByDefault,
    /// Metrics subscriber
    pub metrics: DisabledByDefault,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history: HistoryConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            status_code: DisabledByDefault::default(),
            logging: EnabledByDefault::default(),
            metrics: DisabledByDefault::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document. Missing sections and fields keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Validation`] on inconsistent values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `COURIER_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] when a variable cannot be parsed
    /// and [`ConfigError::Validation`] on inconsistent values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `COURIER_*`
    /// variable names.
    ///
    /// # Errors
    ///
    /// Same as [`PipelineConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let env = EnvReader { lookup: &lookup };

        env.apply("COURIER_HISTORY_ENABLED", &mut config.history.enabled, parse_bool)?;
        env.apply("COURIER_HISTORY_JOURNAL_LIMIT", &mut config.history.journal_limit, parse)?;

        env.apply("COURIER_CACHE_ENABLED", &mut config.cache.enabled, parse_bool)?;
        env.apply("COURIER_CACHE_LIFETIME_SECS", &mut config.cache.lifetime_secs, parse)?;
        env.apply("COURIER_CACHE_FORCE", &mut config.cache.force_cache, parse_bool)?;
        env.apply("COURIER_CACHE_VARY_HEADERS", &mut config.cache.vary_headers, |raw| {
            Some(
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(ToString::to_string)
                    .collect(),
            )
        })?;

        env.apply("COURIER_RETRY_ENABLED", &mut config.retry.enabled, parse_bool)?;
        env.apply("COURIER_RETRY_MAX_RETRIES", &mut config.retry.max_retries, parse)?;
        env.apply("COURIER_RETRY_INITIAL_DELAY_MS", &mut config.retry.initial_delay_ms, parse)?;
        env.apply("COURIER_RETRY_MAX_DELAY_MS", &mut config.retry.max_delay_ms, parse)?;
        env.apply("COURIER_RETRY_MULTIPLIER", &mut config.retry.multiplier, parse)?;
        env.apply("COURIER_RETRY_BACKOFF", &mut config.retry.backoff, Backoff::parse)?;
        env.apply("COURIER_RETRY_JITTER", &mut config.retry.jitter, parse_bool)?;

        env.apply("COURIER_STATUS_CODE_ENABLED", &mut config.status_code.enabled, parse_bool)?;
        env.apply("COURIER_LOGGING_ENABLED", &mut config.logging.enabled, parse_bool)?;
        env.apply("COURIER_METRICS_ENABLED", &mut config.metrics.enabled, parse_bool)?;

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for inconsistent values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history.enabled && self.history.journal_limit == 0 {
            return Err(ConfigError::Validation(
                "history.journal_limit must be > 0".to_string(),
            ));
        }
        if self.cache.vary_headers.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "cache.vary_headers cannot contain empty names".to_string(),
            ));
        }
        if self.retry.enabled {
            if self.retry.max_delay_ms < self.retry.initial_delay_ms {
                return Err(ConfigError::Validation(
                    "retry.max_delay_ms must be >= retry.initial_delay_ms".to_string(),
                ));
            }
            if self.retry.backoff == Backoff::Exponential
                && !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 1.0)
            {
                return Err(ConfigError::Validation(format!(
                    "retry.multiplier must be >= 1.0, got {}",
                    self.retry.multiplier
                )));
            }
        }
        Ok(())
    }
}

struct EnvReader<'a, F> {
    lookup: &'a F,
}

impl<F> EnvReader<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn apply<T>(
        &self,
        var: &str,
        target: &mut T,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<(), ConfigError> {
        let Some(raw) = (self.lookup)(var) else {
            return Ok(());
        };
        *target = parse(&raw).ok_or_else(|| ConfigError::InvalidEnv {
            var: var.to_string(),
            value: raw.clone(),
        })?;
        Ok(())
    }
}

fn parse<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
