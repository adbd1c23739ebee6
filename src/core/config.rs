//! Configuration for the spanlens toolkit.
//!
//! Provides serde-backed configuration with:
//! - YAML file support
//! - Validation and defaults
//! - Programmatic construction via [`ConfigBuilder`]

use crate::core::retry::RetryConfig;
use crate::core::{LensError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration for the toolkit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Telemetry backend endpoint configuration
    pub backend: BackendConfig,
    /// Retry/backoff configuration for outbound calls
    pub retry: RetryConfig,
    /// Result cache configuration
    pub cache: CacheConfig,
    /// Service health thresholds
    pub health: HealthConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Telemetry backend endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the APM backend API
    pub base_url: String,
    /// Logical name handed to the token provider when requesting credentials
    pub auth_service: String,
    /// Transport-level request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// Result cache configuration.
///
/// Trend queries get a window-dependent TTL; alerting-state queries
/// (health, monitors) use the fixed short TTLs regardless of window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Master switch for result caching
    pub enabled: bool,
    /// Maximum number of cached entries
    pub max_entries: usize,
    /// TTL for windows shorter than 1 hour
    #[serde(with = "humantime_serde")]
    pub short_ttl: Duration,
    /// TTL for windows shorter than 24 hours
    #[serde(with = "humantime_serde")]
    pub medium_ttl: Duration,
    /// TTL for windows of 24 hours and longer
    #[serde(with = "humantime_serde")]
    pub long_ttl: Duration,
    /// Fixed TTL for health and monitor state
    #[serde(with = "humantime_serde")]
    pub status_ttl: Duration,
    /// Fixed TTL for log and trace listings
    #[serde(with = "humantime_serde")]
    pub listing_ttl: Duration,
}

impl CacheConfig {
    /// TTL for a trend query over the given window length
    pub fn ttl_for_window(&self, window_ms: i64) -> Duration {
        if window_ms < 3_600_000 {
            self.short_ttl
        } else if window_ms < 86_400_000 {
            self.medium_ttl
        } else {
            self.long_ttl
        }
    }
}

/// Thresholds for computing a service health verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Error rate (%) above which a service is degraded
    pub degraded_error_rate: f64,
    /// Error rate (%) above which a service is down
    pub down_error_rate: f64,
    /// P95 latency above which a service is degraded
    #[serde(with = "humantime_serde")]
    pub p95_latency_threshold: Duration,
    /// How many recent error traces to sample for degraded services
    pub recent_error_limit: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include the emitting module path in log lines
    pub show_target: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: BackendConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            health: HealthConfig::default(),
            logging: LoggingConfig::default(),
            debug: false,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: "https://api.datadoghq.com".to_string(),
            auth_service: "apm-backend".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            max_entries: 1024,
            short_ttl: Duration::from_secs(30),
            medium_ttl: Duration::from_secs(300),
            long_ttl: Duration::from_secs(900),
            status_ttl: Duration::from_secs(30),
            listing_ttl: Duration::from_secs(60),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            degraded_error_rate: 5.0,
            down_error_rate: 25.0,
            p95_latency_threshold: Duration::from_secs(1),
            recent_error_limit: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            show_target: true,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.backend.base_url.is_empty() {
            return Err(LensError::config("backend base_url must not be empty"));
        }
        if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            return Err(LensError::config(format!(
                "backend base_url must be an http(s) URL, got '{}'",
                self.backend.base_url
            )));
        }

        self.retry.validate()?;

        if self.cache.max_entries == 0 {
            return Err(LensError::config("cache max_entries must be greater than 0"));
        }
        if self.cache.short_ttl > self.cache.medium_ttl
            || self.cache.medium_ttl > self.cache.long_ttl
        {
            return Err(LensError::config(
                "cache TTLs must be ordered: short_ttl <= medium_ttl <= long_ttl",
            ));
        }

        if self.health.degraded_error_rate < 0.0 || self.health.degraded_error_rate > 100.0 {
            return Err(LensError::config(format!(
                "degraded_error_rate must be between 0 and 100, got {}",
                self.health.degraded_error_rate
            )));
        }
        if self.health.down_error_rate < self.health.degraded_error_rate {
            return Err(LensError::config(
                "down_error_rate must be at least degraded_error_rate",
            ));
        }

        Ok(())
    }

    /// Install a global tracing subscriber according to the logging section.
    ///
    /// Safe to call more than once; subsequent calls are no-ops.
    pub fn init_logging(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.logging.level.as_str()));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(self.logging.show_target)
            .try_init();
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| LensError::config(format!("failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set the backend base URL
    pub fn base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.backend.base_url = url.into();
        self
    }

    /// Set the logical auth service name
    pub fn auth_service<S: Into<String>>(mut self, name: S) -> Self {
        self.config.backend.auth_service = name.into();
        self
    }

    /// Set the maximum retry attempts
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    /// Set the initial retry backoff
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry.initial_backoff = backoff;
        self
    }

    /// Enable or disable result caching
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
