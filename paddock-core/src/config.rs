use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cache::CachePolicy;

/// Entitlement layer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Backend API the entitlement documents are fetched from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token sent with every request
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
    /// Retries for transient failures within one fetch (0 disables retrying)
    pub max_retries: usize,
    pub retry_min_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            auth_token: None,
            timeout_secs: 10,
            max_retries: 2,
            retry_min_delay_ms: 200,
            retry_max_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub permission_ttl_secs: u64,
    pub subscription_ttl_secs: u64,
    pub tier_ttl_secs: u64,
    /// Delay before a failed refresh of a stale entry is retried
    pub failure_backoff_secs: u64,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            permission_ttl_secs: CachePolicy::DEFAULT_TTL.as_secs(),
            subscription_ttl_secs: CachePolicy::DEFAULT_TTL.as_secs(),
            tier_ttl_secs: CachePolicy::DEFAULT_TTL.as_secs(),
            failure_backoff_secs: CachePolicy::DEFAULT_FAILURE_BACKOFF.as_secs(),
            max_capacity: CachePolicy::DEFAULT_CAPACITY,
        }
    }
}

impl CacheConfig {
    fn policy(&self, ttl_secs: u64) -> CachePolicy {
        CachePolicy {
            ttl: Duration::from_secs(ttl_secs),
            failure_backoff: Duration::from_secs(self.failure_backoff_secs),
            max_capacity: self.max_capacity,
        }
    }

    #[must_use]
    pub fn permission_policy(&self) -> CachePolicy {
        self.policy(self.permission_ttl_secs)
    }

    #[must_use]
    pub fn subscription_policy(&self) -> CachePolicy {
        self.policy(self.subscription_ttl_secs)
    }

    #[must_use]
    pub fn tier_policy(&self) -> CachePolicy {
        self.policy(self.tier_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // PADDOCK_API__BASE_URL, PADDOCK_CACHE__PERMISSION_TTL_SECS, ...
        builder = builder.add_source(
            Environment::with_prefix("PADDOCK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check values the deserializer cannot, collecting every problem
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if url::Url::parse(&self.api.base_url).is_err() {
            errors.push(format!("api.base_url is not a valid URL: {}", self.api.base_url));
        }
        if self.api.timeout_secs == 0 {
            errors.push("api.timeout_secs must be greater than 0".to_string());
        }
        if self.api.retry_min_delay_ms > self.api.retry_max_delay_ms {
            errors.push("api.retry_min_delay_ms must not exceed api.retry_max_delay_ms".to_string());
        }

        for (name, ttl) in [
            ("cache.permission_ttl_secs", self.cache.permission_ttl_secs),
            ("cache.subscription_ttl_secs", self.cache.subscription_ttl_secs),
            ("cache.tier_ttl_secs", self.cache.tier_ttl_secs),
        ] {
            if ttl == 0 {
                errors.push(format!("{name} must be greater than 0"));
            }
        }
        if self.cache.max_capacity == 0 {
            errors.push("cache.max_capacity must be greater than 0".to_string());
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got \"{}\"",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
