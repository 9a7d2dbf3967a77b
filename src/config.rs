//! Configuration Module
//!
//! Handles loading and managing relay configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Relay configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Background cache sweep interval in seconds
    pub cleanup_interval: u64,

    /// Daily quota ceiling of the channel-data provider, in weighted units
    pub daily_quota: u64,
    /// Utilisation fraction above which the quota is reported as low
    pub quota_low_threshold: f64,
    /// Identifiers per channel-provider call (the provider caps this at 50)
    pub channel_batch_size: usize,

    /// Work items per inference batch
    pub analysis_batch_size: usize,
    /// Pause between uncached batches in milliseconds
    pub rate_limit_delay_ms: u64,
    /// Attempts made by the backoff retrier
    pub max_retries: u32,
    /// Base retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Age in seconds after which a keyed mutex entry is considered abandoned
    pub mutex_max_age: u64,
    /// Abandoned-mutex sweep interval in seconds
    pub mutex_cleanup_interval: u64,
    /// TTL in seconds of cached analysis batches
    pub analysis_cache_ttl: u64,
    /// Capacity of the analysis cache
    pub analysis_cache_max_entries: usize,

    /// Inference model name
    pub openai_model: String,
    /// Inference call timeout in seconds
    pub openai_timeout: u64,
    /// Email discovery call timeout in seconds
    pub apify_timeout: u64,
    /// Email validation call timeout in seconds
    pub leadmagic_timeout: u64,
    /// Concurrent email validations per chunk
    pub leadmagic_concurrency: usize,
    /// Whether catch-all domains count as valid
    pub leadmagic_accept_catch_all: bool,
    /// Whether validation errors degrade to an "error" verdict instead of failing
    pub leadmagic_fail_safe: bool,

    /// Production channel-data key
    pub youtube_api_key: Option<String>,
    /// Development channel-data key (falls back to production)
    pub dev_youtube_api_key: Option<String>,
    /// Inference provider key
    pub openai_api_key: Option<String>,
    /// Email discovery token
    pub apify_api_token: Option<String>,
    /// Email validation key
    pub leadmagic_api_key: Option<String>,
}

/// Parses an environment variable, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cache sweep frequency in seconds (default: 60)
    /// - `YOUTUBE_DAILY_QUOTA` - Daily quota units (default: 10000)
    /// - `YOUTUBE_QUOTA_LOW_THRESHOLD` - Low-quota fraction (default: 0.8)
    /// - `YOUTUBE_BATCH_SIZE` - Ids per channel call (default: 50)
    /// - `ANALYSIS_BATCH_SIZE` - Channels per inference batch (default: 5)
    /// - `RATE_LIMIT_DELAY_MS` - Delay between uncached batches (default: 500)
    /// - `MAX_RETRIES` / `RETRY_DELAY_MS` - Retrier settings (default: 3 / 1000)
    /// - `MUTEX_MAX_AGE` / `MUTEX_CLEANUP_INTERVAL` - Seconds (default: 300 / 300)
    /// - `ANALYSIS_CACHE_TTL` / `ANALYSIS_CACHE_MAX_ENTRIES` (default: 7 days / 5000)
    /// - `OPENAI_MODEL`, `OPENAI_TIMEOUT`, `APIFY_TIMEOUT`, `LEADMAGIC_*`
    /// - API keys: `YOUTUBE_API_KEY`, `DEV_YOUTUBE_API_KEY`, `OPENAI_API_KEY`,
    ///   `APIFY_API_TOKEN`, `LEADMAGIC_API_KEY`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            daily_quota: env_or("YOUTUBE_DAILY_QUOTA", defaults.daily_quota),
            quota_low_threshold: env_or(
                "YOUTUBE_QUOTA_LOW_THRESHOLD",
                defaults.quota_low_threshold,
            ),
            channel_batch_size: env_or("YOUTUBE_BATCH_SIZE", defaults.channel_batch_size)
                .clamp(1, 50),
            analysis_batch_size: env_or("ANALYSIS_BATCH_SIZE", defaults.analysis_batch_size)
                .max(1),
            rate_limit_delay_ms: env_or("RATE_LIMIT_DELAY_MS", defaults.rate_limit_delay_ms),
            max_retries: env_or("MAX_RETRIES", defaults.max_retries).max(1),
            retry_delay_ms: env_or("RETRY_DELAY_MS", defaults.retry_delay_ms),
            mutex_max_age: env_or("MUTEX_MAX_AGE", defaults.mutex_max_age),
            mutex_cleanup_interval: env_or(
                "MUTEX_CLEANUP_INTERVAL",
                defaults.mutex_cleanup_interval,
            ),
            analysis_cache_ttl: env_or("ANALYSIS_CACHE_TTL", defaults.analysis_cache_ttl),
            analysis_cache_max_entries: env_or(
                "ANALYSIS_CACHE_MAX_ENTRIES",
                defaults.analysis_cache_max_entries,
            ),
            openai_model: env_opt("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_timeout: env_or("OPENAI_TIMEOUT", defaults.openai_timeout),
            apify_timeout: env_or("APIFY_TIMEOUT", defaults.apify_timeout),
            leadmagic_timeout: env_or("LEADMAGIC_TIMEOUT", defaults.leadmagic_timeout),
            leadmagic_concurrency: env_or("LEADMAGIC_CONCURRENCY", defaults.leadmagic_concurrency)
                .max(1),
            leadmagic_accept_catch_all: env_or(
                "LEADMAGIC_ACCEPT_CATCH_ALL",
                defaults.leadmagic_accept_catch_all,
            ),
            leadmagic_fail_safe: env_or("LEADMAGIC_FAIL_SAFE", defaults.leadmagic_fail_safe),
            youtube_api_key: env_opt("YOUTUBE_API_KEY"),
            dev_youtube_api_key: env_opt("DEV_YOUTUBE_API_KEY"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            apify_api_token: env_opt("APIFY_API_TOKEN"),
            leadmagic_api_key: env_opt("LEADMAGIC_API_KEY"),
        }
    }

    /// Names of provider keys that are not configured.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.youtube_api_key.is_none() {
            missing.push("YOUTUBE_API_KEY");
        }
        if self.openai_api_key.is_none() {
            missing.push("OPENAI_API_KEY");
        }
        if self.apify_api_token.is_none() {
            missing.push("APIFY_API_TOKEN");
        }
        if self.leadmagic_api_key.is_none() {
            missing.push("LEADMAGIC_API_KEY");
        }
        missing
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn mutex_max_age(&self) -> Duration {
        Duration::from_secs(self.mutex_max_age)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cleanup_interval: 60,
            daily_quota: 10_000,
            quota_low_threshold: 0.8,
            channel_batch_size: 50,
            analysis_batch_size: 5,
            rate_limit_delay_ms: 500,
            max_retries: 3,
            retry_delay_ms: 1000,
            mutex_max_age: 300,
            mutex_cleanup_interval: 300,
            analysis_cache_ttl: 7 * 24 * 60 * 60,
            analysis_cache_max_entries: 5000,
            openai_model: "gpt-4.1-nano".to_string(),
            openai_timeout: 15,
            apify_timeout: 300,
            leadmagic_timeout: 10,
            leadmagic_concurrency: 10,
            leadmagic_accept_catch_all: true,
            leadmagic_fail_safe: true,
            youtube_api_key: None,
            dev_youtube_api_key: None,
            openai_api_key: None,
            apify_api_token: None,
            leadmagic_api_key: None,
        }
    }
}
