//! Integration client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `SHOPIFY_API_VERSION` - Admin REST API version (default: 2023-10)
//! - `SHOPIFY_USER_AGENT` - User-Agent header value (default: DeliveryOS/1.0)
//! - `SHOPIFY_REQUEST_TIMEOUT_SECS` - Per-attempt timeout (default: 30)
//! - `SHOPIFY_MAX_RETRIES` - Attempts per request, including the first (default: 3)
//! - `SHOPIFY_BACKOFF_BASE_MS` - Backoff unit; attempt `n` waits `base * 2^n` (default: 1000)
//! - `SHOPIFY_BACKOFF_MAX_SECS` - Ceiling for a single backoff delay (default: 30)
//! - `SHOPIFY_CACHE_TTL_SECS` - Default response cache TTL (default: 300)
//!
//! ## Required by persistence commands
//! - `DATABASE_URL` - `PostgreSQL` connection string

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_API_VERSION: &str = "2023-10";
const DEFAULT_USER_AGENT: &str = "DeliveryOS/1.0";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;
const DEFAULT_BACKOFF_MAX_SECS: u64 = 30;
const DEFAULT_RATE_LIMIT_DELAY_SECS: u64 = 2;
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Retry and back-off policy for the request executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request (initial try + retries). Never below 1.
    pub max_attempts: u32,
    /// Backoff unit: after failed attempt `n` the executor waits `base * 2^n`.
    pub backoff_base: Duration,
    /// Ceiling for a single exponential backoff delay.
    pub max_backoff: Duration,
    /// Delay used on HTTP 429 when `Retry-After` is absent or unparseable.
    pub rate_limit_delay: Duration,
    /// Ceiling applied to server-directed `Retry-After` delays.
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            max_backoff: Duration::from_secs(DEFAULT_BACKOFF_MAX_SECS),
            rate_limit_delay: Duration::from_secs(DEFAULT_RATE_LIMIT_DELAY_SECS),
            max_retry_after: Duration::from_secs(MAX_RETRY_AFTER_SECS),
        }
    }
}

impl RetryPolicy {
    /// Same policy with a different attempt ceiling.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Exponential delay after the given failed attempt (1-indexed).
    ///
    /// With the default base of one second this yields 2s, 4s, 8s, ...
    /// capped at `max_backoff`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.min(16);
        let multiplier = 1u32 << shift;
        self.backoff_base
            .saturating_mul(multiplier)
            .min(self.max_backoff)
    }

    /// Delay to honour for a 429 response.
    #[must_use]
    pub fn rate_limit_backoff(&self, retry_after: Option<Duration>) -> Duration {
        retry_after
            .unwrap_or(self.rate_limit_delay)
            .min(self.max_retry_after)
    }
}

/// Shopify REST client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Admin API version segment (e.g., 2023-10).
    pub api_version: String,
    /// URL scheme. `https` in production; `http` only for local mock upstreams.
    pub scheme: String,
    /// User-Agent header sent with every request.
    pub user_agent: String,
    /// Timeout applied to each individual attempt.
    pub request_timeout: Duration,
    /// Retry and back-off policy.
    pub retry: RetryPolicy,
    /// Default TTL for cached read responses.
    pub cache_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            scheme: "https".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if a variable is set but cannot be
    /// parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let retry = RetryPolicy {
            max_attempts: parse_env_or("SHOPIFY_MAX_RETRIES", DEFAULT_MAX_ATTEMPTS)?.max(1),
            backoff_base: Duration::from_millis(parse_env_or(
                "SHOPIFY_BACKOFF_BASE_MS",
                DEFAULT_BACKOFF_BASE_MS,
            )?),
            max_backoff: Duration::from_secs(parse_env_or(
                "SHOPIFY_BACKOFF_MAX_SECS",
                DEFAULT_BACKOFF_MAX_SECS,
            )?),
            ..RetryPolicy::default()
        };

        Ok(Self {
            api_version: get_env_or_default("SHOPIFY_API_VERSION", DEFAULT_API_VERSION),
            scheme: "https".to_string(),
            user_agent: get_env_or_default("SHOPIFY_USER_AGENT", DEFAULT_USER_AGENT),
            request_timeout: Duration::from_secs(parse_env_or(
                "SHOPIFY_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            retry,
            cache_ttl: Duration::from_secs(parse_env_or(
                "SHOPIFY_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )?),
        })
    }

    /// Base URL for a shop: `{scheme}://{host}/admin/api/{version}/`.
    #[must_use]
    pub fn api_base(&self, host: &str) -> String {
        format!("{}://{}/admin/api/{}/", self.scheme, host, self.api_version)
    }
}

/// Load the `PostgreSQL` connection string.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if `DATABASE_URL` is not set.
pub fn database_url() -> Result<SecretString, ConfigError> {
    let _ = dotenvy::dotenv();
    get_required_env("DATABASE_URL").map(SecretString::from)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, falling back to `default` when unset.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
