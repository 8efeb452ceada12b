//! Shopify Admin REST API client.
//!
//! One [`ShopifyClient`] serves every tenant connection: the shop domain and
//! access token are passed in per call, so nothing tenant-specific is held
//! between requests except cached read responses.
//!
//! # Request pipeline
//!
//! 1. Validate host and token, build the versioned URL, drop `None` query
//!    parameters.
//! 2. For cacheable `GET`s, return a live cached payload without touching the
//!    network.
//! 3. Drive a [`RetryState`] machine: send, classify the outcome, back off
//!    (`Retry-After` on 429, exponential otherwise), repeat up to the policy's
//!    attempt ceiling.
//! 4. Cache successful cacheable `GET`s.
//!
//! # Security
//!
//! Access tokens are HIGH PRIVILEGE store credentials. The header carrying
//! them is marked sensitive and tokens never appear in cache keys or logs.

mod cache;
mod fulfillment;
mod orders;
mod retry;
mod shop;
pub mod types;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{IntegrationError, RequestContext};

pub use cache::{CacheStats, ResponseCache};
pub use retry::{AttemptFailure, RetryState};
pub use types::{
    ConnectionTest, Fulfillment, FulfillmentLineItem, FulfillmentOptions, ListOrdersOptions,
    OrderPage, OrderStatusFilter, RejectedOrder, RemoteCustomer, RemoteOrder, Shop,
    TrackingOptions,
};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// A request relative to the versioned Admin API prefix.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    endpoint: String,
    query: Vec<(String, Option<String>)>,
    body: Option<Value>,
    retries: Option<u32>,
    use_cache: bool,
    cache_ttl: Option<Duration>,
}

impl ApiRequest {
    fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
            retries: None,
            use_cache: true,
            cache_ttl: None,
        }
    }

    /// A `GET` request. Cacheable unless [`ApiRequest::no_cache`] is called.
    #[must_use]
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    /// A `POST` request with a JSON body.
    #[must_use]
    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, endpoint).body(body)
    }

    /// A `PUT` request with a JSON body.
    #[must_use]
    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, endpoint).body(body)
    }

    /// Attach a JSON body. Ignored for `GET`.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a query parameter. `None` values are omitted from the URL.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.query.push((key.into(), value.map(Into::into)));
        self
    }

    /// Override the attempt ceiling for this request.
    #[must_use]
    pub const fn retries(mut self, attempts: u32) -> Self {
        self.retries = Some(attempts);
        self
    }

    /// Bypass the response cache for this request.
    #[must_use]
    pub const fn no_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Cache this response for `ttl` instead of the client default.
    #[must_use]
    pub const fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Endpoint relative to the API prefix.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    const fn is_cacheable(&self) -> bool {
        self.use_cache && matches!(self.method, Method::GET)
    }
}

/// Parsed JSON response and how it was obtained.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    payload: Arc<Value>,
    context: RequestContext,
    from_cache: bool,
}

impl ApiResponse {
    /// Raw JSON payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Attempts the executor made. Zero for cache hits.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.context.attempts
    }

    /// Whether the payload came from the response cache.
    #[must_use]
    pub const fn from_cache(&self) -> bool {
        self.from_cache
    }

    /// Deserialize the payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns `IntegrationError::Decode` if the payload does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, IntegrationError> {
        T::deserialize(self.payload.as_ref()).map_err(|e| IntegrationError::Decode {
            message: e.to_string(),
            context: self.context.clone(),
        })
    }
}

/// A validated request ready to send.
struct PreparedRequest {
    method: Method,
    url: Url,
    token: HeaderValue,
    body: Option<Value>,
    max_attempts: u32,
    cache_key: Option<String>,
    cache_ttl: Option<Duration>,
    host: String,
    endpoint: String,
}

impl PreparedRequest {
    fn context(&self, attempts: u32) -> RequestContext {
        RequestContext {
            host: self.host.clone(),
            endpoint: self.endpoint.clone(),
            method: self.method.to_string(),
            attempts,
        }
    }
}

/// Outcome of a single failed attempt.
#[derive(Debug)]
enum AttemptError {
    RateLimited { retry_after: Option<Duration> },
    Status { status: u16, body: String },
    Transport(reqwest::Error),
    Decode(String),
}

impl AttemptError {
    const fn failure(&self) -> AttemptFailure {
        match self {
            Self::RateLimited { retry_after } => AttemptFailure::RateLimited {
                retry_after: *retry_after,
            },
            Self::Status { .. } | Self::Transport(_) | Self::Decode(_) => AttemptFailure::Hard,
        }
    }

    fn into_error(self, context: RequestContext) -> IntegrationError {
        match self {
            Self::RateLimited { .. } => IntegrationError::RateLimited { context },
            Self::Status { status, body } => IntegrationError::Upstream {
                status,
                body,
                context,
            },
            Self::Transport(source) => IntegrationError::Transport { source, context },
            Self::Decode(message) => IntegrationError::Decode { message, context },
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited {
                retry_after: Some(delay),
            } => write!(f, "rate limited, retry after {}s", delay.as_secs()),
            Self::RateLimited { retry_after: None } => write!(f, "rate limited"),
            Self::Status { status, .. } => write!(f, "HTTP {status}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Decode(message) => write!(f, "invalid JSON: {message}"),
        }
    }
}

/// Shopify Admin REST client.
///
/// Cheap to clone; clones share the HTTP connection pool and the response
/// cache.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    http: reqwest::Client,
    config: ClientConfig,
    cache: ResponseCache,
}

impl ShopifyClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        let cache = ResponseCache::new(config.cache_ttl);

        Ok(Self {
            inner: Arc::new(ShopifyClientInner {
                http,
                config,
                cache,
            }),
        })
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Drop every cached response.
    pub async fn clear_cache(&self) {
        self.inner.cache.clear().await;
    }

    /// Count and list the cached responses.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Execute a request against `host` with retry, back-off and caching.
    ///
    /// # Errors
    ///
    /// - `Authentication` if host or token is empty (nothing is sent)
    /// - `Validation` if the host or endpoint cannot form a URL (nothing is sent)
    /// - `RateLimited`, `Upstream`, `Transport` or `Decode` for the final failed
    ///   attempt once retries are exhausted
    #[instrument(
        skip(self, token, request),
        fields(method = %request.method, endpoint = %request.endpoint)
    )]
    pub async fn execute(
        &self,
        host: &str,
        token: &SecretString,
        request: ApiRequest,
    ) -> Result<ApiResponse, IntegrationError> {
        let prepared = self.prepare(host, token, request)?;

        if let Some(key) = &prepared.cache_key
            && let Some(payload) = self.inner.cache.get(key).await
        {
            debug!("Serving Shopify response from cache");
            return Ok(ApiResponse {
                payload,
                context: prepared.context(0),
                from_cache: true,
            });
        }

        let policy = &self.inner.config.retry;
        let mut state: RetryState<Value, AttemptError> = RetryState::Idle;

        loop {
            state = match state {
                RetryState::Idle => RetryState::first(),
                RetryState::Attempting { attempt } => {
                    debug!(attempt, max_attempts = prepared.max_attempts, "Sending Shopify request");
                    match self.send_once(&prepared).await {
                        Ok(payload) => RetryState::after_success(attempt, payload),
                        Err(err) => {
                            let failure = err.failure();
                            let message = err.to_string();
                            let policy = policy.clone().with_max_attempts(prepared.max_attempts);
                            let next = RetryState::after_failure(attempt, err, failure, &policy);
                            if let RetryState::BackingOff { delay, .. } = &next {
                                warn!(
                                    attempt,
                                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                                    error = %message,
                                    "Shopify request failed, backing off"
                                );
                            }
                            next
                        }
                    }
                }
                RetryState::BackingOff { attempt, delay } => {
                    tokio::time::sleep(delay).await;
                    RetryState::after_backoff(attempt)
                }
                RetryState::Succeeded { attempt, value } => {
                    let payload = Arc::new(value);
                    if let Some(key) = prepared.cache_key.clone() {
                        self.inner
                            .cache
                            .set(key, Arc::clone(&payload), prepared.cache_ttl)
                            .await;
                    }
                    debug!(attempt, "Shopify request succeeded");
                    return Ok(ApiResponse {
                        payload,
                        context: prepared.context(attempt),
                        from_cache: false,
                    });
                }
                RetryState::Failed { attempts, error } => {
                    error!(attempts, error = %error, "Shopify request failed");
                    return Err(error.into_error(prepared.context(attempts)));
                }
            };
        }
    }

    /// Validate inputs and build the URL, cache key and auth header.
    fn prepare(
        &self,
        host: &str,
        token: &SecretString,
        request: ApiRequest,
    ) -> Result<PreparedRequest, IntegrationError> {
        let host = host.trim();
        let secret = token.expose_secret().trim();
        if host.is_empty() || secret.is_empty() {
            return Err(IntegrationError::Authentication(
                "Missing shop domain or access token".to_string(),
            ));
        }
        if host.contains(['/', '?', '#', '@']) || host.chars().any(char::is_whitespace) {
            return Err(IntegrationError::Validation(format!(
                "Invalid shop domain: {host}"
            )));
        }

        let mut token_header = HeaderValue::from_str(secret).map_err(|_| {
            IntegrationError::Authentication("Access token contains invalid characters".to_string())
        })?;
        token_header.set_sensitive(true);

        let base = Url::parse(&self.inner.config.api_base(host))
            .map_err(|e| IntegrationError::Validation(format!("Invalid shop domain {host}: {e}")))?;
        let endpoint = request.endpoint.trim_start_matches('/');
        let mut url = base.join(endpoint).map_err(|e| {
            IntegrationError::Validation(format!("Invalid endpoint {endpoint}: {e}"))
        })?;

        let params: Vec<(&str, &str)> = request
            .query
            .iter()
            .filter_map(|(key, value)| value.as_deref().map(|v| (key.as_str(), v)))
            .collect();
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }

        let cacheable = request.is_cacheable();
        let body = if request.method == Method::GET {
            None
        } else {
            request.body
        };
        let cache_key = cacheable
            .then(|| ResponseCache::key(request.method.as_str(), url.as_str(), body.as_ref()));

        Ok(PreparedRequest {
            max_attempts: request
                .retries
                .unwrap_or(self.inner.config.retry.max_attempts)
                .max(1),
            cache_ttl: request.cache_ttl,
            endpoint: endpoint.to_string(),
            host: host.to_string(),
            method: request.method,
            url,
            token: token_header,
            body,
            cache_key,
        })
    }

    /// Send one attempt and classify the outcome.
    async fn send_once(&self, prepared: &PreparedRequest) -> Result<Value, AttemptError> {
        let mut builder = self
            .inner
            .http
            .request(prepared.method.clone(), prepared.url.clone())
            .header(ACCESS_TOKEN_HEADER, prepared.token.clone())
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = &prepared.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(AttemptError::Transport)?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptError::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(AttemptError::Transport)?;
        serde_json::from_slice(&bytes).map_err(|e| AttemptError::Decode(e.to_string()))
    }
}

impl fmt::Debug for ShopifyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShopifyClient")
            .field("api_version", &self.inner.config.api_version)
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}

/// Parse a `Retry-After` header given in whole seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Reject identifiers that would escape their path segment.
pub(crate) fn path_segment<'a>(name: &str, value: &'a str) -> Result<&'a str, IntegrationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(IntegrationError::Validation(format!("{name} is required")));
    }
    if value.contains(['/', '?', '#', '%']) || value.chars().any(char::is_whitespace) {
        return Err(IntegrationError::Validation(format!(
            "Invalid {name}: {value}"
        )));
    }
    Ok(value)
}
