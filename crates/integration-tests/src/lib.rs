//! Shared fixtures for the DeliveryOS integration tests.
//!
//! # Running Tests
//!
//! ```bash
//! # Mock-upstream tests (no external services)
//! cargo test -p deliveryos-integration-tests
//!
//! # Include the PostgreSQL round trip
//! DATABASE_URL=postgres://... cargo test -p deliveryos-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `executor` - Retry, rate limiting and caching against a mock upstream
//! - `operations` - Order, fulfillment and shop endpoints
//! - `sync` - Reconciliation into in-memory and `PostgreSQL` stores

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::time::Duration;

use deliveryos_integration::{ClientConfig, RetryPolicy, ShopifyClient};
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::MockServer;

/// API version the fixtures are mounted under.
pub const API_VERSION: &str = "2023-10";

/// Token sent by every fixture client.
pub const TEST_TOKEN: &str = "shpat_integration";

/// Full mock path for an endpoint, e.g. `api_path("orders.json")`.
#[must_use]
pub fn api_path(endpoint: &str) -> String {
    format!("/admin/api/{API_VERSION}/{endpoint}")
}

/// The mock server's address, usable as a shop host.
#[must_use]
pub fn host(server: &MockServer) -> String {
    server.address().to_string()
}

/// Access token for fixture clients.
#[must_use]
pub fn token() -> SecretString {
    SecretString::from(TEST_TOKEN)
}

/// Client configuration pointed at a plain-HTTP mock upstream.
///
/// Exponential back-off runs on a 1ms base so retry tests stay fast; the
/// 429 delays still come from the server.
#[must_use]
pub fn mock_config() -> ClientConfig {
    ClientConfig {
        api_version: API_VERSION.to_string(),
        scheme: "http".to_string(),
        request_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            backoff_base: Duration::from_millis(1),
            ..RetryPolicy::default()
        },
        ..ClientConfig::default()
    }
}

/// Build a client from `config`.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn client_with(config: ClientConfig) -> ShopifyClient {
    ShopifyClient::new(config).expect("Failed to create HTTP client")
}

/// Client using [`mock_config`].
#[must_use]
pub fn mock_client() -> ShopifyClient {
    client_with(mock_config())
}

/// A minimal remote order body.
#[must_use]
pub fn order_json(id: u64, total: &str) -> Value {
    json!({
        "id": id,
        "order_number": 1000 + id,
        "email": format!("buyer{id}@example.com"),
        "customer": {"first_name": "Ada", "last_name": "Lovelace"},
        "line_items": [{"id": id * 10, "quantity": 1}],
        "total_price": total,
        "subtotal_price": total,
        "total_tax": "0.00",
        "currency": "USD",
        "financial_status": "paid",
        "fulfillment_status": null,
        "tags": "vip",
        "created_at": "2024-01-15T10:00:00-05:00",
        "updated_at": "2024-01-15T11:00:00-05:00"
    })
}
