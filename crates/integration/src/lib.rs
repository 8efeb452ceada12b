//! DeliveryOS commerce integration library.
//!
//! Talks to the Shopify Admin REST API on behalf of many tenant connections
//! and reconciles remote orders into local storage.
//!
//! # Architecture
//!
//! - [`shopify`] - Request executor (retry, rate-limit back-off), response
//!   cache and the typed domain operations built on top of them
//! - [`sync`] - Order reconciler that upserts remote orders one at a time
//! - [`db`] - Persistence seams (`OrderStore`, `ConnectionStore`) with
//!   `PostgreSQL` and in-memory implementations
//! - [`models`] - Tenant connections and the local order projection
//! - [`config`] - Client configuration loaded from environment variables
//! - [`error`] - Error taxonomy for network-layer failures
//!
//! # Security
//!
//! Access tokens are HIGH PRIVILEGE store credentials. They are passed in per
//! call as `SecretString`, never logged and never cached.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod shopify;
pub mod sync;

pub use config::{ClientConfig, ConfigError, RetryPolicy};
pub use error::{ErrorKind, IntegrationError, RequestContext};
pub use shopify::ShopifyClient;
pub use sync::{OrderSyncService, SyncFailure, SyncReconciler, SyncResult};
