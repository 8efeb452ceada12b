//! Persistence for connections and synced orders.
//!
//! # Tables
//!
//! - `shopify_connections` - One row per tenant shop link (token, settings,
//!   sync counters)
//! - `shopify_orders` - Local order projections, unique per
//!   `(connection_id, shopify_order_id)`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/integration/migrations/` and run via:
//! ```bash
//! cargo run -p deliveryos-cli -- migrate
//! ```
//!
//! The sync reconciler only sees the [`OrderStore`] and [`ConnectionStore`]
//! traits. `Pg*` stores back them with `PostgreSQL`; `Memory*` stores keep
//! everything in process.

pub mod connections;
pub mod memory;
pub mod orders;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deliveryos_core::{ConnectionId, FulfillmentStatus, LocalOrderId, RemoteOrderId};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::models::{Connection, LocalOrder, StoredOrder};

pub use connections::PgConnectionStore;
pub use memory::{MemoryConnectionStore, MemoryOrderStore};
pub use orders::PgOrderStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate remote order).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Storage for local order projections.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Find the local id for a remote order within a connection.
    async fn find_by_remote_id(
        &self,
        connection_id: ConnectionId,
        remote_id: &RemoteOrderId,
    ) -> Result<Option<LocalOrderId>, RepositoryError>;

    /// Load a stored order.
    async fn get(
        &self,
        connection_id: ConnectionId,
        remote_id: &RemoteOrderId,
    ) -> Result<Option<StoredOrder>, RepositoryError>;

    /// Insert a new order.
    ///
    /// Fails with `Conflict` if `(connection_id, shopify_order_id)` exists.
    async fn insert(&self, order: &LocalOrder) -> Result<LocalOrderId, RepositoryError>;

    /// Overwrite the order stored under `id`.
    ///
    /// Fails with `NotFound` if no such row exists.
    async fn update(&self, id: LocalOrderId, order: &LocalOrder) -> Result<(), RepositoryError>;

    /// Set the fulfillment status of a stored order and stamp its
    /// `updated_at` with `at`.
    ///
    /// Returns `false` if the order is not stored locally.
    async fn set_fulfillment_status(
        &self,
        connection_id: ConnectionId,
        remote_id: &RemoteOrderId,
        status: &FulfillmentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
}

/// Storage for tenant connections.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Load a connection.
    async fn get(&self, id: ConnectionId) -> Result<Option<Connection>, RepositoryError>;

    /// Store a new connection.
    async fn insert(&self, connection: &Connection) -> Result<(), RepositoryError>;

    /// Add `synced` to the running total and stamp `last_sync`.
    ///
    /// Fails with `NotFound` if the connection does not exist.
    async fn record_sync(
        &self,
        id: ConnectionId,
        synced: u64,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-constraint violation to `Conflict`.
pub(crate) fn conflict_or_database(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(err)
}
