//! Command implementations.

pub mod connections;
pub mod migrate;
pub mod orders;
pub mod shop;

use deliveryos_integration::sync::ServiceError;
use deliveryos_integration::{ClientConfig, ConfigError, IntegrationError, ShopifyClient};
use deliveryos_integration::db::{RepositoryError, create_pool};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Shopify call failed.
    #[error(transparent)]
    Integration(#[from] IntegrationError),

    /// Sync workflow failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Shop rejected the connection check.
    #[error("Connection check failed: {0}")]
    ConnectionFailed(String),

    /// Invalid command-line input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Output could not be encoded.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Build a client from `SHOPIFY_*` environment configuration.
fn client() -> Result<ShopifyClient, CommandError> {
    let config = ClientConfig::from_env()?;
    ShopifyClient::new(config).map_err(|e| CommandError::Client(e.to_string()))
}

/// Connect to `DATABASE_URL`.
async fn pool() -> Result<PgPool, CommandError> {
    let database_url = deliveryos_integration::config::database_url()?;
    tracing::info!("Connecting to database...");
    Ok(create_pool(&database_url).await?)
}

/// Print a value to stdout as pretty JSON.
#[allow(clippy::print_stdout)]
fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
