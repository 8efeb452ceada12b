//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! dos-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Stored in `crates/integration/migrations/`:
//! ```text
//! migrations/
//! ├── 20260301000001_create_shopify_connections.sql
//! └── 20260301000002_create_shopify_orders.sql
//! ```

use thiserror::Error;

use super::{CommandError, pool};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Setup(#[from] CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply pending migrations.
pub async fn run() -> Result<(), MigrationError> {
    let pool = pool().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../integration/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
