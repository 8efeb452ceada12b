//! Connection management commands.
//!
//! # Usage
//!
//! ```bash
//! dos-cli connections add --tenant <uuid> --shop demo.myshopify.com --token shpat_...
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use deliveryos_core::TenantId;
use deliveryos_integration::db::{ConnectionStore, PgConnectionStore};
use deliveryos_integration::models::Connection;
use secrecy::SecretString;
use serde_json::json;
use uuid::Uuid;

use super::{CommandError, client, pool, print_json};

/// Verify the credentials, then store a new active connection.
pub async fn add(tenant: Uuid, shop: &str, token: SecretString) -> Result<(), CommandError> {
    let check = client()?.test_connection(shop, &token).await;
    if let Some(error) = check.error {
        return Err(CommandError::ConnectionFailed(format!("{shop}: {error}")));
    }

    let connection = Connection::new(TenantId::new(tenant), shop.trim(), token);
    let store = PgConnectionStore::new(pool().await?);
    store.insert(&connection).await?;

    tracing::info!("Connection {} created for {}", connection.id, connection.shop_domain);
    print_json(&json!({
        "id": connection.id,
        "tenant_id": connection.tenant_id,
        "shop_domain": connection.shop_domain,
    }))
}
