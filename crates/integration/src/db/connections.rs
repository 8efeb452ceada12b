//! `PostgreSQL` connection store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deliveryos_core::{ConnectionId, TenantId};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use sqlx::PgPool;
use sqlx::types::Json;

use super::{ConnectionStore, RepositoryError, conflict_or_database};
use crate::models::Connection;

/// Internal row type for `shopify_connections` queries.
#[derive(sqlx::FromRow)]
struct ConnectionRow {
    id: ConnectionId,
    tenant_id: TenantId,
    shop_domain: String,
    access_token: String,
    webhook_secret: Option<String>,
    is_active: bool,
    settings: Json<Value>,
    orders_synced: i64,
    last_sync: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ConnectionRow> for Connection {
    type Error = RepositoryError;

    fn try_from(row: ConnectionRow) -> Result<Self, Self::Error> {
        let settings: Map<String, Value> = match row.settings.0 {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(RepositoryError::DataCorruption(format!(
                    "settings for connection {} is not an object: {other}",
                    row.id
                )));
            }
        };

        Ok(Self {
            id: row.id,
            tenant_id: row.tenant_id,
            shop_domain: row.shop_domain,
            access_token: SecretString::from(row.access_token),
            webhook_secret: row.webhook_secret.map(SecretString::from),
            is_active: row.is_active,
            settings,
            orders_synced: row.orders_synced,
            last_sync: row.last_sync,
            created_at: row.created_at,
        })
    }
}

/// Connection store backed by the `shopify_connections` table.
#[derive(Debug, Clone)]
pub struct PgConnectionStore {
    pool: PgPool,
}

impl PgConnectionStore {
    /// Create a new connection store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectionStore for PgConnectionStore {
    async fn get(&self, id: ConnectionId) -> Result<Option<Connection>, RepositoryError> {
        let row = sqlx::query_as::<_, ConnectionRow>(
            r"
            SELECT id, tenant_id, shop_domain, access_token, webhook_secret,
                   is_active, settings, orders_synced, last_sync, created_at
            FROM shopify_connections
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Connection::try_from).transpose()
    }

    async fn insert(&self, connection: &Connection) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shopify_connections (
                id, tenant_id, shop_domain, access_token, webhook_secret,
                is_active, settings, orders_synced, last_sync, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(connection.id)
        .bind(connection.tenant_id)
        .bind(&connection.shop_domain)
        .bind(connection.access_token.expose_secret())
        .bind(
            connection
                .webhook_secret
                .as_ref()
                .map(|secret| secret.expose_secret().to_string()),
        )
        .bind(connection.is_active)
        .bind(Json(&connection.settings))
        .bind(connection.orders_synced)
        .bind(connection.last_sync)
        .bind(connection.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, &format!("connection for {}", connection.shop_domain)))?;

        Ok(())
    }

    async fn record_sync(
        &self,
        id: ConnectionId,
        synced: u64,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let synced = i64::try_from(synced).unwrap_or(i64::MAX);
        let result = sqlx::query(
            r"
            UPDATE shopify_connections
            SET orders_synced = orders_synced + $2,
                last_sync = $3
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(synced)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
