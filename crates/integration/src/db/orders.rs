//! `PostgreSQL` order store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deliveryos_core::{
    ConnectionId, FinancialStatus, FulfillmentStatus, LocalOrderId, Money, RemoteOrderId,
    TenantId,
};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;

use super::{OrderStore, RepositoryError, conflict_or_database};
use crate::models::{LocalOrder, StoredOrder};

const ORDER_COLUMNS: &str = r"
    id, tenant_id, connection_id, shopify_order_id, order_number,
    customer_name, customer_email, customer_phone,
    shipping_address, billing_address, line_items,
    total_price, subtotal_price, total_tax, currency,
    financial_status, fulfillment_status, tags, note,
    created_at, updated_at, synced_at
";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `shopify_orders` queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: LocalOrderId,
    tenant_id: TenantId,
    connection_id: ConnectionId,
    shopify_order_id: String,
    order_number: Option<String>,
    customer_name: String,
    customer_email: Option<String>,
    customer_phone: Option<String>,
    shipping_address: Json<Value>,
    billing_address: Json<Value>,
    line_items: Json<Value>,
    total_price: Decimal,
    subtotal_price: Decimal,
    total_tax: Decimal,
    currency: String,
    financial_status: String,
    fulfillment_status: String,
    tags: String,
    note: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    synced_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for StoredOrder {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        if !row.line_items.0.is_array() {
            return Err(RepositoryError::DataCorruption(format!(
                "line_items for order {} is not an array",
                row.shopify_order_id
            )));
        }

        Ok(Self {
            id: row.id,
            order: LocalOrder {
                tenant_id: row.tenant_id,
                connection_id: row.connection_id,
                shopify_order_id: RemoteOrderId::from(row.shopify_order_id),
                order_number: row.order_number,
                customer_name: row.customer_name,
                customer_email: row.customer_email,
                customer_phone: row.customer_phone,
                shipping_address: row.shipping_address.0,
                billing_address: row.billing_address.0,
                line_items: row.line_items.0,
                total_price: Money::new(row.total_price),
                subtotal_price: Money::new(row.subtotal_price),
                total_tax: Money::new(row.total_tax),
                currency: row.currency,
                financial_status: FinancialStatus::from(row.financial_status),
                fulfillment_status: FulfillmentStatus::from(row.fulfillment_status),
                tags: row.tags,
                note: row.note,
                created_at: row.created_at,
                updated_at: row.updated_at,
                synced_at: row.synced_at,
            },
        })
    }
}

// =============================================================================
// Store
// =============================================================================

/// Order store backed by the `shopify_orders` table.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a new order store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_by_remote_id(
        &self,
        connection_id: ConnectionId,
        remote_id: &RemoteOrderId,
    ) -> Result<Option<LocalOrderId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, LocalOrderId>(
            r"
            SELECT id FROM shopify_orders
            WHERE connection_id = $1 AND shopify_order_id = $2
            ",
        )
        .bind(connection_id)
        .bind(remote_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get(
        &self,
        connection_id: ConnectionId,
        remote_id: &RemoteOrderId,
    ) -> Result<Option<StoredOrder>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM shopify_orders \
             WHERE connection_id = $1 AND shopify_order_id = $2"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(connection_id)
            .bind(remote_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(StoredOrder::try_from).transpose()
    }

    async fn insert(&self, order: &LocalOrder) -> Result<LocalOrderId, RepositoryError> {
        let id = LocalOrderId::generate();
        sqlx::query(
            r"
            INSERT INTO shopify_orders (
                id, tenant_id, connection_id, shopify_order_id, order_number,
                customer_name, customer_email, customer_phone,
                shipping_address, billing_address, line_items,
                total_price, subtotal_price, total_tax, currency,
                financial_status, fulfillment_status, tags, note,
                created_at, updated_at, synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            ",
        )
        .bind(id)
        .bind(order.tenant_id)
        .bind(order.connection_id)
        .bind(order.shopify_order_id.as_str())
        .bind(order.order_number.as_deref())
        .bind(&order.customer_name)
        .bind(order.customer_email.as_deref())
        .bind(order.customer_phone.as_deref())
        .bind(Json(&order.shipping_address))
        .bind(Json(&order.billing_address))
        .bind(Json(&order.line_items))
        .bind(order.total_price.amount())
        .bind(order.subtotal_price.amount())
        .bind(order.total_tax.amount())
        .bind(&order.currency)
        .bind(order.financial_status.as_str())
        .bind(order.fulfillment_status.as_str())
        .bind(&order.tags)
        .bind(order.note.as_deref())
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.synced_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, &format!("order {}", order.shopify_order_id)))?;

        Ok(id)
    }

    async fn update(&self, id: LocalOrderId, order: &LocalOrder) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shopify_orders SET
                tenant_id = $2,
                connection_id = $3,
                shopify_order_id = $4,
                order_number = $5,
                customer_name = $6,
                customer_email = $7,
                customer_phone = $8,
                shipping_address = $9,
                billing_address = $10,
                line_items = $11,
                total_price = $12,
                subtotal_price = $13,
                total_tax = $14,
                currency = $15,
                financial_status = $16,
                fulfillment_status = $17,
                tags = $18,
                note = $19,
                created_at = $20,
                updated_at = $21,
                synced_at = $22
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(order.tenant_id)
        .bind(order.connection_id)
        .bind(order.shopify_order_id.as_str())
        .bind(order.order_number.as_deref())
        .bind(&order.customer_name)
        .bind(order.customer_email.as_deref())
        .bind(order.customer_phone.as_deref())
        .bind(Json(&order.shipping_address))
        .bind(Json(&order.billing_address))
        .bind(Json(&order.line_items))
        .bind(order.total_price.amount())
        .bind(order.subtotal_price.amount())
        .bind(order.total_tax.amount())
        .bind(&order.currency)
        .bind(order.financial_status.as_str())
        .bind(order.fulfillment_status.as_str())
        .bind(&order.tags)
        .bind(order.note.as_deref())
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.synced_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, &format!("order {}", order.shopify_order_id)))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_fulfillment_status(
        &self,
        connection_id: ConnectionId,
        remote_id: &RemoteOrderId,
        status: &FulfillmentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shopify_orders SET fulfillment_status = $3, updated_at = $4
            WHERE connection_id = $1 AND shopify_order_id = $2
            ",
        )
        .bind(connection_id)
        .bind(remote_id.as_str())
        .bind(status.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
