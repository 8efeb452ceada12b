//! Order commands.
//!
//! # Usage
//!
//! ```bash
//! dos-cli orders list --limit 20 --status open
//! dos-cli orders get 450789469
//! dos-cli orders fulfill 450789469 --tracking-number 1Z999 --line-item 466157049:1
//! dos-cli orders sync --connection <uuid>
//! ```
//!
//! # Environment Variables
//!
//! - `SHOPIFY_SHOP` / `SHOPIFY_ACCESS_TOKEN` - Target for `list`, `get`, `fulfill`
//! - `DATABASE_URL` - `PostgreSQL` connection string for `sync`

use std::sync::Arc;

use chrono::{DateTime, Utc};
use deliveryos_core::ConnectionId;
use deliveryos_integration::OrderSyncService;
use deliveryos_integration::db::{PgConnectionStore, PgOrderStore};
use deliveryos_integration::shopify::{
    FulfillmentLineItem, FulfillmentOptions, ListOrdersOptions, OrderStatusFilter,
};
use secrecy::SecretString;
use serde_json::json;
use uuid::Uuid;

use super::{CommandError, client, pool, print_json};

/// Filters accepted by `orders list`.
pub struct ListFilter {
    pub limit: u32,
    pub status: String,
    pub since_id: Option<String>,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub updated_after: Option<DateTime<Utc>>,
    pub fields: Vec<String>,
}

/// Fulfillment details accepted by `orders fulfill`.
pub struct FulfillRequest {
    pub location_id: Option<u64>,
    pub tracking_number: Option<String>,
    pub tracking_company: Option<String>,
    pub tracking_urls: Vec<String>,
    /// `ID:QTY` pairs.
    pub line_items: Vec<String>,
    pub notify_customer: bool,
}

/// Print one page of orders.
pub async fn list(shop: &str, token: &SecretString, filter: ListFilter) -> Result<(), CommandError> {
    let status: OrderStatusFilter = filter.status.parse()?;
    let options = ListOrdersOptions {
        limit: filter.limit,
        since_id: filter.since_id,
        status,
        financial_status: filter.financial_status,
        fulfillment_status: filter.fulfillment_status,
        created_at_min: filter.created_after,
        updated_at_min: filter.updated_after,
        fields: filter.fields,
        ..ListOrdersOptions::default()
    };

    let page = client()?.list_orders(shop, token, &options).await?;
    tracing::info!(
        "Fetched {} orders from {shop} ({} undecodable)",
        page.orders.len(),
        page.rejected.len()
    );

    print_json(&json!({
        "orders": page.orders,
        "rejected": page.rejected,
        "has_more": page.has_more,
        "next_page_info": page.next_page_info,
    }))
}

/// Print a single order.
pub async fn get(shop: &str, token: &SecretString, id: &str) -> Result<(), CommandError> {
    let order = client()?.get_order(shop, token, id).await?;
    print_json(&order)
}

/// Fulfill an order and print the fulfillment.
pub async fn fulfill(
    shop: &str,
    token: &SecretString,
    id: &str,
    request: FulfillRequest,
) -> Result<(), CommandError> {
    let line_items = request
        .line_items
        .iter()
        .map(|raw| parse_line_item(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let options = FulfillmentOptions {
        location_id: request.location_id,
        tracking_number: request.tracking_number,
        tracking_company: request.tracking_company,
        tracking_urls: (!request.tracking_urls.is_empty()).then_some(request.tracking_urls),
        notify_customer: request.notify_customer,
        line_items: (!line_items.is_empty()).then_some(line_items),
    };

    let fulfillment = client()?.fulfill_order(shop, token, id, &options).await?;
    tracing::info!("Order {id} fulfilled");
    print_json(&fulfillment)
}

/// Sync a stored connection and print the result.
pub async fn sync(
    connection: Uuid,
    limit: u32,
    updated_after: Option<DateTime<Utc>>,
) -> Result<(), CommandError> {
    let pool = pool().await?;
    let service = OrderSyncService::new(
        client()?,
        Arc::new(PgOrderStore::new(pool.clone())),
        Arc::new(PgConnectionStore::new(pool)),
    );

    let options = ListOrdersOptions {
        limit,
        updated_at_min: updated_after,
        ..ListOrdersOptions::default()
    };
    let result = service
        .sync_connection_with(ConnectionId::new(connection), &options)
        .await?;

    tracing::info!(
        "Synced {} orders ({} created, {} updated, {} failed)",
        result.synced,
        result.created,
        result.updated,
        result.errors.len()
    );
    print_json(&result)
}

/// Parse an `ID:QTY` line item argument.
fn parse_line_item(raw: &str) -> Result<FulfillmentLineItem, CommandError> {
    let invalid = || CommandError::InvalidArgument(format!("line item must be ID:QTY, got {raw:?}"));
    let (id, quantity) = raw.split_once(':').ok_or_else(invalid)?;
    Ok(FulfillmentLineItem {
        id: id.trim().parse().map_err(|_| invalid())?,
        quantity: quantity.trim().parse().map_err(|_| invalid())?,
    })
}
