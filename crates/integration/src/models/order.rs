//! Local projection of a Shopify order.

use chrono::{DateTime, Utc};
use deliveryos_core::{
    ConnectionId, FinancialStatus, FulfillmentStatus, LocalOrderId, Money, RemoteOrderId,
    TenantId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Customer name used when the remote order names nobody.
pub const UNKNOWN_CUSTOMER: &str = "Unknown";

/// Currency used when the remote order has none.
pub const DEFAULT_CURRENCY: &str = "USD";

/// An order as stored locally, keyed by `(connection_id, shopify_order_id)`.
///
/// Every field has a concrete value; absent remote data is replaced by
/// defaults during projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalOrder {
    pub tenant_id: TenantId,
    pub connection_id: ConnectionId,
    pub shopify_order_id: RemoteOrderId,
    /// Shop order number, or the display name when there is none.
    pub order_number: Option<String>,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    /// Address object; `{}` when absent.
    pub shipping_address: Value,
    /// Address object; `{}` when absent.
    pub billing_address: Value,
    /// Line item array; `[]` when absent.
    pub line_items: Value,
    pub total_price: Money,
    pub subtotal_price: Money,
    pub total_tax: Money,
    pub currency: String,
    pub financial_status: FinancialStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub tags: String,
    pub note: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub synced_at: DateTime<Utc>,
}

/// A local order together with its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOrder {
    pub id: LocalOrderId,
    pub order: LocalOrder,
}
