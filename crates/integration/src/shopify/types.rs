//! Shopify REST payload types.
//!
//! Remote records are decoded leniently: every field is optional, amounts
//! and order numbers accept either strings or numbers, and unknown fields are
//! kept in `extra`. Listing pages decode each order on its own, so a record
//! that still does not fit is rejected alone instead of failing the page. Outbound payloads are the opposite: unset optional fields are
//! left out entirely, never sent as `null` or `""`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use deliveryos_core::{FinancialStatus, FulfillmentStatus, RemoteOrderId};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::IntegrationError;

/// Default page size for order listings.
pub const DEFAULT_ORDER_LIMIT: u32 = 50;

/// Largest page Shopify will return.
pub const MAX_ORDER_LIMIT: u32 = 250;

// =============================================================================
// Order listing
// =============================================================================

/// Order status filter for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderStatusFilter {
    /// Open orders only.
    Open,
    /// Closed orders only.
    Closed,
    /// Cancelled orders only.
    Cancelled,
    /// Every order.
    #[default]
    Any,
}

impl OrderStatusFilter {
    /// Query parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for OrderStatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusFilter {
    type Err = IntegrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "cancelled" => Ok(Self::Cancelled),
            "any" => Ok(Self::Any),
            other => Err(IntegrationError::Validation(format!(
                "Unknown order status filter: {other}"
            ))),
        }
    }
}

/// Filters for [`super::ShopifyClient::list_orders`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOrdersOptions {
    /// Page size; clamped to `1..=250`.
    pub limit: u32,
    /// Only orders with an id greater than this.
    pub since_id: Option<String>,
    /// Status filter.
    pub status: OrderStatusFilter,
    /// Financial status filter (e.g., `paid`).
    pub financial_status: Option<String>,
    /// Fulfillment status filter (e.g., `unshipped`).
    pub fulfillment_status: Option<String>,
    /// Lower bound on creation time.
    pub created_at_min: Option<DateTime<Utc>>,
    /// Upper bound on creation time.
    pub created_at_max: Option<DateTime<Utc>>,
    /// Lower bound on last update time.
    pub updated_at_min: Option<DateTime<Utc>>,
    /// Upper bound on last update time.
    pub updated_at_max: Option<DateTime<Utc>>,
    /// Restrict the returned fields. Empty means all fields.
    pub fields: Vec<String>,
    /// Serve from and store into the response cache. Defaults to true.
    pub use_cache: bool,
}

impl Default for ListOrdersOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_ORDER_LIMIT,
            since_id: None,
            status: OrderStatusFilter::Any,
            financial_status: None,
            fulfillment_status: None,
            created_at_min: None,
            created_at_max: None,
            updated_at_min: None,
            updated_at_max: None,
            fields: Vec::new(),
            use_cache: true,
        }
    }
}

impl ListOrdersOptions {
    /// Page size actually requested upstream.
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_ORDER_LIMIT)
    }

    /// Query parameters, with `None` for anything unset.
    pub(crate) fn query_params(&self) -> Vec<(&'static str, Option<String>)> {
        let fields = (!self.fields.is_empty()).then(|| self.fields.join(","));
        vec![
            ("limit", Some(self.effective_limit().to_string())),
            ("status", Some(self.status.as_str().to_string())),
            ("since_id", non_blank(self.since_id.as_deref())),
            ("created_at_min", self.created_at_min.map(rfc3339)),
            ("created_at_max", self.created_at_max.map(rfc3339)),
            ("updated_at_min", self.updated_at_min.map(rfc3339)),
            ("updated_at_max", self.updated_at_max.map(rfc3339)),
            ("financial_status", non_blank(self.financial_status.as_deref())),
            ("fulfillment_status", non_blank(self.fulfillment_status.as_deref())),
            ("fields", fields),
        ]
    }
}

/// A listed order that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedOrder {
    /// Upstream id, when the record carried a readable one.
    pub order_id: Option<String>,
    /// Why decoding failed.
    pub error: String,
}

/// One page of orders.
///
/// `has_more` is true when the page came back full, counting rejected
/// records. A listing whose total is an exact multiple of the limit therefore
/// reports one extra, empty page.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPage {
    /// Orders on this page that decoded.
    pub orders: Vec<RemoteOrder>,
    /// Records on this page that did not decode, in page order.
    pub rejected: Vec<RejectedOrder>,
    /// Whether another page probably exists.
    pub has_more: bool,
    /// Id of the last record when `has_more`, for use as the next `since_id`.
    pub next_page_info: Option<String>,
}

impl OrderPage {
    /// Build a page from the raw `orders` array of a listing requested with
    /// `limit`, decoding each record separately.
    #[must_use]
    pub fn from_records(mut records: Vec<Value>, limit: u32) -> Self {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        records.truncate(limit);
        let has_more = !records.is_empty() && records.len() == limit;
        let next_page_info = if has_more {
            records.last().and_then(record_id)
        } else {
            None
        };

        let mut orders = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();
        for record in records {
            let order_id = record_id(&record);
            match RemoteOrder::deserialize(record) {
                Ok(order) => orders.push(order),
                Err(e) => rejected.push(RejectedOrder {
                    order_id,
                    error: format!("Undecodable order: {e}"),
                }),
            }
        }

        Self {
            orders,
            rejected,
            has_more,
            next_page_info,
        }
    }
}

/// The `id` of a raw order record, if it is a number or a string.
fn record_id(record: &Value) -> Option<String> {
    record
        .get("id")
        .and_then(|id| RemoteOrderId::deserialize(id).ok())
        .map(RemoteOrderId::into_inner)
}

// =============================================================================
// Remote records
// =============================================================================

/// Customer embedded in a remote order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteCustomer {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// An order as returned by the Shopify REST API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteOrder {
    /// Shopify order id.
    pub id: Option<RemoteOrderId>,
    /// Sequential shop order number (e.g., 1001).
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub order_number: Option<u64>,
    /// Display name (e.g., `#1001`).
    pub name: Option<String>,
    pub email: Option<String>,
    pub customer: Option<RemoteCustomer>,
    pub shipping_address: Option<Value>,
    pub billing_address: Option<Value>,
    pub line_items: Option<Vec<Value>>,
    /// Decimal string; bare JSON numbers are kept as their text.
    #[serde(deserialize_with = "string_or_number")]
    pub total_price: Option<String>,
    /// Decimal string; bare JSON numbers are kept as their text.
    #[serde(deserialize_with = "string_or_number")]
    pub subtotal_price: Option<String>,
    /// Decimal string; bare JSON numbers are kept as their text.
    #[serde(deserialize_with = "string_or_number")]
    pub total_tax: Option<String>,
    pub currency: Option<String>,
    pub financial_status: Option<FinancialStatus>,
    pub fulfillment_status: Option<FulfillmentStatus>,
    /// Comma-separated tags.
    pub tags: Option<String>,
    pub note: Option<String>,
    /// RFC 3339 timestamp.
    pub created_at: Option<String>,
    /// RFC 3339 timestamp.
    pub updated_at: Option<String>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A fulfillment as returned by the Shopify REST API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fulfillment {
    pub id: Option<u64>,
    pub order_id: Option<u64>,
    pub status: Option<String>,
    pub tracking_company: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_urls: Option<Vec<String>>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Shop metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shop {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub domain: Option<String>,
    pub myshopify_domain: Option<String>,
    pub currency: Option<String>,
    pub plan_name: Option<String>,
    pub iana_timezone: Option<String>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of [`super::ShopifyClient::test_connection`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionTest {
    /// Whether the shop answered.
    pub success: bool,
    /// Shop metadata on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop: Option<Shop>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Fulfillment payloads
// =============================================================================

/// A line item to include in a partial fulfillment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FulfillmentLineItem {
    /// Line item id.
    pub id: u64,
    /// Units to fulfill; must be positive.
    pub quantity: u32,
}

/// Options for [`super::ShopifyClient::fulfill_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentOptions {
    pub location_id: Option<u64>,
    pub tracking_number: Option<String>,
    pub tracking_company: Option<String>,
    pub tracking_urls: Option<Vec<String>>,
    /// Whether Shopify emails the customer. Defaults to true.
    pub notify_customer: bool,
    /// Line items for a split fulfillment. `None` fulfills everything.
    pub line_items: Option<Vec<FulfillmentLineItem>>,
}

impl Default for FulfillmentOptions {
    fn default() -> Self {
        Self {
            location_id: None,
            tracking_number: None,
            tracking_company: None,
            tracking_urls: None,
            notify_customer: true,
            line_items: None,
        }
    }
}

/// Options for [`super::ShopifyClient::update_tracking`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingOptions {
    pub tracking_number: Option<String>,
    pub tracking_company: Option<String>,
    pub tracking_urls: Option<Vec<String>>,
    /// Whether Shopify emails the customer. Defaults to true.
    pub notify_customer: bool,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            tracking_number: None,
            tracking_company: None,
            tracking_urls: None,
            notify_customer: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct FulfillmentBody<'a> {
    notify_customer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    location_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tracking_number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tracking_company: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tracking_urls: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line_items: Option<&'a [FulfillmentLineItem]>,
}

#[derive(Debug, Serialize)]
struct FulfillmentEnvelope<'a> {
    fulfillment: FulfillmentBody<'a>,
}

impl FulfillmentOptions {
    /// Build the `{"fulfillment": {...}}` request body.
    ///
    /// # Errors
    ///
    /// Returns `IntegrationError::Validation` if a line item has zero quantity.
    pub fn to_payload(&self) -> Result<Value, IntegrationError> {
        if let Some(item) = self
            .line_items
            .iter()
            .flatten()
            .find(|item| item.quantity == 0)
        {
            return Err(IntegrationError::Validation(format!(
                "Line item {} has zero quantity",
                item.id
            )));
        }

        let envelope = FulfillmentEnvelope {
            fulfillment: FulfillmentBody {
                notify_customer: self.notify_customer,
                location_id: self.location_id,
                tracking_number: non_blank_ref(self.tracking_number.as_deref()),
                tracking_company: non_blank_ref(self.tracking_company.as_deref()),
                tracking_urls: self.tracking_urls.as_deref(),
                line_items: self.line_items.as_deref(),
            },
        };
        to_value(&envelope)
    }
}

impl TrackingOptions {
    /// Build the `{"fulfillment": {...}}` request body.
    ///
    /// # Errors
    ///
    /// Returns `IntegrationError::Validation` if the body cannot be encoded.
    pub fn to_payload(&self) -> Result<Value, IntegrationError> {
        let envelope = FulfillmentEnvelope {
            fulfillment: FulfillmentBody {
                notify_customer: self.notify_customer,
                location_id: None,
                tracking_number: non_blank_ref(self.tracking_number.as_deref()),
                tracking_company: non_blank_ref(self.tracking_company.as_deref()),
                tracking_urls: self.tracking_urls.as_deref(),
                line_items: None,
            },
        };
        to_value(&envelope)
    }
}

// =============================================================================
// Response envelopes
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct OrdersEnvelope {
    pub orders: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderEnvelope {
    pub order: RemoteOrder,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FulfillmentResponse {
    pub fulfillment: Fulfillment,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShopEnvelope {
    pub shop: Shop,
}

// =============================================================================
// Helpers
// =============================================================================

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a decimal string or number, got {other}"
        ))),
    }
}

fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid order number {n}"))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid order number {s:?}"))),
        Some(other) => Err(D::Error::custom(format!("invalid order number {other}"))),
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    non_blank_ref(value).map(str::to_string)
}

fn non_blank_ref(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn to_value<T: Serialize>(payload: &T) -> Result<Value, IntegrationError> {
    serde_json::to_value(payload)
        .map_err(|e| IntegrationError::Validation(format!("Unencodable payload: {e}")))
}
