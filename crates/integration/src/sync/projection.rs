//! Remote order to local projection.

use chrono::{DateTime, Utc};
use deliveryos_core::{ConnectionId, Money, MoneyError, TenantId};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::LocalOrder;
use crate::models::order::{DEFAULT_CURRENCY, UNKNOWN_CUSTOMER};
use crate::shopify::RemoteOrder;

/// A remote order that cannot be stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("order has no id")]
    MissingId,

    #[error("invalid {field}: {source}")]
    InvalidMoney {
        field: &'static str,
        #[source]
        source: MoneyError,
    },

    #[error("invalid {field} timestamp: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },
}

/// Project a remote order into the local schema, filling defaults for
/// anything absent.
///
/// # Errors
///
/// Returns `ProjectionError` if the order has no id, or carries a monetary
/// amount or timestamp that is present but unparseable.
pub fn project_order(
    tenant_id: TenantId,
    connection_id: ConnectionId,
    remote: &RemoteOrder,
    synced_at: DateTime<Utc>,
) -> Result<LocalOrder, ProjectionError> {
    let shopify_order_id = remote.id.clone().ok_or(ProjectionError::MissingId)?;

    let customer = remote.customer.as_ref();
    let customer_name = customer_name(
        customer.and_then(|c| c.first_name.as_deref()),
        customer.and_then(|c| c.last_name.as_deref()),
    );

    Ok(LocalOrder {
        tenant_id,
        connection_id,
        shopify_order_id,
        order_number: remote
            .order_number
            .map(|n| n.to_string())
            .or_else(|| non_blank(remote.name.as_deref())),
        customer_name,
        customer_email: non_blank(customer.and_then(|c| c.email.as_deref())),
        customer_phone: non_blank(customer.and_then(|c| c.phone.as_deref())),
        shipping_address: object_or_empty(remote.shipping_address.as_ref()),
        billing_address: object_or_empty(remote.billing_address.as_ref()),
        line_items: Value::Array(remote.line_items.clone().unwrap_or_default()),
        total_price: money("total_price", remote.total_price.as_deref())?,
        subtotal_price: money("subtotal_price", remote.subtotal_price.as_deref())?,
        total_tax: money("total_tax", remote.total_tax.as_deref())?,
        currency: non_blank(remote.currency.as_deref())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        financial_status: remote.financial_status.clone().unwrap_or_default(),
        fulfillment_status: remote.fulfillment_status.clone().unwrap_or_default(),
        tags: remote.tags.clone().unwrap_or_default(),
        note: non_blank(remote.note.as_deref()),
        created_at: timestamp("created_at", remote.created_at.as_deref())?,
        updated_at: timestamp("updated_at", remote.updated_at.as_deref())?,
        synced_at,
    })
}

/// `"first last"` trimmed, or `Unknown` when nothing is left.
fn customer_name(first: Option<&str>, last: Option<&str>) -> String {
    let full = format!("{} {}", first.unwrap_or_default(), last.unwrap_or_default());
    let full = full.trim();
    if full.is_empty() {
        UNKNOWN_CUSTOMER.to_string()
    } else {
        full.to_string()
    }
}

fn object_or_empty(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => Value::Object(Map::new()),
    }
}

fn money(field: &'static str, value: Option<&str>) -> Result<Money, ProjectionError> {
    Money::parse_or_zero(value).map_err(|source| ProjectionError::InvalidMoney { field, source })
}

fn timestamp(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, ProjectionError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(|_| ProjectionError::InvalidTimestamp {
                field,
                value: raw.to_string(),
            }),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use deliveryos_core::{FinancialStatus, FulfillmentStatus, RemoteOrderId};
    use serde_json::json;

    use super::*;
    use crate::shopify::RemoteCustomer;

    fn project(remote: &RemoteOrder) -> Result<LocalOrder, ProjectionError> {
        project_order(
            TenantId::generate(),
            ConnectionId::generate(),
            remote,
            Utc::now(),
        )
    }

    #[test]
    fn test_sparse_order_gets_defaults() {
        let remote = RemoteOrder {
            id: Some(RemoteOrderId::from(1_u64)),
            ..RemoteOrder::default()
        };
        let local = project(&remote).unwrap();

        assert_eq!(local.shopify_order_id.as_str(), "1");
        assert_eq!(local.customer_name, "Unknown");
        assert!(local.customer_email.is_none());
        assert_eq!(local.shipping_address, json!({}));
        assert_eq!(local.billing_address, json!({}));
        assert_eq!(local.line_items, json!([]));
        assert_eq!(local.total_price.to_string(), "0.00");
        assert_eq!(local.subtotal_price.to_string(), "0.00");
        assert_eq!(local.total_tax.to_string(), "0.00");
        assert_eq!(local.currency, "USD");
        assert_eq!(local.financial_status, FinancialStatus::Pending);
        assert_eq!(local.fulfillment_status, FulfillmentStatus::Unfulfilled);
        assert_eq!(local.tags, "");
        assert!(local.note.is_none());
        assert!(local.order_number.is_none());
    }

    #[test]
    fn test_full_order_projection() {
        let remote: RemoteOrder = serde_json::from_value(json!({
            "id": 450_789_469,
            "order_number": 1001,
            "name": "#1001",
            "customer": {"first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com"},
            "shipping_address": {"city": "London"},
            "line_items": [{"id": 1, "quantity": 2}],
            "total_price": "19.9",
            "currency": "GBP",
            "financial_status": "paid",
            "fulfillment_status": "partial",
            "tags": "vip, wholesale",
            "created_at": "2024-03-01T10:00:00-05:00"
        }))
        .unwrap();

        let local = project(&remote).unwrap();
        assert_eq!(local.order_number.as_deref(), Some("1001"));
        assert_eq!(local.customer_name, "Ada Lovelace");
        assert_eq!(local.customer_email.as_deref(), Some("ada@example.com"));
        assert_eq!(local.shipping_address["city"], "London");
        assert_eq!(local.line_items.as_array().unwrap().len(), 1);
        assert_eq!(local.total_price.to_string(), "19.90");
        assert_eq!(local.currency, "GBP");
        assert_eq!(local.financial_status, FinancialStatus::Paid);
        assert_eq!(local.fulfillment_status, FulfillmentStatus::Partial);
        assert_eq!(
            local.created_at.unwrap().to_rfc3339(),
            "2024-03-01T15:00:00+00:00"
        );
    }

    #[test]
    fn test_customer_name_uses_present_part() {
        let remote = RemoteOrder {
            id: Some(RemoteOrderId::from("9")),
            customer: Some(RemoteCustomer {
                first_name: None,
                last_name: Some("Hopper".to_string()),
                ..RemoteCustomer::default()
            }),
            ..RemoteOrder::default()
        };
        assert_eq!(project(&remote).unwrap().customer_name, "Hopper");
    }

    #[test]
    fn test_order_number_falls_back_to_name() {
        let remote = RemoteOrder {
            id: Some(RemoteOrderId::from("9")),
            name: Some("#1009".to_string()),
            ..RemoteOrder::default()
        };
        assert_eq!(project(&remote).unwrap().order_number.as_deref(), Some("#1009"));
    }

    #[test]
    fn test_missing_id_is_rejected() {
        assert_eq!(
            project(&RemoteOrder::default()).unwrap_err(),
            ProjectionError::MissingId
        );
    }

    #[test]
    fn test_bad_money_is_rejected() {
        let remote = RemoteOrder {
            id: Some(RemoteOrderId::from("9")),
            total_price: Some("free".to_string()),
            ..RemoteOrder::default()
        };
        let err = project(&remote).unwrap_err();
        assert!(matches!(err, ProjectionError::InvalidMoney { field: "total_price", .. }));
    }

    #[test]
    fn test_bad_timestamp_is_rejected() {
        let remote = RemoteOrder {
            id: Some(RemoteOrderId::from("9")),
            updated_at: Some("yesterday".to_string()),
            ..RemoteOrder::default()
        };
        let err = project(&remote).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid updated_at timestamp: \"yesterday\""
        );
    }
}
