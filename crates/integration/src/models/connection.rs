//! A tenant's link to one Shopify shop.

use chrono::{DateTime, Utc};
use deliveryos_core::{ConnectionId, TenantId};
use secrecy::SecretString;
use serde_json::{Map, Value};

/// A tenant's Shopify connection.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub tenant_id: TenantId,
    /// Shop domain (e.g., your-store.myshopify.com).
    pub shop_domain: String,
    /// Admin API access token (HIGH PRIVILEGE - redacted in debug output).
    pub access_token: SecretString,
    /// Shared secret for webhook signatures, if configured (redacted in debug output).
    pub webhook_secret: Option<SecretString>,
    /// Inactive connections are skipped by sync.
    pub is_active: bool,
    /// Free-form per-connection settings.
    pub settings: Map<String, Value>,
    /// Running total of orders written by sync.
    pub orders_synced: i64,
    /// When the last sync finished.
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    /// A new active connection with no sync history.
    #[must_use]
    pub fn new(tenant_id: TenantId, shop_domain: impl Into<String>, access_token: SecretString) -> Self {
        Self {
            id: ConnectionId::generate(),
            tenant_id,
            shop_domain: shop_domain.into(),
            access_token,
            webhook_secret: None,
            is_active: true,
            settings: Map::new(),
            orders_synced: 0,
            last_sync: None,
            created_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &"[REDACTED]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("is_active", &self.is_active)
            .field("orders_synced", &self.orders_synced)
            .field("last_sync", &self.last_sync)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let connection = Connection::new(
            TenantId::generate(),
            "demo.myshopify.com",
            SecretString::from("shpat_super_secret"),
        );
        let debug = format!("{connection:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("shpat_super_secret"));
    }

    #[test]
    fn test_new_connection_is_active() {
        let connection = Connection::new(
            TenantId::generate(),
            "demo.myshopify.com",
            SecretString::from("t"),
        );
        assert!(connection.is_active);
        assert_eq!(connection.orders_synced, 0);
        assert!(connection.last_sync.is_none());
    }
}
