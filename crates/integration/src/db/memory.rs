//! In-process stores.
//!
//! Same contract as the `PostgreSQL` stores, including the
//! `(connection_id, shopify_order_id)` uniqueness rule. Contents are lost
//! when the store is dropped.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deliveryos_core::{ConnectionId, FulfillmentStatus, LocalOrderId, RemoteOrderId};
use tokio::sync::RwLock;

use super::{ConnectionStore, OrderStore, RepositoryError};
use crate::models::{Connection, LocalOrder, StoredOrder};

type OrderKey = (ConnectionId, RemoteOrderId);

/// Order store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<OrderKey, StoredOrder>>,
}

impl MemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }

    /// Every stored order, in no particular order.
    pub async fn all(&self) -> Vec<StoredOrder> {
        self.orders.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find_by_remote_id(
        &self,
        connection_id: ConnectionId,
        remote_id: &RemoteOrderId,
    ) -> Result<Option<LocalOrderId>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders
            .get(&(connection_id, remote_id.clone()))
            .map(|stored| stored.id))
    }

    async fn get(
        &self,
        connection_id: ConnectionId,
        remote_id: &RemoteOrderId,
    ) -> Result<Option<StoredOrder>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&(connection_id, remote_id.clone())).cloned())
    }

    async fn insert(&self, order: &LocalOrder) -> Result<LocalOrderId, RepositoryError> {
        let key = (order.connection_id, order.shopify_order_id.clone());
        let mut orders = self.orders.write().await;
        if orders.contains_key(&key) {
            return Err(RepositoryError::Conflict(format!(
                "order {} already exists",
                order.shopify_order_id
            )));
        }

        let id = LocalOrderId::generate();
        orders.insert(
            key,
            StoredOrder {
                id,
                order: order.clone(),
            },
        );
        Ok(id)
    }

    async fn update(&self, id: LocalOrderId, order: &LocalOrder) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        let current_key = orders
            .iter()
            .find(|(_, stored)| stored.id == id)
            .map(|(key, _)| key.clone())
            .ok_or(RepositoryError::NotFound)?;

        let new_key = (order.connection_id, order.shopify_order_id.clone());
        if new_key != current_key && orders.contains_key(&new_key) {
            return Err(RepositoryError::Conflict(format!(
                "order {} already exists",
                order.shopify_order_id
            )));
        }

        orders.remove(&current_key);
        orders.insert(
            new_key,
            StoredOrder {
                id,
                order: order.clone(),
            },
        );
        Ok(())
    }

    async fn set_fulfillment_status(
        &self,
        connection_id: ConnectionId,
        remote_id: &RemoteOrderId,
        status: &FulfillmentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&(connection_id, remote_id.clone())) {
            Some(stored) => {
                stored.order.fulfillment_status = status.clone();
                stored.order.updated_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Connection store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryConnectionStore {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl MemoryConnectionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionStore for MemoryConnectionStore {
    async fn get(&self, id: ConnectionId) -> Result<Option<Connection>, RepositoryError> {
        Ok(self.connections.read().await.get(&id).cloned())
    }

    async fn insert(&self, connection: &Connection) -> Result<(), RepositoryError> {
        let mut connections = self.connections.write().await;
        if connections.contains_key(&connection.id) {
            return Err(RepositoryError::Conflict(format!(
                "connection {} already exists",
                connection.id
            )));
        }
        connections.insert(connection.id, connection.clone());
        Ok(())
    }

    async fn record_sync(
        &self,
        id: ConnectionId,
        synced: u64,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut connections = self.connections.write().await;
        let connection = connections.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        connection.orders_synced = connection
            .orders_synced
            .saturating_add(i64::try_from(synced).unwrap_or(i64::MAX));
        connection.last_sync = Some(at);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use deliveryos_core::{FinancialStatus, Money, TenantId};
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;

    fn order(connection_id: ConnectionId, remote_id: &str) -> LocalOrder {
        LocalOrder {
            tenant_id: TenantId::generate(),
            connection_id,
            shopify_order_id: RemoteOrderId::from(remote_id),
            order_number: Some("1001".to_string()),
            customer_name: "Unknown".to_string(),
            customer_email: None,
            customer_phone: None,
            shipping_address: json!({}),
            billing_address: json!({}),
            line_items: json!([]),
            total_price: Money::ZERO,
            subtotal_price: Money::ZERO,
            total_tax: Money::ZERO,
            currency: "USD".to_string(),
            financial_status: FinancialStatus::Pending,
            fulfillment_status: FulfillmentStatus::Unfulfilled,
            tags: String::new(),
            note: None,
            created_at: None,
            updated_at: None,
            synced_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let store = MemoryOrderStore::new();
        let connection_id = ConnectionId::generate();
        let id = store.insert(&order(connection_id, "1")).await.unwrap();

        let found = store
            .find_by_remote_id(connection_id, &RemoteOrderId::from("1"))
            .await
            .unwrap();
        assert_eq!(found, Some(id));

        let other_connection = store
            .find_by_remote_id(ConnectionId::generate(), &RemoteOrderId::from("1"))
            .await
            .unwrap();
        assert!(other_connection.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let store = MemoryOrderStore::new();
        let connection_id = ConnectionId::generate();
        store.insert(&order(connection_id, "1")).await.unwrap();

        let err = store.insert(&order(connection_id, "1")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_replaces_fields() {
        let store = MemoryOrderStore::new();
        let connection_id = ConnectionId::generate();
        let id = store.insert(&order(connection_id, "1")).await.unwrap();

        let mut changed = order(connection_id, "1");
        changed.financial_status = FinancialStatus::Paid;
        store.update(id, &changed).await.unwrap();

        let stored = store
            .get(connection_id, &RemoteOrderId::from("1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.order.financial_status, FinancialStatus::Paid);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let store = MemoryOrderStore::new();
        let err = store
            .update(LocalOrderId::generate(), &order(ConnectionId::generate(), "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_set_fulfillment_status() {
        let store = MemoryOrderStore::new();
        let connection_id = ConnectionId::generate();
        store.insert(&order(connection_id, "1")).await.unwrap();

        let remote_id = RemoteOrderId::from("1");
        let at = Utc::now();
        assert!(
            store
                .set_fulfillment_status(
                    connection_id,
                    &remote_id,
                    &FulfillmentStatus::Fulfilled,
                    at
                )
                .await
                .unwrap()
        );
        assert!(
            !store
                .set_fulfillment_status(
                    connection_id,
                    &RemoteOrderId::from("2"),
                    &FulfillmentStatus::Fulfilled,
                    at
                )
                .await
                .unwrap()
        );

        let stored = store.get(connection_id, &remote_id).await.unwrap().unwrap();
        assert_eq!(stored.order.fulfillment_status, FulfillmentStatus::Fulfilled);
        assert_eq!(stored.order.updated_at, Some(at));
    }

    #[tokio::test]
    async fn test_record_sync_accumulates() {
        let store = MemoryConnectionStore::new();
        let connection = Connection::new(
            TenantId::generate(),
            "demo.myshopify.com",
            SecretString::from("t"),
        );
        store.insert(&connection).await.unwrap();

        let at = Utc::now();
        store.record_sync(connection.id, 3, at).await.unwrap();
        store.record_sync(connection.id, 2, at).await.unwrap();

        let loaded = store.get(connection.id).await.unwrap().unwrap();
        assert_eq!(loaded.orders_synced, 5);
        assert_eq!(loaded.last_sync, Some(at));

        let err = store
            .record_sync(ConnectionId::generate(), 1, at)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
