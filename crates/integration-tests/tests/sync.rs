//! Order reconciliation end to end.
//!
//! The `PostgreSQL` test is ignored by default and needs `DATABASE_URL`:
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo test -p deliveryos-integration-tests -- --ignored
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deliveryos_core::{ConnectionId, FulfillmentStatus, LocalOrderId, Money, RemoteOrderId, TenantId};
use deliveryos_integration::db::{
    ConnectionStore, MemoryConnectionStore, MemoryOrderStore, OrderStore, PgConnectionStore,
    PgOrderStore, RepositoryError, create_pool,
};
use deliveryos_integration::models::{Connection, LocalOrder, StoredOrder};
use deliveryos_integration::shopify::{FulfillmentOptions, RemoteOrder};
use deliveryos_integration::{OrderSyncService, SyncReconciler};
use deliveryos_integration_tests::{api_path, host, mock_client, order_json, token};
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Memory store that refuses to insert one particular remote order.
struct RejectingStore {
    inner: MemoryOrderStore,
    reject: RemoteOrderId,
}

#[async_trait]
impl OrderStore for RejectingStore {
    async fn find_by_remote_id(
        &self,
        connection_id: ConnectionId,
        remote_id: &RemoteOrderId,
    ) -> Result<Option<LocalOrderId>, RepositoryError> {
        self.inner.find_by_remote_id(connection_id, remote_id).await
    }

    async fn get(
        &self,
        connection_id: ConnectionId,
        remote_id: &RemoteOrderId,
    ) -> Result<Option<StoredOrder>, RepositoryError> {
        self.inner.get(connection_id, remote_id).await
    }

    async fn insert(&self, order: &LocalOrder) -> Result<LocalOrderId, RepositoryError> {
        if order.shopify_order_id == self.reject {
            return Err(RepositoryError::DataCorruption("disk full".to_string()));
        }
        self.inner.insert(order).await
    }

    async fn update(&self, id: LocalOrderId, order: &LocalOrder) -> Result<(), RepositoryError> {
        self.inner.update(id, order).await
    }

    async fn set_fulfillment_status(
        &self,
        connection_id: ConnectionId,
        remote_id: &RemoteOrderId,
        status: &FulfillmentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        self.inner
            .set_fulfillment_status(connection_id, remote_id, status, at)
            .await
    }
}

fn remote(value: Value) -> RemoteOrder {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_partial_failure_keeps_going() {
    let store = Arc::new(RejectingStore {
        inner: MemoryOrderStore::new(),
        reject: RemoteOrderId::from(2_u64),
    });
    let reconciler = SyncReconciler::new(store.clone());

    let mut bad_money = order_json(4, "10.00");
    bad_money["total_price"] = json!("ten dollars");
    let orders = vec![
        remote(order_json(1, "10.00")),
        remote(order_json(2, "20.00")),
        remote(order_json(3, "30.00")),
        remote(bad_money),
        remote(json!({"email": "no-id@example.com"})),
    ];

    let result = reconciler
        .sync_orders(TenantId::generate(), ConnectionId::generate(), &orders)
        .await;

    assert_eq!(result.synced, 2);
    assert_eq!(result.created, 2);
    assert_eq!(result.updated, 0);
    assert_eq!(result.errors.len(), 3);
    assert_eq!(result.attempted(), 5);
    assert!(!result.is_complete());

    let failed: Vec<Option<&str>> = result
        .errors
        .iter()
        .map(|failure| failure.order_id.as_deref())
        .collect();
    assert_eq!(failed, vec![Some("2"), Some("4"), None]);
    assert!(result.errors[0].error.contains("disk full"));
    assert_eq!(store.inner.len().await, 2);
}

#[tokio::test]
async fn test_service_sync_is_idempotent_and_tracks_updates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("orders.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [order_json(1, "10.00"), order_json(2, "20.00")]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    let mut changed = order_json(2, "25.00");
    changed["fulfillment_status"] = json!("partial");
    Mock::given(method("GET"))
        .and(path(api_path("orders.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [order_json(1, "10.00"), changed]
        })))
        .mount(&server)
        .await;

    let orders = Arc::new(MemoryOrderStore::new());
    let connections = Arc::new(MemoryConnectionStore::new());
    let connection = Connection::new(TenantId::generate(), host(&server), token());
    connections.insert(&connection).await.unwrap();
    let service = OrderSyncService::new(mock_client(), orders.clone(), connections.clone());

    let first = service.sync_connection(connection.id).await.unwrap();
    assert_eq!((first.created, first.updated), (2, 0));

    let second = service.sync_connection(connection.id).await.unwrap();
    assert_eq!((second.created, second.updated), (0, 2));
    assert!(second.is_complete());
    assert_eq!(orders.len().await, 2);

    let stored = orders
        .get(connection.id, &RemoteOrderId::from(2_u64))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.order.total_price, "25.00".parse::<Money>().unwrap());
    assert_eq!(stored.order.fulfillment_status, FulfillmentStatus::Partial);

    let connection = connections.get(connection.id).await.unwrap().unwrap();
    assert_eq!(connection.orders_synced, 4);
    assert!(connection.last_sync.is_some());
}

#[tokio::test]
async fn test_fulfill_through_service_marks_local_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("orders.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [order_json(7, "70.00")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("orders/7/fulfillments.json")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "fulfillment": {"id": 70, "order_id": 7, "status": "success"}
        })))
        .mount(&server)
        .await;

    let orders = Arc::new(MemoryOrderStore::new());
    let connections = Arc::new(MemoryConnectionStore::new());
    let connection = Connection::new(TenantId::generate(), host(&server), token());
    connections.insert(&connection).await.unwrap();
    let service = OrderSyncService::new(mock_client(), orders.clone(), connections);

    service.sync_connection(connection.id).await.unwrap();
    let fulfillment = service
        .fulfill_order(connection.id, "7", &FulfillmentOptions::default())
        .await
        .unwrap();
    assert_eq!(fulfillment.id, Some(70));

    let stored = orders
        .get(connection.id, &RemoteOrderId::from(7_u64))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.order.fulfillment_status, FulfillmentStatus::Fulfilled);
    assert!(stored.order.updated_at.unwrap() >= stored.order.synced_at);
}

#[tokio::test]
async fn test_sync_survives_malformed_record_in_page() {
    let server = MockServer::start().await;
    let mut numeric_total = order_json(2, "0");
    numeric_total["total_price"] = json!(2.5);
    let mut bad_status = order_json(3, "3.00");
    bad_status["financial_status"] = json!(false);
    Mock::given(method("GET"))
        .and(path(api_path("orders.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [order_json(1, "1.00"), numeric_total, bad_status, order_json(4, "4.00")]
        })))
        .mount(&server)
        .await;

    let orders = Arc::new(MemoryOrderStore::new());
    let connections = Arc::new(MemoryConnectionStore::new());
    let connection = Connection::new(TenantId::generate(), host(&server), token());
    connections.insert(&connection).await.unwrap();
    let service = OrderSyncService::new(mock_client(), orders.clone(), connections.clone());

    let result = service.sync_connection(connection.id).await.unwrap();

    assert_eq!(result.synced, 3);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].order_id.as_deref(), Some("3"));
    assert_eq!(orders.len().await, 3);

    let second = orders
        .get(connection.id, &RemoteOrderId::from(2_u64))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.order.total_price.to_string(), "2.50");

    let connection = connections.get(connection.id).await.unwrap().unwrap();
    assert_eq!(connection.orders_synced, 3);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable PostgreSQL database"]
async fn test_postgres_round_trip() {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = create_pool(&SecretString::from(database_url)).await.unwrap();
    sqlx::migrate!("../integration/migrations")
        .run(&pool)
        .await
        .unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("orders.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [order_json(11, "11.00"), order_json(12, "12.00")]
        })))
        .mount(&server)
        .await;

    let orders = Arc::new(PgOrderStore::new(pool.clone()));
    let connections = Arc::new(PgConnectionStore::new(pool));
    let connection = Connection::new(TenantId::generate(), host(&server), token());
    connections.insert(&connection).await.unwrap();
    let service = OrderSyncService::new(mock_client(), orders.clone(), connections.clone());

    let first = service.sync_connection(connection.id).await.unwrap();
    assert_eq!(first.created, 2);
    let second = service.sync_connection(connection.id).await.unwrap();
    assert_eq!(second.updated, 2);

    let stored = orders
        .get(connection.id, &RemoteOrderId::from(12_u64))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.order.customer_name, "Ada Lovelace");
    assert_eq!(stored.order.total_price.to_string(), "12.00");

    let reloaded = connections.get(connection.id).await.unwrap().unwrap();
    assert_eq!(reloaded.orders_synced, 4);
}
