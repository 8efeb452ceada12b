//! Order reconciliation.
//!
//! [`SyncReconciler`] upserts a batch of remote orders one at a time, keyed
//! by `(connection_id, shopify_order_id)`. A record that fails to project or
//! persist is reported in [`SyncResult::errors`] and the batch carries on.
//! Records are processed strictly in order, so a batch never races itself.
//!
//! Re-running a batch is idempotent: every record is found on the second
//! pass and updated in place.

pub mod projection;
pub mod service;

use std::sync::Arc;

use chrono::Utc;
use deliveryos_core::{ConnectionId, TenantId};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::db::{OrderStore, RepositoryError};
use crate::shopify::RemoteOrder;

pub use projection::{ProjectionError, project_order};
pub use service::{OrderSyncService, SYNC_PAGE_LIMIT, ServiceError};

/// A record that could not be synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    /// Remote order id, if the record had one.
    pub order_id: Option<String>,
    /// Human-readable cause.
    pub error: String,
}

/// Outcome of a sync batch.
///
/// `synced == created + updated`, and `synced + errors.len()` equals the
/// number of records submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub synced: u64,
    pub created: u64,
    pub updated: u64,
    pub errors: Vec<SyncFailure>,
}

impl SyncResult {
    /// Records submitted in the batch.
    #[must_use]
    pub fn attempted(&self) -> u64 {
        self.synced + u64::try_from(self.errors.len()).unwrap_or(u64::MAX)
    }

    /// Whether every record synced.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upsert {
    Created,
    Updated,
}

#[derive(Debug, Error)]
enum RecordError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Upserts remote orders into an [`OrderStore`].
#[derive(Clone)]
pub struct SyncReconciler {
    orders: Arc<dyn OrderStore>,
}

impl SyncReconciler {
    /// Create a reconciler writing to `orders`.
    #[must_use]
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    /// Upsert every order in `orders`.
    ///
    /// Never fails as a whole; per-record problems are collected in the
    /// result.
    #[instrument(skip(self, orders), fields(count = orders.len()))]
    pub async fn sync_orders(
        &self,
        tenant_id: TenantId,
        connection_id: ConnectionId,
        orders: &[RemoteOrder],
    ) -> SyncResult {
        let mut result = SyncResult::default();

        for remote in orders {
            let order_id = remote.id.as_ref().map(ToString::to_string);
            match self.upsert(tenant_id, connection_id, remote).await {
                Ok(Upsert::Created) => {
                    result.created += 1;
                    result.synced += 1;
                    debug!(order_id = ?order_id, "Created local order");
                }
                Ok(Upsert::Updated) => {
                    result.updated += 1;
                    result.synced += 1;
                    debug!(order_id = ?order_id, "Updated local order");
                }
                Err(e) => {
                    warn!(order_id = ?order_id, error = %e, "Failed to sync order");
                    result.errors.push(SyncFailure {
                        order_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            synced = result.synced,
            created = result.created,
            updated = result.updated,
            failed = result.errors.len(),
            "Order sync finished"
        );
        result
    }

    async fn upsert(
        &self,
        tenant_id: TenantId,
        connection_id: ConnectionId,
        remote: &RemoteOrder,
    ) -> Result<Upsert, RecordError> {
        let local = project_order(tenant_id, connection_id, remote, Utc::now())?;

        match self
            .orders
            .find_by_remote_id(connection_id, &local.shopify_order_id)
            .await?
        {
            Some(id) => {
                self.orders.update(id, &local).await?;
                Ok(Upsert::Updated)
            }
            None => {
                self.orders.insert(&local).await?;
                Ok(Upsert::Created)
            }
        }
    }
}

impl std::fmt::Debug for SyncReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncReconciler").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use chrono::DateTime;
    use deliveryos_core::{FulfillmentStatus, LocalOrderId, RemoteOrderId};

    use super::*;
    use crate::db::MemoryOrderStore;
    use crate::models::{LocalOrder, StoredOrder};

    fn remote(id: u64) -> RemoteOrder {
        RemoteOrder {
            id: Some(RemoteOrderId::from(id)),
            total_price: Some("10.00".to_string()),
            ..RemoteOrder::default()
        }
    }

    /// Delegates to a memory store but refuses to insert one remote id.
    struct FailingStore {
        inner: MemoryOrderStore,
        poison: RemoteOrderId,
    }

    #[async_trait]
    impl OrderStore for FailingStore {
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
            if order.shopify_order_id == self.poison {
                return Err(RepositoryError::DataCorruption("disk on fire".to_string()));
            }
            self.inner.insert(order).await
        }

        async fn update(
            &self,
            id: LocalOrderId,
            order: &LocalOrder,
        ) -> Result<(), RepositoryError> {
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

    #[tokio::test]
    async fn test_first_sync_creates_second_updates() {
        let store = Arc::new(MemoryOrderStore::new());
        let reconciler = SyncReconciler::new(store.clone());
        let tenant = TenantId::generate();
        let connection = ConnectionId::generate();
        let orders = vec![remote(1), remote(2), remote(3)];

        let first = reconciler.sync_orders(tenant, connection, &orders).await;
        assert_eq!(first.created, 3);
        assert_eq!(first.updated, 0);
        assert_eq!(first.synced, 3);
        assert!(first.is_complete());

        let second = reconciler.sync_orders(tenant, connection, &orders).await;
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 3);
        assert_eq!(second.synced, 3);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_record() {
        let store = Arc::new(FailingStore {
            inner: MemoryOrderStore::new(),
            poison: RemoteOrderId::from(2_u64),
        });
        let reconciler = SyncReconciler::new(store.clone());
        let orders = vec![remote(1), remote(2), remote(3)];

        let result = reconciler
            .sync_orders(TenantId::generate(), ConnectionId::generate(), &orders)
            .await;

        assert_eq!(result.synced, 2);
        assert_eq!(result.created, 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].order_id.as_deref(), Some("2"));
        assert!(result.errors[0].error.contains("disk on fire"));
        assert_eq!(result.attempted(), 3);
        assert_eq!(store.inner.len().await, 2);
    }

    #[tokio::test]
    async fn test_unprojectable_records_are_reported() {
        let reconciler = SyncReconciler::new(Arc::new(MemoryOrderStore::new()));
        let mut bad_money = remote(2);
        bad_money.total_price = Some("ten dollars".to_string());
        let orders = vec![RemoteOrder::default(), bad_money, remote(3)];

        let result = reconciler
            .sync_orders(TenantId::generate(), ConnectionId::generate(), &orders)
            .await;

        assert_eq!(result.synced, 1);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].order_id, None);
        assert_eq!(result.errors[0].error, "order has no id");
        assert_eq!(result.errors[1].order_id.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let reconciler = SyncReconciler::new(Arc::new(MemoryOrderStore::new()));
        let result = reconciler
            .sync_orders(TenantId::generate(), ConnectionId::generate(), &[])
            .await;
        assert_eq!(result, SyncResult::default());
    }

    #[tokio::test]
    async fn test_same_remote_id_in_two_connections_is_two_records() {
        let store = Arc::new(MemoryOrderStore::new());
        let reconciler = SyncReconciler::new(store.clone());
        let tenant = TenantId::generate();

        reconciler
            .sync_orders(tenant, ConnectionId::generate(), &[remote(1)])
            .await;
        reconciler
            .sync_orders(tenant, ConnectionId::generate(), &[remote(1)])
            .await;

        assert_eq!(store.len().await, 2);
    }
}
