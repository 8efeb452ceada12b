//! Connection-level workflows built on the client and the stores.

use std::sync::Arc;

use chrono::Utc;
use deliveryos_core::{ConnectionId, FulfillmentStatus, RemoteOrderId};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use super::{SyncFailure, SyncReconciler, SyncResult};
use crate::db::{ConnectionStore, OrderStore, RepositoryError};
use crate::error::IntegrationError;
use crate::models::Connection;
use crate::shopify::{Fulfillment, FulfillmentOptions, ListOrdersOptions, ShopifyClient};

/// Orders fetched per connection sync.
pub const SYNC_PAGE_LIMIT: u32 = 100;

/// Errors from connection-level workflows.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("connection {0} not found")]
    ConnectionNotFound(ConnectionId),
}

/// Runs syncs and fulfillments for stored connections.
#[derive(Clone)]
pub struct OrderSyncService {
    client: ShopifyClient,
    orders: Arc<dyn OrderStore>,
    connections: Arc<dyn ConnectionStore>,
    reconciler: SyncReconciler,
}

impl OrderSyncService {
    /// Create a service.
    #[must_use]
    pub fn new(
        client: ShopifyClient,
        orders: Arc<dyn OrderStore>,
        connections: Arc<dyn ConnectionStore>,
    ) -> Self {
        let reconciler = SyncReconciler::new(Arc::clone(&orders));
        Self {
            client,
            orders,
            connections,
            reconciler,
        }
    }

    /// The underlying API client.
    #[must_use]
    pub const fn client(&self) -> &ShopifyClient {
        &self.client
    }

    /// The reconciler used by [`OrderSyncService::sync_connection`].
    #[must_use]
    pub const fn reconciler(&self) -> &SyncReconciler {
        &self.reconciler
    }

    /// Fetch the latest page of orders for a connection and reconcile it.
    ///
    /// Uses a page of [`SYNC_PAGE_LIMIT`] orders with any status.
    ///
    /// # Errors
    ///
    /// See [`OrderSyncService::sync_connection_with`].
    pub async fn sync_connection(&self, id: ConnectionId) -> Result<SyncResult, ServiceError> {
        let options = ListOrdersOptions {
            limit: SYNC_PAGE_LIMIT,
            ..ListOrdersOptions::default()
        };
        self.sync_connection_with(id, &options).await
    }

    /// Fetch one page of orders matching `options` and reconcile it.
    ///
    /// The page is always read from upstream, bypassing the response cache.
    /// Records on the page that do not decode are reported as failures
    /// alongside the ones the reconciler rejects.
    ///
    /// On completion the connection's `orders_synced` grows by
    /// `result.synced` and `last_sync` is stamped. A failure to record those
    /// counters is logged; the sync result is still returned.
    ///
    /// # Errors
    ///
    /// - `ConnectionNotFound` if the connection does not exist
    /// - `Integration(Validation)` if the connection is inactive
    /// - `Integration` if the page cannot be fetched
    /// - `Repository` if the connection cannot be loaded
    #[instrument(skip(self, options))]
    pub async fn sync_connection_with(
        &self,
        id: ConnectionId,
        options: &ListOrdersOptions,
    ) -> Result<SyncResult, ServiceError> {
        let connection = self.active_connection(id).await?;

        let options = ListOrdersOptions {
            use_cache: false,
            ..options.clone()
        };
        let page = self
            .client
            .list_orders(&connection.shop_domain, &connection.access_token, &options)
            .await?;

        let mut result = self
            .reconciler
            .sync_orders(connection.tenant_id, connection.id, &page.orders)
            .await;
        result
            .errors
            .extend(page.rejected.into_iter().map(|rejected| SyncFailure {
                order_id: rejected.order_id,
                error: rejected.error,
            }));

        if let Err(e) = self
            .connections
            .record_sync(connection.id, result.synced, Utc::now())
            .await
        {
            error!(connection_id = %connection.id, error = %e, "Failed to record sync counters");
        }

        info!(
            connection_id = %connection.id,
            shop = %connection.shop_domain,
            synced = result.synced,
            failed = result.errors.len(),
            has_more = page.has_more,
            "Connection sync complete"
        );
        Ok(result)
    }

    /// Fulfill an order upstream, then mark the local copy fulfilled and
    /// stamp its `updated_at`.
    ///
    /// The local update is best effort: if it fails the upstream fulfillment
    /// is still returned.
    ///
    /// # Errors
    ///
    /// - `ConnectionNotFound` if the connection does not exist
    /// - `Integration` if the connection is inactive or the upstream call fails
    /// - `Repository` if the connection cannot be loaded
    #[instrument(skip(self, options))]
    pub async fn fulfill_order(
        &self,
        id: ConnectionId,
        order_id: &str,
        options: &FulfillmentOptions,
    ) -> Result<Fulfillment, ServiceError> {
        let connection = self.active_connection(id).await?;

        let fulfillment = self
            .client
            .fulfill_order(
                &connection.shop_domain,
                &connection.access_token,
                order_id,
                options,
            )
            .await?;

        let remote_id = RemoteOrderId::new(order_id.trim());
        match self
            .orders
            .set_fulfillment_status(
                connection.id,
                &remote_id,
                &FulfillmentStatus::Fulfilled,
                Utc::now(),
            )
            .await
        {
            Ok(true) => info!(order_id, "Marked local order fulfilled"),
            Ok(false) => warn!(order_id, "Fulfilled order is not stored locally"),
            Err(e) => error!(order_id, error = %e, "Failed to mark local order fulfilled"),
        }

        Ok(fulfillment)
    }

    async fn active_connection(&self, id: ConnectionId) -> Result<Connection, ServiceError> {
        let connection = self
            .connections
            .get(id)
            .await?
            .ok_or(ServiceError::ConnectionNotFound(id))?;

        if !connection.is_active {
            return Err(IntegrationError::Validation(format!(
                "Connection {id} is inactive"
            ))
            .into());
        }
        Ok(connection)
    }
}

impl std::fmt::Debug for OrderSyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSyncService")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
