//! Fulfillment mutations. None of these are cached.

use secrecy::SecretString;
use tracing::instrument;

use super::types::{Fulfillment, FulfillmentOptions, FulfillmentResponse, TrackingOptions};
use super::{ApiRequest, ShopifyClient, path_segment};
use crate::error::IntegrationError;

impl ShopifyClient {
    /// Create a fulfillment for an order, optionally for a subset of its
    /// line items.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a bad order id or a zero-quantity line item,
    /// otherwise the executor's error or `Decode`.
    #[instrument(skip(self, token, options))]
    pub async fn fulfill_order(
        &self,
        host: &str,
        token: &SecretString,
        order_id: &str,
        options: &FulfillmentOptions,
    ) -> Result<Fulfillment, IntegrationError> {
        let order_id = path_segment("order id", order_id)?;
        let request = ApiRequest::post(
            format!("orders/{order_id}/fulfillments.json"),
            options.to_payload()?,
        )
        .no_cache();

        let response = self.execute(host, token, request).await?;
        Ok(response.decode::<FulfillmentResponse>()?.fulfillment)
    }

    /// Cancel an existing fulfillment.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for bad ids, otherwise the executor's error or
    /// `Decode`.
    #[instrument(skip(self, token))]
    pub async fn cancel_fulfillment(
        &self,
        host: &str,
        token: &SecretString,
        order_id: &str,
        fulfillment_id: &str,
    ) -> Result<Fulfillment, IntegrationError> {
        let order_id = path_segment("order id", order_id)?;
        let fulfillment_id = path_segment("fulfillment id", fulfillment_id)?;
        let request = ApiRequest::post(
            format!("orders/{order_id}/fulfillments/{fulfillment_id}/cancel.json"),
            serde_json::json!({}),
        )
        .no_cache();

        let response = self.execute(host, token, request).await?;
        Ok(response.decode::<FulfillmentResponse>()?.fulfillment)
    }

    /// Replace the tracking details on an existing fulfillment.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for bad ids, otherwise the executor's error or
    /// `Decode`.
    #[instrument(skip(self, token, options))]
    pub async fn update_tracking(
        &self,
        host: &str,
        token: &SecretString,
        order_id: &str,
        fulfillment_id: &str,
        options: &TrackingOptions,
    ) -> Result<Fulfillment, IntegrationError> {
        let order_id = path_segment("order id", order_id)?;
        let fulfillment_id = path_segment("fulfillment id", fulfillment_id)?;
        let request = ApiRequest::put(
            format!("orders/{order_id}/fulfillments/{fulfillment_id}.json"),
            options.to_payload()?,
        )
        .no_cache();

        let response = self.execute(host, token, request).await?;
        Ok(response.decode::<FulfillmentResponse>()?.fulfillment)
    }
}
