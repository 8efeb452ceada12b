//! Order listing and lookup.

use secrecy::SecretString;
use tracing::{instrument, warn};

use super::types::{ListOrdersOptions, OrderEnvelope, OrderPage, OrdersEnvelope, RemoteOrder};
use super::{ApiRequest, ShopifyClient, path_segment};
use crate::error::IntegrationError;

impl ShopifyClient {
    /// Fetch one page of orders.
    ///
    /// Pagination is by `since_id`: while `has_more` is set, pass the
    /// returned `next_page_info` as the next call's `since_id`. Records that
    /// do not decode are returned in `rejected` rather than failing the page.
    ///
    /// # Errors
    ///
    /// Returns the executor's error, or `Decode` if the body has no `orders`
    /// array.
    #[instrument(skip(self, token, options), fields(limit = options.effective_limit()))]
    pub async fn list_orders(
        &self,
        host: &str,
        token: &SecretString,
        options: &ListOrdersOptions,
    ) -> Result<OrderPage, IntegrationError> {
        let base = if options.use_cache {
            ApiRequest::get("orders.json")
        } else {
            ApiRequest::get("orders.json").no_cache()
        };
        let request = options
            .query_params()
            .into_iter()
            .fold(base, |request, (key, value)| request.query(key, value));

        let response = self.execute(host, token, request).await?;
        let envelope: OrdersEnvelope = response.decode()?;

        let page = OrderPage::from_records(envelope.orders, options.effective_limit());
        for rejected in &page.rejected {
            warn!(order_id = ?rejected.order_id, error = %rejected.error, "Skipping undecodable order");
        }
        Ok(page)
    }

    /// Fetch a single order by id.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty or malformed id, the executor's error
    /// (404 surfaces as `Upstream`), or `Decode` if the body has no `order`.
    #[instrument(skip(self, token))]
    pub async fn get_order(
        &self,
        host: &str,
        token: &SecretString,
        order_id: &str,
    ) -> Result<RemoteOrder, IntegrationError> {
        let order_id = path_segment("order id", order_id)?;
        let response = self
            .execute(host, token, ApiRequest::get(format!("orders/{order_id}.json")))
            .await?;
        let envelope: OrderEnvelope = response.decode()?;
        Ok(envelope.order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::{ClientConfig, RetryPolicy};
    use crate::error::ErrorKind;

    fn client_for(_server: &MockServer) -> ShopifyClient {
        ShopifyClient::new(ClientConfig {
            scheme: "http".to_string(),
            retry: RetryPolicy {
                backoff_base: Duration::from_millis(1),
                ..RetryPolicy::default()
            },
            ..ClientConfig::default()
        })
        .unwrap()
    }

    fn host(server: &MockServer) -> String {
        server.address().to_string()
    }

    fn token() -> SecretString {
        SecretString::from("shpat_test")
    }

    #[tokio::test]
    async fn test_list_orders_sends_defaults_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/api/2023-10/orders.json"))
            .and(query_param("limit", "50"))
            .and(query_param("status", "any"))
            .and(header("X-Shopify-Access-Token", "shpat_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "orders": [{"id": 1, "name": "#1001"}, {"id": 2, "name": "#1002"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server)
            .list_orders(&host(&server), &token(), &ListOrdersOptions::default())
            .await
            .unwrap();

        assert_eq!(page.orders.len(), 2);
        assert!(!page.has_more);
        assert!(page.next_page_info.is_none());
    }

    #[tokio::test]
    async fn test_list_orders_without_cache_always_hits_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/api/2023-10/orders.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orders": [{"id": 1}]})))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let options = ListOrdersOptions {
            use_cache: false,
            ..ListOrdersOptions::default()
        };
        for _ in 0..2 {
            client
                .list_orders(&host(&server), &token(), &options)
                .await
                .unwrap();
        }
        assert_eq!(client.cache_stats().count, 0);
    }

    #[tokio::test]
    async fn test_list_orders_keeps_page_when_one_record_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/api/2023-10/orders.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "orders": [
                    {"id": 1, "total_price": "1.00"},
                    {"id": 2, "fulfillment_status": ["partial"]},
                    {"id": 3, "total_price": 3}
                ]
            })))
            .mount(&server)
            .await;

        let page = client_for(&server)
            .list_orders(&host(&server), &token(), &ListOrdersOptions::default())
            .await
            .unwrap();

        assert_eq!(page.orders.len(), 2);
        assert_eq!(page.orders[1].total_price.as_deref(), Some("3"));
        assert_eq!(page.rejected.len(), 1);
        assert_eq!(page.rejected[0].order_id.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_list_orders_clamps_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/api/2023-10/orders.json"))
            .and(query_param("limit", "250"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orders": []})))
            .expect(1)
            .mount(&server)
            .await;

        let options = ListOrdersOptions {
            limit: 1000,
            ..ListOrdersOptions::default()
        };
        let page = client_for(&server)
            .list_orders(&host(&server), &token(), &options)
            .await
            .unwrap();
        assert!(page.orders.is_empty());
        assert!(page.next_page_info.is_none());
    }

    #[tokio::test]
    async fn test_get_order_unwraps_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/api/2023-10/orders/450789469.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "order": {"id": 450_789_469, "total_price": "10.00"}
            })))
            .mount(&server)
            .await;

        let order = client_for(&server)
            .get_order(&host(&server), &token(), "450789469")
            .await
            .unwrap();
        assert_eq!(order.total_price.as_deref(), Some("10.00"));
    }

    #[tokio::test]
    async fn test_get_order_missing_envelope_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/api/2023-10/orders/1.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errors": "Not Found"})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .get_order(&host(&server), &token(), "1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_get_order_rejects_bad_id_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .get_order(&host(&server), &token(), "../shop")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
