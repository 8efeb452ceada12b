//! Shop metadata and connection checks.

use secrecy::SecretString;
use tracing::{info, instrument, warn};

use super::types::{ConnectionTest, Shop, ShopEnvelope};
use super::{ApiRequest, ShopifyClient};
use crate::error::IntegrationError;

impl ShopifyClient {
    /// Check that the shop answers with these credentials.
    ///
    /// Makes a single uncached attempt and never fails: problems are
    /// reported in the returned [`ConnectionTest`].
    #[instrument(skip(self, token))]
    pub async fn test_connection(&self, host: &str, token: &SecretString) -> ConnectionTest {
        let request = ApiRequest::get("shop.json").retries(1).no_cache();
        let result = match self.execute(host, token, request).await {
            Ok(response) => response.decode::<ShopEnvelope>(),
            Err(e) => Err(e),
        };

        match result {
            Ok(envelope) => {
                info!(shop = ?envelope.shop.name, "Shopify connection ok");
                ConnectionTest {
                    success: true,
                    shop: Some(envelope.shop),
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Shopify connection test failed");
                ConnectionTest {
                    success: false,
                    shop: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Fetch shop metadata. Served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns the executor's error, or `Decode` if the body has no `shop`.
    #[instrument(skip(self, token))]
    pub async fn get_shop(&self, host: &str, token: &SecretString) -> Result<Shop, IntegrationError> {
        let response = self.execute(host, token, ApiRequest::get("shop.json")).await?;
        Ok(response.decode::<ShopEnvelope>()?.shop)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::ClientConfig;

    fn client() -> ShopifyClient {
        ShopifyClient::new(ClientConfig {
            scheme: "http".to_string(),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_connection_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/api/2023-10/shop.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "shop": {"id": 1, "name": "Demo", "myshopify_domain": "demo.myshopify.com"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client()
            .test_connection(&server.address().to_string(), &SecretString::from("t"))
            .await;

        assert!(result.success);
        assert_eq!(result.shop.unwrap().name.as_deref(), Some("Demo"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_connection_failure_makes_one_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/api/2023-10/shop.json"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client();
        let result = client
            .test_connection(&server.address().to_string(), &SecretString::from("bad"))
            .await;

        assert!(!result.success);
        assert!(result.shop.is_none());
        assert!(result.error.unwrap().contains("401"));
        assert_eq!(client.cache_stats().count, 0);
    }

    #[tokio::test]
    async fn test_connection_with_missing_token() {
        let result = client()
            .test_connection("demo.myshopify.com", &SecretString::from(""))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Authentication"));
    }

    #[tokio::test]
    async fn test_get_shop_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/api/2023-10/shop.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "shop": {"id": 1, "currency": "USD"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client();
        let host = server.address().to_string();
        let token = SecretString::from("t");
        let first = client.get_shop(&host, &token).await.unwrap();
        let second = client.get_shop(&host, &token).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.cache_stats().count, 1);
    }
}
