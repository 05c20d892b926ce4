use crate::app::ports::CatalogPort;
use crate::config::CatalogConfig;
use crate::constants::NUMBER_FIELD;
use crate::error::{EnrichError, Result};
use crate::infra::credential_manager::CredentialManager;
use crate::metrics::RemoteCallTimer;
use crate::types::{DetailRecord, Envelope, PriceQuote, SearchBody, SearchFilter, SearchResult};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Stateless reqwest client for the catalog search, product and pricing endpoints
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
    category_id: u32,
    credentials: Arc<CredentialManager>,
}

impl CatalogClient {
    pub fn new(
        http: reqwest::Client,
        config: &CatalogConfig,
        credentials: Arc<CredentialManager>,
    ) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            category_id: config.category_id,
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.api_version, path)
    }

    fn authorize(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let credential = self.credentials.current()?;
        Ok(req
            .header(AUTHORIZATION, format!("bearer {}", credential.token))
            .header(CONTENT_TYPE, "application/json"))
    }

    /// Send the request and unwrap the response envelope.
    async fn fetch<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        subject: &str,
        req: RequestBuilder,
    ) -> Result<Vec<T>> {
        let req = self.authorize(req)?;
        let _timer = RemoteCallTimer::start(operation);
        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        debug!(operation, status = status.as_u16(), bytes = bytes.len(), "Catalog response");

        // The service reports "No products were found" as a 404 envelope.
        if status == StatusCode::NOT_FOUND {
            return Err(EnrichError::NotFound(subject.to_string()));
        }
        if !status.is_success() {
            let detail = serde_json::from_slice::<Envelope<serde_json::Value>>(&bytes)
                .ok()
                .filter(|env| !env.errors.is_empty())
                .map(|env| format!(": {}", env.errors.join("; ")))
                .unwrap_or_default();
            let message = format!("{operation} returned HTTP {}{detail}", status.as_u16());
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => EnrichError::Auth(message),
                _ => EnrichError::Remote { message },
            });
        }

        let envelope: Envelope<T> = serde_json::from_slice(&bytes).map_err(|e| EnrichError::Remote {
            message: format!("malformed {operation} response: {e}"),
        })?;
        envelope.into_results()
    }
}

#[async_trait]
impl CatalogPort for CatalogClient {
    #[instrument(skip(self))]
    async fn search(&self, identifier: &str) -> Result<SearchResult> {
        let body = SearchBody {
            filters: vec![SearchFilter {
                name: NUMBER_FIELD,
                values: vec![identifier],
            }],
        };
        let req = self
            .http
            .post(self.url(&format!("catalog/categories/{}/search", self.category_id)))
            .json(&body);
        let candidate_product_ids = self.fetch::<i64>("search", identifier, req).await?;
        if candidate_product_ids.is_empty() {
            return Err(EnrichError::NotFound(identifier.to_string()));
        }
        Ok(SearchResult {
            candidate_product_ids,
        })
    }

    #[instrument(skip(self))]
    async fn detail(&self, product_id: i64) -> Result<DetailRecord> {
        let req = self
            .http
            .get(self.url(&format!("catalog/products/{product_id}")))
            .query(&[("getExtendedFields", "true")]);
        self.fetch::<DetailRecord>("detail", &format!("product {product_id}"), req)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EnrichError::NotFound(format!("product {product_id}")))
    }

    #[instrument(skip(self))]
    async fn price(&self, product_id: i64) -> Result<Vec<PriceQuote>> {
        let req = self
            .http
            .get(self.url(&format!("pricing/product/{product_id}")));
        self.fetch("price", &format!("product {product_id}"), req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::CredentialPort;
    use crate::config::ClientCredentials;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> CatalogClient {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "expires_in": 3600
            })))
            .mount(server)
            .await;
        let http = reqwest::Client::new();
        let manager = Arc::new(CredentialManager::new(http.clone(), &server.uri()));
        manager
            .refresh(&ClientCredentials::new("id", "secret"))
            .await
            .unwrap();
        let config = CatalogConfig {
            base_url: server.uri(),
            ..CatalogConfig::default()
        };
        CatalogClient::new(http, &config, manager)
    }

    #[tokio::test]
    async fn search_posts_number_filter_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.37.0/catalog/categories/2/search"))
            .and(header("authorization", "bearer tok"))
            .and(body_json(json!({
                "filters": [{"name": "Number", "values": ["LOB-001"]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "errors": [], "results": [500, 501]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client.search("LOB-001").await.unwrap();
        assert_eq!(result.first_candidate(), Some(500));
    }

    #[tokio::test]
    async fn empty_search_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.37.0/catalog/categories/2/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "errors": [], "results": []
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.search("NOPE-000").await.unwrap_err();
        assert!(matches!(err, EnrichError::NotFound(ref id) if id == "NOPE-000"));
    }

    #[tokio::test]
    async fn not_found_envelope_on_404() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.37.0/catalog/categories/2/search"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "success": false, "errors": ["No products were found."], "results": []
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(client.search("NOPE-000").await.unwrap_err().kind(), "not_found");
    }

    #[tokio::test]
    async fn errors_on_http_200_are_remote_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.37.0/pricing/product/500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false, "errors": ["Access denied."], "results": []
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        match client.price(500).await {
            Err(EnrichError::Remote { message }) => assert_eq!(message, "Access denied."),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_without_envelope_is_remote() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.37.0/pricing/product/500"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"Message": "An error has occurred."})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        match client.price(500).await {
            Err(EnrichError::Remote { message }) => assert!(message.contains("HTTP 500")),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_token_is_auth_not_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.37.0/catalog/categories/2/search"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "message": "Authorization has been denied for this request."
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.search("LOB-001").await.unwrap_err();
        assert_eq!(err.kind(), "auth");
        assert!(err.to_string().contains("HTTP 401"));
    }

    #[tokio::test]
    async fn error_list_on_failed_status_is_kept_in_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.37.0/catalog/products/500"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false, "errors": ["Invalid productId."], "results": []
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        match client.detail(500).await {
            Err(EnrichError::Remote { message }) => {
                assert!(message.contains("HTTP 400"));
                assert!(message.contains("Invalid productId."));
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn detail_requests_extended_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.37.0/catalog/products/500"))
            .and(query_param("getExtendedFields", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "results": [{
                    "productId": 500,
                    "name": "Blue-Eyes White Dragon",
                    "imageUrl": "https://example.com/500.jpg",
                    "extendedData": [{"name": "Number", "displayName": "Card Number", "value": "LOB-001"}]
                }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let detail = client.detail(500).await.unwrap();
        assert_eq!(detail.name, "Blue-Eyes White Dragon");
        assert_eq!(detail.number(), Some("LOB-001"));
    }

    #[tokio::test]
    async fn price_returns_every_variant() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.37.0/pricing/product/500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "results": [
                    {"productId": 500, "lowPrice": null, "midPrice": null, "highPrice": null,
                     "marketPrice": 0.0, "directLowPrice": null, "subTypeName": "Unlimited"},
                    {"productId": 500, "lowPrice": 40.0, "midPrice": 50.0, "highPrice": 80.0,
                     "marketPrice": 45.5, "directLowPrice": null, "subTypeName": "1st Edition"}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let quotes = client.price(500).await.unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[1].market_price, Some(45.5));
    }

    #[tokio::test]
    async fn calls_fail_without_credential() {
        let server = MockServer::start().await;
        let http = reqwest::Client::new();
        let manager = Arc::new(CredentialManager::new(http.clone(), &server.uri()));
        let config = CatalogConfig {
            base_url: server.uri(),
            ..CatalogConfig::default()
        };
        let client = CatalogClient::new(http, &config, manager);
        assert_eq!(client.detail(1).await.unwrap_err().kind(), "auth");
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
