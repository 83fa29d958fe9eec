//! Shopify Admin API client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chat_checkout_core::{CustomerId, OrderName};
use chrono::Utc;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::ShopifyError;
use super::types::{
    AddressesResponse, CreateOrderRequest, CustomerSearchResponse, DiscountCodeResponse,
    GraphQLRequest, GraphQLResponse, ORDER_BY_TAG_QUERY, OrderByTagVariables, OrderResponse,
    OrderRecord, OrdersByTagData, OrdersResponse, PriceRuleResponse, id_text,
};
use crate::address::{CustomerDirectory, DirectoryCustomer, RawAddress};
use crate::commerce::{CommerceBackend, OrderDraft, OrderStatus, PlacedOrder};
use crate::config::ShopifyConfig;
use crate::error::CheckoutError;
use crate::pricing::{DiscountRule, DiscountValidator};

/// Shopify Admin API client.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    client: reqwest::Client,
    base_url: String,
    access_token: SecretString,
}

impl std::fmt::Debug for ShopifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyClient")
            .field("base_url", &self.inner.base_url)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ShopifyClient {
    /// Create a new Admin API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ShopifyConfig, timeout: Duration) -> Result<Self, ShopifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(ShopifyClientInner {
                client,
                base_url: config.admin_base_url(),
                access_token: config.access_token.clone(),
            }),
        })
    }

    /// Endpoint URL with query parameters.
    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ShopifyError> {
        let mut url = Url::parse(&format!("{}/{path}", self.inner.base_url))
            .map_err(|e| ShopifyError::Api {
                status: 0,
                body: format!("invalid URL: {e}"),
            })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.inner
            .client
            .request(method, url)
            .header("X-Shopify-Access-Token", self.inner.access_token.expose_secret())
    }

    /// Send a request and decode a JSON body. `Ok(None)` on 404.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, ShopifyError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(2);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ShopifyError::Unauthorized(
                "Invalid or insufficient access token".to_string(),
            ));
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(ShopifyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, ShopifyError> {
        let url = self.url(path, query)?;
        self.send(self.request(Method::GET, url)).await
    }

    /// Customers whose phone matches `phone`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn search_customers_by_phone(
        &self,
        phone: &str,
    ) -> Result<CustomerSearchResponse, ShopifyError> {
        let query = format!("phone:{phone}");
        Ok(self
            .get("customers/search.json", &[("query", &query)])
            .await?
            .unwrap_or(CustomerSearchResponse {
                customers: Vec::new(),
            }))
    }

    /// Every address on file for a customer.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(customer = %id))]
    pub async fn get_customer_addresses(
        &self,
        id: &CustomerId,
    ) -> Result<Vec<RawAddress>, ShopifyError> {
        let response: Option<AddressesResponse> = self
            .get(&format!("customers/{id}/addresses.json"), &[])
            .await?;
        Ok(response.map(|r| r.addresses).unwrap_or_default())
    }

    /// The active rule behind a discount code, `None` if the code is
    /// unknown, expired, or of a kind that cannot be applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn lookup_discount(&self, code: &str) -> Result<Option<DiscountRule>, ShopifyError> {
        let lookup: Option<DiscountCodeResponse> = self
            .get("discount_codes/lookup.json", &[("code", code)])
            .await?;
        let Some(rule_id) = lookup
            .and_then(|l| l.discount_code)
            .and_then(|d| d.price_rule_id)
        else {
            debug!("Discount code not found");
            return Ok(None);
        };

        let rule: Option<PriceRuleResponse> = self
            .get(&format!("price_rules/{}.json", id_text(&rule_id)), &[])
            .await?;
        Ok(rule
            .and_then(|r| r.price_rule)
            .and_then(|r| r.to_discount(Utc::now())))
    }

    /// Create a paid order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or Shopify rejects the order.
    #[instrument(skip(self, draft), fields(tag = %draft.tag))]
    pub async fn create_order(&self, draft: &OrderDraft) -> Result<PlacedOrder, ShopifyError> {
        let url = self.url("orders.json", &[])?;
        let request = self
            .request(Method::POST, url)
            .json(&CreateOrderRequest::from(draft));

        let response: OrderResponse = self
            .send(request)
            .await?
            .ok_or_else(|| ShopifyError::NotFound("orders endpoint".to_string()))?;
        Ok(response.order.placed())
    }

    /// Look up an order by its display name, e.g. `#1001`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(order = %name))]
    pub async fn get_order_by_name(
        &self,
        name: &OrderName,
    ) -> Result<Option<OrderStatus>, ShopifyError> {
        let response: Option<OrdersResponse> = self
            .get(
                "orders.json",
                &[("name", name.as_str()), ("status", "any")],
            )
            .await?;
        Ok(response
            .and_then(|r| r.orders.into_iter().next())
            .map(OrderRecord::status))
    }

    /// The order carrying `tag`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    #[instrument(skip(self))]
    pub async fn find_order_by_tag(&self, tag: &str) -> Result<Option<PlacedOrder>, ShopifyError> {
        let url = self.url("graphql.json", &[])?;
        let search = format!("tag:'{tag}'");
        let request = self.request(Method::POST, url).json(&GraphQLRequest {
            query: ORDER_BY_TAG_QUERY,
            variables: OrderByTagVariables { query: &search },
        });

        let response: GraphQLResponse<OrdersByTagData> = self
            .send(request)
            .await?
            .ok_or_else(|| ShopifyError::NotFound("graphql endpoint".to_string()))?;

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(ShopifyError::GraphQL(messages.join("; ")));
        }

        Ok(response
            .data
            .and_then(|d| d.orders.edges.into_iter().next())
            .map(|edge| PlacedOrder::from(edge.node)))
    }
}

#[async_trait]
impl CustomerDirectory for ShopifyClient {
    async fn find_customer(
        &self,
        phone: &str,
    ) -> Result<Option<DirectoryCustomer>, CheckoutError> {
        let response = self.search_customers_by_phone(phone).await?;
        Ok(response
            .customers
            .into_iter()
            .next()
            .map(DirectoryCustomer::from))
    }

    async fn customer_addresses(&self, id: &CustomerId) -> Result<Vec<RawAddress>, CheckoutError> {
        Ok(self.get_customer_addresses(id).await?)
    }
}

#[async_trait]
impl DiscountValidator for ShopifyClient {
    async fn resolve(&self, code: &str) -> Result<Option<DiscountRule>, CheckoutError> {
        Ok(self.lookup_discount(code).await?)
    }
}

#[async_trait]
impl CommerceBackend for ShopifyClient {
    async fn find_customer_id(&self, phone: &str) -> Result<Option<CustomerId>, CheckoutError> {
        let response = self.search_customers_by_phone(phone).await?;
        Ok(response.customers.first().map(|c| c.customer_id()))
    }

    async fn find_order_by_tag(&self, tag: &str) -> Result<Option<PlacedOrder>, CheckoutError> {
        Ok(ShopifyClient::find_order_by_tag(self, tag).await?)
    }

    async fn create_order(&self, draft: &OrderDraft) -> Result<PlacedOrder, CheckoutError> {
        Ok(ShopifyClient::create_order(self, draft).await?)
    }

    async fn order_status(&self, name: &OrderName) -> Result<Option<OrderStatus>, CheckoutError> {
        Ok(self.get_order_by_name(name).await?)
    }
}
