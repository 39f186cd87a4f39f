//! Coinbase REST Catalog
//!
//! Loads the product list from `GET {rest_url}/products`. Catalog order is
//! kept as returned.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::ports::{CatalogError, CatalogSource};
use crate::domain::market::CatalogEntry;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// The exchange rejects requests without a user agent.
const USER_AGENT: &str = concat!("ticker-stream/", env!("CARGO_PKG_VERSION"));

/// One product from the products endpoint. Unused fields are skipped.
#[derive(Debug, Clone, Deserialize)]
struct ProductResponse {
    id: String,
    display_name: String,
    quote_increment: Decimal,
}

impl From<ProductResponse> for CatalogEntry {
    fn from(product: ProductResponse) -> Self {
        Self::new(product.id, product.display_name, product.quote_increment)
    }
}

/// REST client for the instrument catalog.
#[derive(Debug, Clone)]
pub struct CoinbaseRestClient {
    client: Client,
    base_url: String,
}

impl CoinbaseRestClient {
    /// Create a client rooted at `base_url` (e.g. `https://api.exchange.coinbase.com`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CatalogError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn products_url(&self) -> String {
        format!("{}/products", self.base_url)
    }
}

#[async_trait]
impl CatalogSource for CoinbaseRestClient {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let url = self.products_url();
        tracing::info!(url = %url, "Fetching product catalog");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let products: Vec<ProductResponse> = response
            .json()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))?;

        tracing::info!(products = products.len(), "Product catalog loaded");
        Ok(products.into_iter().map(CatalogEntry::from).collect())
    }
}
