//! Product catalog client.
//!
//! Products are read-only snapshots of a catalog search. Transport and
//! decoding failures never reach the caller: they are logged and surface as
//! an empty result list.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::geocoder::Coordinates;
use crate::service_errors::ServiceError;
use crate::service_guard::ServiceGuard;

/// A product returned by the catalog search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    /// Display price in local formatting, e.g. "1 234,56 ₽"
    #[serde(deserialize_with = "price_as_text")]
    pub price: String,
    pub url: String,
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Product {
    pub fn new(name: &str, price: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            price: price.to_string(),
            url: url.to_string(),
            img: None,
            description: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_image(mut self, img: &str) -> Self {
        self.img = Some(img.to_string());
        self
    }
}

/// Catalogs may send prices either as strings or as bare numbers
fn price_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogResponse {
    List(Vec<Product>),
    Wrapped { products: Vec<Product> },
}

impl CatalogResponse {
    fn into_products(self) -> Vec<Product> {
        match self {
            CatalogResponse::List(products) | CatalogResponse::Wrapped { products } => products,
        }
    }
}

/// Product search over an external catalog
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Search products by name, optionally near a location
    ///
    /// Returns an empty list when nothing matches or the catalog is unreachable.
    async fn search(&self, query: &str, near: Option<Coordinates>, limit: usize) -> Vec<Product>;
}

/// Catalog client for an HTTP JSON endpoint
pub struct HttpCatalog {
    client: reqwest::Client,
    endpoint: String,
    guard: Arc<ServiceGuard>,
}

impl HttpCatalog {
    pub fn new(client: reqwest::Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            endpoint: config.catalog_url.clone(),
            guard: Arc::new(ServiceGuard::new("catalog", config.recovery.clone())),
        }
    }

    async fn fetch(&self, query: &str, near: Option<Coordinates>, limit: usize) -> Result<Vec<Product>, ServiceError> {
        let mut params = vec![("q", query.to_string()), ("limit", limit.to_string())];
        if let Some(location) = near {
            params.push(("lat", location.latitude.to_string()));
            params.push(("lon", location.longitude.to_string()));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await?
            .error_for_status()?;

        let body: CatalogResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        let mut products = body.into_products();
        products.truncate(limit);
        Ok(products)
    }
}

#[async_trait]
impl ProductCatalog for HttpCatalog {
    async fn search(&self, query: &str, near: Option<Coordinates>, limit: usize) -> Vec<Product> {
        match self.guard.run(|| self.fetch(query, near, limit)).await {
            Ok(products) => {
                debug!(query, found = products.len(), "Catalog search completed");
                products
            }
            Err(e) => {
                warn!(query, error = %e, "Catalog search failed, reporting no results");
                Vec::new()
            }
        }
    }
}
