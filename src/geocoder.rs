//! Address geocoding through a Nominatim-compatible search API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::service_errors::ServiceError;
use crate::service_guard::ServiceGuard;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// Resolves a free-form address into coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Coordinates, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimPlace {
    fn coordinates(&self) -> Result<Coordinates, ServiceError> {
        let latitude = self
            .lat
            .parse()
            .map_err(|_| ServiceError::Decode(format!("bad latitude {:?}", self.lat)))?;
        let longitude = self
            .lon
            .parse()
            .map_err(|_| ServiceError::Decode(format!("bad longitude {:?}", self.lon)))?;
        Ok(Coordinates::new(latitude, longitude))
    }
}

/// Geocoder backed by the public Nominatim search endpoint
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
    guard: Arc<ServiceGuard>,
}

impl NominatimGeocoder {
    pub fn new(client: reqwest::Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            endpoint: config.geocoder_url.clone(),
            guard: Arc::new(ServiceGuard::new("geocoder", config.recovery.clone())),
        }
    }

    async fn lookup(&self, address: &str) -> Result<Coordinates, ServiceError> {
        let places: Vec<NominatimPlace> = self
            .client
            .get(&self.endpoint)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        match places.first() {
            Some(place) => place.coordinates(),
            None => Err(ServiceError::NotFound(address.to_string())),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Coordinates, ServiceError> {
        let result = self.guard.run(|| self.lookup(address)).await;
        match &result {
            Ok(coordinates) => debug!(address, %coordinates, "Address geocoded"),
            Err(e) => warn!(address, error = %e, "Geocoding failed"),
        }
        result
    }
}
