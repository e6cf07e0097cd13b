//! Geocoding abstraction for the city coordinate store
//!
//! Coordinates come from the `city_coords` cache first; only cities
//! missing there are sent to a geocoder, and hits are upserted back.
//! Two implementations exist:
//! - `MockGeocoder` — deterministic, no network; tests and development
//! - `TomTomGeocoder` — TomTom search API, production
//!
//! Selection is driven by `GEOCODER_PROVIDER` via [`create_geocoder`].

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::types::Coordinate;

/// Errors from a geocoding backend.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected geocoding response: {0}")]
    BadResponse(String),
}

/// Geocoder abstraction. A `None` result means the backend answered but
/// knows no such city; errors mean the backend could not answer.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a normalized city name to coordinates.
    async fn geocode(&self, city: &str) -> Result<Option<Coordinate>, GeocodeError>;

    /// Name of this geocoder implementation.
    fn name(&self) -> &'static str;
}

/// Mock geocoder — returns deterministic fake coordinates derived from
/// the city name, bounded to mainland Portugal so distances stay
/// plausible.
pub struct MockGeocoder;

impl MockGeocoder {
    pub fn new() -> Self {
        Self
    }

    fn hash_to_coordinate(city: &str) -> Coordinate {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        city.hash(&mut hasher);
        let hash = hasher.finish();

        // Mainland Portugal with a margin away from the coast line
        const LAT_MIN: f64 = 37.2;
        const LAT_MAX: f64 = 41.8;
        const LON_MIN: f64 = -9.2;
        const LON_MAX: f64 = -6.8;

        let lat_normalized = ((hash >> 32) as f64) / (u32::MAX as f64);
        let lon_normalized = ((hash & 0xFFFF_FFFF) as f64) / (u32::MAX as f64);

        Coordinate {
            lat: LAT_MIN + lat_normalized * (LAT_MAX - LAT_MIN),
            lon: LON_MIN + lon_normalized * (LON_MAX - LON_MIN),
        }
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, city: &str) -> Result<Option<Coordinate>, GeocodeError> {
        Ok(Some(Self::hash_to_coordinate(city)))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[derive(Debug, Deserialize)]
struct TomTomResponse {
    results: Vec<TomTomResult>,
}

#[derive(Debug, Deserialize)]
struct TomTomResult {
    position: TomTomPosition,
}

#[derive(Debug, Deserialize)]
struct TomTomPosition {
    lat: f64,
    lon: f64,
}

/// TomTom search-API geocoder. Queries `"{city}, {country}"` and takes
/// the best-ranked result.
pub struct TomTomGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    country: String,
}

impl TomTomGeocoder {
    pub fn new(base_url: &str, api_key: String, country: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            country: country.to_string(),
        }
    }
}

#[async_trait]
impl Geocoder for TomTomGeocoder {
    async fn geocode(&self, city: &str) -> Result<Option<Coordinate>, GeocodeError> {
        let query = urlencoding::encode(&format!("{}, {}", city, self.country)).into_owned();
        let url = format!(
            "{}/search/2/geocode/{}.json?key={}&limit=1",
            self.base_url, query, self.api_key
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(GeocodeError::BadResponse(format!(
                "status {} for city '{}'",
                response.status(),
                city
            )));
        }

        let parsed: TomTomResponse = response.json().await?;
        Ok(parsed
            .results
            .first()
            .map(|hit| Coordinate { lat: hit.position.lat, lon: hit.position.lon }))
    }

    fn name(&self) -> &'static str {
        "tomtom"
    }
}

/// Create the geocoder selected by `GEOCODER_PROVIDER`.
pub fn create_geocoder(config: &Config) -> anyhow::Result<Box<dyn Geocoder>> {
    match config.geocoder_provider.as_str() {
        "mock" => {
            info!("Using MockGeocoder");
            Ok(Box::new(MockGeocoder::new()))
        }
        "tomtom" => {
            let api_key = config.tomtom_api_key.clone().ok_or_else(|| {
                anyhow::anyhow!("TOMTOM_API_KEY must be set when GEOCODER_PROVIDER=tomtom")
            })?;
            info!("Using TomTomGeocoder at {}", config.tomtom_base_url);
            Ok(Box::new(TomTomGeocoder::new(
                &config.tomtom_base_url,
                api_key,
                &config.geocode_country,
            )))
        }
        other => {
            warn!("Unknown GEOCODER_PROVIDER '{}', using mock", other);
            Ok(Box::new(MockGeocoder::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_geocoder_returns_coordinates_for_any_city() {
        let geocoder = MockGeocoder::new();
        let result = geocoder.geocode("PORTO").await.unwrap();
        assert!(result.is_some(), "mock should always resolve");
    }

    #[tokio::test]
    async fn mock_geocoder_is_deterministic() {
        let geocoder = MockGeocoder::new();
        let first = geocoder.geocode("LISBOA").await.unwrap().unwrap();
        let second = geocoder.geocode("LISBOA").await.unwrap().unwrap();
        assert_eq!(first.lat, second.lat);
        assert_eq!(first.lon, second.lon);
    }

    #[tokio::test]
    async fn mock_geocoder_differs_between_cities() {
        let geocoder = MockGeocoder::new();
        let porto = geocoder.geocode("PORTO").await.unwrap().unwrap();
        let faro = geocoder.geocode("FARO").await.unwrap().unwrap();
        assert_ne!(porto.lat, faro.lat);
        assert_ne!(porto.lon, faro.lon);
    }

    #[tokio::test]
    async fn mock_geocoder_stays_inside_portugal_bounds() {
        let geocoder = MockGeocoder::new();
        for city in ["PORTO", "LISBOA", "FARO", "BRAGA", "EVORA", "VISEU"] {
            let c = geocoder.geocode(city).await.unwrap().unwrap();
            assert!((37.2..=41.8).contains(&c.lat), "lat {} for {}", c.lat, city);
            assert!((-9.2..=-6.8).contains(&c.lon), "lon {} for {}", c.lon, city);
        }
    }

    #[test]
    fn mock_geocoder_name_is_mock() {
        assert_eq!(MockGeocoder::new().name(), "mock");
    }

    #[test]
    fn tomtom_geocoder_name_is_tomtom() {
        let geocoder = TomTomGeocoder::new("https://api.tomtom.com", "key".into(), "PORTUGAL");
        assert_eq!(geocoder.name(), "tomtom");
    }

    #[test]
    fn tomtom_response_parses_best_position() {
        let body = r#"{
            "summary": {"numResults": 1},
            "results": [
                {"type": "Geography", "position": {"lat": 41.14961, "lon": -8.61099}}
            ]
        }"#;
        let parsed: TomTomResponse = serde_json::from_str(body).unwrap();
        let hit = parsed.results.first().unwrap();
        assert!((hit.position.lat - 41.14961).abs() < 1e-9);
        assert!((hit.position.lon - (-8.61099)).abs() < 1e-9);
    }

    #[test]
    fn tomtom_empty_results_parse_as_none() {
        let body = r#"{"results": []}"#;
        let parsed: TomTomResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.results.first().is_none());
    }
}
