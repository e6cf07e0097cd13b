//! Geographic point types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// Cached coordinate row keyed by normalized city name.
#[derive(Debug, Clone, FromRow)]
pub struct CityCoordRow {
    pub city_norm: String,
    pub lat: f64,
    pub lon: f64,
}

impl CityCoordRow {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate { lat: self.lat, lon: self.lon }
    }
}
