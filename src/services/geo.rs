//! Geographic calculations

use crate::types::Coordinate;

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate Haversine distance between two points in kilometers
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lon - from.lon).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Haversine distance rounded to the nearest whole kilometer, the unit
/// every distance matrix and transit cost works in.
pub fn haversine_km_rounded(from: Coordinate, to: Coordinate) -> i64 {
    haversine_km(from, to).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_porto_lisboa() {
        let porto = Coordinate { lat: 41.1579, lon: -8.6291 };
        let lisboa = Coordinate { lat: 38.7223, lon: -9.1393 };

        let distance = haversine_km(porto, lisboa);

        // Porto to Lisbon is approximately 274 km great circle
        assert!((distance - 274.0).abs() < 5.0);
    }

    #[test]
    fn test_haversine_same_point() {
        let point = Coordinate { lat: 40.0, lon: -8.0 };
        let distance = haversine_km(point, point);
        assert!((distance - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let faro = Coordinate { lat: 37.0194, lon: -7.9304 };
        let braga = Coordinate { lat: 41.5454, lon: -8.4265 };
        assert!((haversine_km(faro, braga) - haversine_km(braga, faro)).abs() < 1e-9);
    }

    #[test]
    fn test_rounded_km_is_integer_of_distance() {
        let porto = Coordinate { lat: 41.1579, lon: -8.6291 };
        let lisboa = Coordinate { lat: 38.7223, lon: -9.1393 };
        let km = haversine_km_rounded(porto, lisboa);
        assert!((270..=280).contains(&km));
    }
}
