//! Trailer (vehicle) types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::service::{Demand, CEU_SCALE};

/// Raw trailer row as loaded from the database.
#[derive(Debug, Clone, FromRow)]
pub struct TrailerRecord {
    pub id: i64,
    pub registry: String,
    pub base_city: Option<String>,
    pub ceu_max: f64,
    pub light_max: i32,
    pub van_max: i32,
    pub flatbed_max: i32,
}

/// Prepared trailer. The base city serves as both start and end depot
/// of every route the trailer drives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trailer {
    pub id: i64,
    /// License-plate identifier, used to scope a run to part of the fleet.
    pub registry: String,
    /// Normalized home base city.
    pub base_city: String,
    /// Capacity vector in the same scaled units as service demand.
    pub capacity: Demand,
}

impl Trailer {
    pub fn from_record(record: &TrailerRecord, base_city: String) -> Self {
        Self {
            id: record.id,
            registry: record.registry.clone(),
            base_city,
            capacity: Demand {
                ceu_tenths: (record.ceu_max * CEU_SCALE as f64).round() as i64,
                light: i64::from(record.light_max.max(0)),
                van: i64::from(record.van_max.max(0)),
                flatbed: i64::from(record.flatbed_max.max(0)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_scaled_to_tenths() {
        let record = TrailerRecord {
            id: 7,
            registry: "AB-12-CD".into(),
            base_city: Some("Porto".into()),
            ceu_max: 7.5,
            light_max: 8,
            van_max: 2,
            flatbed_max: 1,
        };
        let trailer = Trailer::from_record(&record, "PORTO".into());
        assert_eq!(trailer.capacity.ceu_tenths, 75);
        assert_eq!(trailer.capacity.light, 8);
        assert_eq!(trailer.capacity.van, 2);
        assert_eq!(trailer.capacity.flatbed, 1);
    }

    #[test]
    fn test_negative_class_maxima_clamp_to_zero() {
        let record = TrailerRecord {
            id: 8,
            registry: "EF-34-GH".into(),
            base_city: None,
            ceu_max: 10.0,
            light_max: -1,
            van_max: 0,
            flatbed_max: -3,
        };
        let trailer = Trailer::from_record(&record, "LISBOA".into());
        assert_eq!(trailer.capacity.light, 0);
        assert_eq!(trailer.capacity.flatbed, 0);
    }
}
