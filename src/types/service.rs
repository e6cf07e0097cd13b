//! Transport service types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// CEU values are stored internally in tenths of a unit so that all
/// capacity arithmetic stays in integers.
pub const CEU_SCALE: i64 = 10;

/// Raw service row as loaded from the database, before preparation.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceRecord {
    pub id: i64,
    pub service_key: String,
    pub pickup_city: Option<String>,
    pub delivery_city: Option<String>,
    pub vehicle_category: Option<String>,
    pub ceu_override: Option<f64>,
    pub scheduled_base: Option<String>,
}

/// Demand of one service, or capacity of one trailer, over the four
/// cargo units. `ceu_tenths` is the aggregate car-equivalent value in
/// tenths; the remaining fields count whole vehicles per class.
///
/// Accumulation along a route is monotonic by design: a pickup adds its
/// demand and the matching delivery adds nothing, so a bound expressed
/// against this vector limits the total cargo ever carried on the trip,
/// not the instantaneous on-board load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Demand {
    pub ceu_tenths: i64,
    pub light: i64,
    pub van: i64,
    pub flatbed: i64,
}

impl Demand {
    pub fn get(&self, kind: CapacityKind) -> i64 {
        match kind {
            CapacityKind::Ceu => self.ceu_tenths,
            CapacityKind::Light => self.light,
            CapacityKind::Van => self.van,
            CapacityKind::Flatbed => self.flatbed,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.ceu_tenths == 0 && self.light == 0 && self.van == 0 && self.flatbed == 0
    }
}

/// The four cargo units tracked per service and per trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityKind {
    Ceu,
    Light,
    Van,
    Flatbed,
}

impl CapacityKind {
    pub const ALL: [CapacityKind; 4] = [
        CapacityKind::Ceu,
        CapacityKind::Light,
        CapacityKind::Van,
        CapacityKind::Flatbed,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            CapacityKind::Ceu => "ceu",
            CapacityKind::Light => "light",
            CapacityKind::Van => "van",
            CapacityKind::Flatbed => "flatbed",
        }
    }
}

/// Prepared transport service. Built once per planning day from a
/// [`ServiceRecord`] and never mutated afterwards; rounds track
/// allocation by `service_key`, not by mutating the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: i64,
    /// Stable key grouping the rows of one logical transport order.
    /// Multi-row services share the key and are packed as one block.
    pub service_key: String,
    /// Normalized pickup city (effective origin after any base rewrite).
    pub pickup_city: String,
    /// Normalized delivery city.
    pub delivery_city: String,
    /// Raw vehicle-category name the demand vector was derived from.
    pub category: String,
    pub demand: Demand,
    /// Normalized override location when the service must route through
    /// a base; used as the effective pickup-side location for clustering.
    pub scheduled_base: Option<String>,
    /// Delivery city implies a mandatory return to the serving
    /// trailer's base right after the delivery stop.
    pub force_return: bool,
    pub pickup_at_base: bool,
    pub delivery_at_base: bool,
}

impl Service {
    /// City used for pickup-side geographic clustering.
    pub fn cluster_pickup_city(&self) -> &str {
        self.scheduled_base.as_deref().unwrap_or(&self.pickup_city)
    }

    /// Same pickup and delivery city marks a service as low priority:
    /// it may be dropped from a route at a penalty instead of being
    /// forced in.
    pub fn is_low_priority(&self) -> bool {
        self.pickup_city == self.delivery_city
    }
}
