//! Constraint weight configuration

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cost per kilometer of each trailer's route span.
pub const KEY_DIST_PENALTY: &str = "PENALIDADE_DIST_KM";
/// Hard cap on a single trailer's route distance, in km. Zero disables it.
pub const KEY_MAX_DIST: &str = "MAX_DIST_POR_TRAILER";
/// Penalty for dropping a low-priority (same-city) service from a round.
pub const KEY_LOW_PRIORITY_PENALTY: &str = "INTERNO_LOW_PEN";

/// Tuning weights consumed by the constraint assembler. Loaded from the
/// versioned `constraint_weights` table; any key missing there falls
/// back to the defaults below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintWeights {
    pub dist_penalty_per_km: i64,
    pub max_km_per_trailer: i64,
    pub low_priority_penalty: i64,
}

impl Default for ConstraintWeights {
    fn default() -> Self {
        Self {
            dist_penalty_per_km: 3,
            max_km_per_trailer: 400,
            low_priority_penalty: 1000,
        }
    }
}

impl ConstraintWeights {
    /// Fold a key→value map (latest version per key) over the defaults.
    /// Unknown keys are ignored.
    pub fn from_map(map: &HashMap<String, f64>) -> Self {
        let mut weights = Self::default();
        for (key, value) in map {
            match key.as_str() {
                KEY_DIST_PENALTY => weights.dist_penalty_per_km = value.round() as i64,
                KEY_MAX_DIST => weights.max_km_per_trailer = value.round() as i64,
                KEY_LOW_PRIORITY_PENALTY => weights.low_priority_penalty = value.round() as i64,
                other => debug!("Ignoring unknown constraint weight key '{}'", other),
            }
        }
        weights
    }

    /// Distance cap is optional: non-positive values disable it.
    pub fn distance_cap(&self) -> Option<i64> {
        (self.max_km_per_trailer > 0).then_some(self.max_km_per_trailer)
    }
}
