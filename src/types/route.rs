//! Planned route and run outcome types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::service::CEU_SCALE;

/// Role of a stop within a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopRole {
    Pickup,
    Delivery,
}

impl StopRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            StopRole::Pickup => "PICKUP",
            StopRole::Delivery => "DELIVERY",
        }
    }
}

/// One visited stop of a planned route, in visitation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedStop {
    pub service_id: i64,
    pub service_key: String,
    pub role: StopRole,
    pub city: String,
    /// 1-based position within the route.
    pub stop_order: i32,
}

/// A finished route for one trailer on one planning day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedRoute {
    pub day: NaiveDate,
    pub trailer_id: i64,
    pub registry: String,
    pub stops: Vec<PlannedStop>,
    pub total_km: i64,
    /// Aggregate CEU carried, derived from the pickup stops.
    pub total_ceu: f64,
}

impl PlannedRoute {
    /// Total CEU from summed pickup tenths, rounded to one decimal.
    pub fn ceu_from_tenths(tenths: i64) -> f64 {
        (tenths as f64 / CEU_SCALE as f64 * 10.0).round() / 10.0
    }
}

/// Why a service was not routed this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingReason {
    /// No trailer had enough remaining capacity in any round.
    NoTrailerThisRun,
    /// The service block exceeds every trailer's full capacity; it can
    /// never fit regardless of rounds.
    ExceedsEveryTrailer,
    /// A referenced city has no resolvable coordinates.
    UnknownCity,
}

impl PendingReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            PendingReason::NoTrailerThisRun => "no_trailer_this_run",
            PendingReason::ExceedsEveryTrailer => "exceeds_every_trailer",
            PendingReason::UnknownCity => "unknown_city",
        }
    }
}

/// An unrouted service surfaced at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingService {
    pub service_key: String,
    pub reason: PendingReason,
}

/// Result of a whole planning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutcome {
    pub day: NaiveDate,
    pub routes: Vec<PlannedRoute>,
    pub pending: Vec<PendingService>,
    pub rounds_executed: u32,
    pub eligible_services: usize,
    pub planned_services: usize,
}

impl PlanOutcome {
    pub fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            routes: Vec::new(),
            pending: Vec::new(),
            rounds_executed: 0,
            eligible_services: 0,
            planned_services: 0,
        }
    }

    pub fn pending_with_reason(&self, reason: PendingReason) -> usize {
        self.pending.iter().filter(|p| p.reason == reason).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_role_persists_upper_case() {
        assert_eq!(StopRole::Pickup.as_str(), "PICKUP");
        assert_eq!(StopRole::Delivery.as_str(), "DELIVERY");
    }

    #[test]
    fn test_ceu_from_tenths_rounds_to_one_decimal() {
        assert_eq!(PlannedRoute::ceu_from_tenths(75), 7.5);
        assert_eq!(PlannedRoute::ceu_from_tenths(33), 3.3);
        assert_eq!(PlannedRoute::ceu_from_tenths(0), 0.0);
    }

    #[test]
    fn test_pending_counts_by_reason() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let mut outcome = PlanOutcome::empty(day);
        outcome.pending.push(PendingService {
            service_key: "S-1".into(),
            reason: PendingReason::UnknownCity,
        });
        outcome.pending.push(PendingService {
            service_key: "S-2".into(),
            reason: PendingReason::ExceedsEveryTrailer,
        });
        assert_eq!(outcome.pending_with_reason(PendingReason::UnknownCity), 1);
        assert_eq!(outcome.pending_with_reason(PendingReason::NoTrailerThisRun), 0);
    }
}
