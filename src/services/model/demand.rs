//! Node demand vectors for the capacity dimensions
//!
//! Capacity accumulates over a whole route: a pickup node carries the
//! service's demand and its delivery node carries zero, so the running
//! total counts everything the trailer has taken on, not the onboard
//! load. Delivering never frees capacity for later pickups.

use crate::types::{CapacityKind, Service};

use super::indexer::{NodeIndexer, NodeRole};

/// Demand per node for one capacity kind, aligned with the indexer's
/// node layout. Depot and delivery nodes are zero.
pub(super) fn node_demands(
    indexer: &NodeIndexer,
    services: &[Service],
    kind: CapacityKind,
) -> Vec<i64> {
    let mut demands = vec![0i64; indexer.node_count()];
    for (row, service) in services.iter().enumerate() {
        demands[indexer.node_for(row, NodeRole::Pickup)] = service.demand.get(kind);
    }
    demands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Demand;

    fn service(row: i64, ceu_tenths: i64, light: i64) -> Service {
        Service {
            id: row,
            service_key: format!("S-{row}"),
            pickup_city: "PORTO".into(),
            delivery_city: "LISBOA".into(),
            category: "ligeiro".into(),
            demand: Demand { ceu_tenths, light, van: 0, flatbed: 0 },
            scheduled_base: None,
            force_return: false,
            pickup_at_base: false,
            delivery_at_base: false,
        }
    }

    #[test]
    fn test_pickup_carries_demand_delivery_carries_zero() {
        let services = vec![service(1, 10, 1), service(2, 15, 0)];
        let indexer = NodeIndexer::new(1, services.len());
        let ceu = node_demands(&indexer, &services, CapacityKind::Ceu);

        assert_eq!(ceu[indexer.node_for(0, NodeRole::Pickup)], 10);
        assert_eq!(ceu[indexer.node_for(1, NodeRole::Pickup)], 15);
        assert_eq!(ceu[indexer.node_for(0, NodeRole::Delivery)], 0);
        assert_eq!(ceu[indexer.node_for(1, NodeRole::Delivery)], 0);
        assert_eq!(ceu[0], 0, "depot demand must be zero");
    }

    #[test]
    fn test_each_kind_reads_its_own_component() {
        let services = vec![service(1, 10, 1)];
        let indexer = NodeIndexer::new(1, 1);
        let light = node_demands(&indexer, &services, CapacityKind::Light);
        let van = node_demands(&indexer, &services, CapacityKind::Van);

        assert_eq!(light[indexer.node_for(0, NodeRole::Pickup)], 1);
        assert_eq!(van[indexer.node_for(0, NodeRole::Pickup)], 0);
    }
}
