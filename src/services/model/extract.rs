//! Route extraction from a finished assignment

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::services::solver::Assignment;
use crate::types::{PlannedRoute, PlannedStop, Service, StopRole, Trailer};

use super::indexer::NodeRole;
use super::BatchModel;

/// Turn an assignment back into planned routes. Trailers whose route
/// visits no service are omitted.
pub fn extract_routes(
    day: NaiveDate,
    assignment: &Assignment,
    batch: &BatchModel,
    services: &[Service],
    trailers: &[Trailer],
) -> Vec<PlannedRoute> {
    let mut routes = Vec::new();
    for (vehicle, trailer) in trailers.iter().enumerate() {
        let walk = assignment.route(vehicle);

        let mut total_km = 0i64;
        for leg in walk.windows(2) {
            total_km += batch.distances.km(leg[0], leg[1]);
        }

        let mut stops = Vec::new();
        let mut ceu_tenths = 0i64;
        for &node in walk {
            let Some((row, role)) = batch.indexer.service_for(node) else { continue };
            let Some(service) = services.get(row) else { continue };
            let (role, city) = match role {
                NodeRole::Pickup => {
                    ceu_tenths += service.demand.ceu_tenths;
                    (StopRole::Pickup, service.pickup_city.clone())
                }
                NodeRole::Delivery => (StopRole::Delivery, service.delivery_city.clone()),
            };
            stops.push(PlannedStop {
                service_id: service.id,
                service_key: service.service_key.clone(),
                role,
                city,
                stop_order: (stops.len() + 1) as i32,
            });
        }
        if stops.is_empty() {
            continue;
        }

        routes.push(PlannedRoute {
            day,
            trailer_id: trailer.id,
            registry: trailer.registry.clone(),
            stops,
            total_km,
            total_ceu: PlannedRoute::ceu_from_tenths(ceu_tenths),
        });
    }
    routes
}

/// Service keys with at least one pickup on a route. A key with any
/// routed row leaves the unassigned pool even when sibling rows were
/// dropped by a disjunction.
pub fn assigned_keys(
    assignment: &Assignment,
    batch: &BatchModel,
    services: &[Service],
) -> Vec<String> {
    let mut keys = BTreeSet::new();
    for vehicle in 0..assignment.vehicle_count() {
        for &node in assignment.route(vehicle) {
            if let Some((row, NodeRole::Pickup)) = batch.indexer.service_for(node) {
                if let Some(service) = services.get(row) {
                    keys.insert(service.service_key.clone());
                }
            }
        }
    }
    keys.into_iter().collect()
}
