//! Batch routing model construction
//!
//! Takes one round's services and trailers plus the city distance
//! matrix and assembles the search model the engine solves: node
//! layout via the indexer, a flat node-to-node distance table, and
//! the constraint families applied in rule order.

mod constraints;
mod demand;
mod extract;
mod indexer;

pub use constraints::{default_rules, ConstraintRule, UsedNodeSet};
pub use extract::{assigned_keys, extract_routes};
pub use indexer::{NodeIndexer, NodeRole};

use std::collections::HashMap;
use std::sync::Arc;

use crate::services::cities::{CityIndex, DistanceMatrix};
use crate::services::solver::SearchModel;
use crate::types::{ConstraintWeights, Service, Trailer};

use constraints::RuleContext;

/// Transit cost for a node pair outside the table. Effectively bars
/// the arc without overflowing the objective.
pub const DISTANCE_SENTINEL_KM: i64 = 99_999;

/// Node-to-node distances in km, flattened for cheap shared access
/// from the transit and distance-dimension closures.
#[derive(Debug, Clone)]
pub struct DistanceTable {
    node_count: usize,
    km: Arc<Vec<i64>>,
}

impl DistanceTable {
    fn build(node_city: &[usize], matrix: &DistanceMatrix) -> Result<Self, ModelError> {
        let node_count = node_city.len();
        let mut km = Vec::with_capacity(node_count * node_count);
        for &from in node_city {
            for &to in node_city {
                let leg = matrix
                    .km(from, to)
                    .ok_or(ModelError::MissingDistance(from, to))?;
                km.push(leg);
            }
        }
        Ok(Self { node_count, km: Arc::new(km) })
    }

    pub fn km(&self, from: usize, to: usize) -> i64 {
        if from >= self.node_count || to >= self.node_count {
            return DISTANCE_SENTINEL_KM;
        }
        self.km
            .get(from * self.node_count + to)
            .copied()
            .unwrap_or(DISTANCE_SENTINEL_KM)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("city '{0}' is not in the batch city index")]
    MissingCity(String),
    #[error("no distance between city indices {0} and {1}")]
    MissingDistance(usize, usize),
}

/// A solvable model for one round plus the lookups needed to read the
/// solution back out.
pub struct BatchModel {
    pub model: SearchModel,
    pub indexer: NodeIndexer,
    /// node index -> city index, depots included.
    pub node_city: Vec<usize>,
    pub distances: DistanceTable,
}

// Manual impl: `SearchModel` holds boxed closures and cannot derive Debug.
impl std::fmt::Debug for BatchModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchModel")
            .field("indexer", &self.indexer)
            .field("node_city", &self.node_city)
            .field("distances", &self.distances)
            .finish_non_exhaustive()
    }
}

/// Assemble the search model for one round's batch.
///
/// Trailers sharing a base city share a depot node; depot slots follow
/// trailer order of first appearance. Every city referenced by the
/// batch must already be present in `cities` and covered by `matrix`.
pub fn build_batch_model(
    services: &[Service],
    trailers: &[Trailer],
    cities: &CityIndex,
    matrix: &DistanceMatrix,
    weights: &ConstraintWeights,
    rules: &[ConstraintRule],
) -> Result<BatchModel, ModelError> {
    let city_of = |name: &str| {
        cities
            .get(name)
            .ok_or_else(|| ModelError::MissingCity(name.to_string()))
    };

    let mut depot_cities: Vec<usize> = Vec::new();
    let mut depot_of_city: HashMap<usize, usize> = HashMap::new();
    let mut starts = Vec::with_capacity(trailers.len());
    for trailer in trailers {
        let city = city_of(&trailer.base_city)?;
        let depot = *depot_of_city.entry(city).or_insert_with(|| {
            depot_cities.push(city);
            depot_cities.len() - 1
        });
        starts.push(depot);
    }

    let indexer = NodeIndexer::new(depot_cities.len(), services.len());
    let mut node_city = vec![0usize; indexer.node_count()];
    for (depot, &city) in depot_cities.iter().enumerate() {
        node_city[indexer.depot_node(depot)] = city;
    }
    for (row, service) in services.iter().enumerate() {
        node_city[indexer.node_for(row, NodeRole::Pickup)] = city_of(&service.pickup_city)?;
        node_city[indexer.node_for(row, NodeRole::Delivery)] = city_of(&service.delivery_city)?;
    }

    let distances = DistanceTable::build(&node_city, matrix)?;
    let transit_table = distances.clone();

    let starts: Vec<usize> = starts.iter().map(|&d| indexer.depot_node(d)).collect();
    let ends = starts.clone();
    let mut model = SearchModel {
        node_count: indexer.node_count(),
        vehicle_count: trailers.len(),
        starts,
        ends,
        transit: Box::new(move |from, to| transit_table.km(from, to)),
        dimensions: Vec::new(),
        pairs: Vec::new(),
        disjunctions: Vec::new(),
        forced_next: Vec::new(),
    };

    let ctx = RuleContext {
        services,
        trailers,
        weights,
        indexer: &indexer,
        distances: &distances,
    };
    let mut used = UsedNodeSet::new();
    for &rule in rules {
        constraints::apply_rule(rule, &mut model, &ctx, &mut used);
    }

    Ok(BatchModel { model, indexer, node_city, distances })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cities::CoordinateCache;
    use crate::types::{Coordinate, Demand};

    fn test_cities() -> (CityIndex, DistanceMatrix) {
        let mut index = CityIndex::new();
        index.insert("PORTO");
        index.insert("LISBOA");
        index.insert("BRAGA");
        let mut cache = CoordinateCache::new();
        cache.insert("PORTO".into(), Coordinate { lat: 41.1579, lon: -8.6291 });
        cache.insert("LISBOA".into(), Coordinate { lat: 38.7223, lon: -9.1393 });
        cache.insert("BRAGA".into(), Coordinate { lat: 41.5454, lon: -8.4265 });
        let matrix = DistanceMatrix::build(&index, &cache).unwrap();
        (index, matrix)
    }

    fn test_service(id: i64, pickup: &str, delivery: &str) -> Service {
        Service {
            id,
            service_key: format!("S-{id}"),
            pickup_city: pickup.into(),
            delivery_city: delivery.into(),
            category: "ligeiro".into(),
            demand: Demand { ceu_tenths: 10, light: 1, van: 0, flatbed: 0 },
            scheduled_base: None,
            force_return: false,
            pickup_at_base: false,
            delivery_at_base: false,
        }
    }

    fn test_trailer(id: i64, base: &str) -> Trailer {
        Trailer {
            id,
            registry: format!("TR-{id:02}"),
            base_city: base.into(),
            capacity: Demand { ceu_tenths: 75, light: 7, van: 2, flatbed: 1 },
        }
    }

    #[test]
    fn test_trailers_sharing_a_base_share_a_depot() {
        let (index, matrix) = test_cities();
        let services = vec![test_service(1, "PORTO", "LISBOA")];
        let trailers = vec![
            test_trailer(1, "PORTO"),
            test_trailer(2, "PORTO"),
            test_trailer(3, "BRAGA"),
        ];
        let batch = build_batch_model(
            &services,
            &trailers,
            &index,
            &matrix,
            &ConstraintWeights::default(),
            &default_rules(),
        )
        .unwrap();

        assert_eq!(batch.indexer.depot_count(), 2);
        assert_eq!(batch.model.starts, vec![0, 0, 1]);
        assert_eq!(batch.model.ends, batch.model.starts);
        assert_eq!(batch.model.node_count, 2 + 2 * services.len());
    }

    #[test]
    fn test_default_rules_produce_the_full_model() {
        let (index, matrix) = test_cities();
        let mut low_priority = test_service(2, "BRAGA", "BRAGA");
        low_priority.demand.light = 0;
        let mut forced = test_service(3, "PORTO", "LISBOA");
        forced.force_return = true;
        let services = vec![test_service(1, "PORTO", "LISBOA"), low_priority, forced];
        let trailers = vec![test_trailer(1, "PORTO"), test_trailer(2, "BRAGA")];

        let batch = build_batch_model(
            &services,
            &trailers,
            &index,
            &matrix,
            &ConstraintWeights::default(),
            &default_rules(),
        )
        .unwrap();

        // four capacity kinds plus distance, distance declared last
        assert_eq!(batch.model.dimensions.len(), 5);
        let distance = batch.model.dimensions.last().unwrap();
        assert_eq!(distance.name, "distance");
        assert_eq!(distance.span_cost_coefficient, 3);
        assert_eq!(distance.capacities, vec![400, 400]);

        // one pair per service row, pickup block before delivery block
        assert_eq!(batch.model.pairs.len(), 3);
        let (p, d) = batch.model.pairs[0];
        assert_eq!(batch.indexer.service_for(p), Some((0, NodeRole::Pickup)));
        assert_eq!(batch.indexer.service_for(d), Some((0, NodeRole::Delivery)));

        // only the same-city service is droppable
        assert_eq!(batch.model.disjunctions.len(), 1);
        assert_eq!(batch.model.disjunctions[0].penalty, 1000);
        assert_eq!(
            batch.model.disjunctions[0].nodes,
            vec![
                batch.indexer.node_for(1, NodeRole::Pickup),
                batch.indexer.node_for(1, NodeRole::Delivery),
            ]
        );

        // forced return emitted once per vehicle for the flagged row
        assert_eq!(batch.model.forced_next.len(), trailers.len());
        for forced_next in &batch.model.forced_next {
            assert_eq!(forced_next.node, batch.indexer.node_for(2, NodeRole::Delivery));
            assert_eq!(forced_next.next, batch.model.ends[forced_next.vehicle]);
        }
    }

    #[test]
    fn test_transit_matches_the_city_matrix() {
        let (index, matrix) = test_cities();
        let services = vec![test_service(1, "PORTO", "LISBOA")];
        let trailers = vec![test_trailer(1, "BRAGA")];
        let batch = build_batch_model(
            &services,
            &trailers,
            &index,
            &matrix,
            &ConstraintWeights::default(),
            &default_rules(),
        )
        .unwrap();

        let pickup = batch.indexer.node_for(0, NodeRole::Pickup);
        let delivery = batch.indexer.node_for(0, NodeRole::Delivery);
        let porto = index.get("PORTO").unwrap();
        let lisboa = index.get("LISBOA").unwrap();

        assert_eq!(
            (batch.model.transit)(pickup, delivery),
            matrix.km(porto, lisboa).unwrap()
        );
        assert_eq!((batch.model.transit)(pickup, pickup), 0);
        assert_eq!(
            (batch.model.transit)(pickup, batch.model.node_count + 1),
            DISTANCE_SENTINEL_KM
        );
    }

    #[test]
    fn test_unknown_base_city_is_an_error() {
        let (index, matrix) = test_cities();
        let services = vec![test_service(1, "PORTO", "LISBOA")];
        let trailers = vec![test_trailer(1, "FARO")];
        let err = build_batch_model(
            &services,
            &trailers,
            &index,
            &matrix,
            &ConstraintWeights::default(),
            &default_rules(),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::MissingCity(city) if city == "FARO"));
    }

    #[test]
    fn test_distance_cap_zero_uses_the_ceiling() {
        let (index, matrix) = test_cities();
        let services = vec![test_service(1, "PORTO", "LISBOA")];
        let trailers = vec![test_trailer(1, "PORTO")];
        let weights = ConstraintWeights {
            max_km_per_trailer: 0,
            ..ConstraintWeights::default()
        };
        let batch = build_batch_model(
            &services,
            &trailers,
            &index,
            &matrix,
            &weights,
            &default_rules(),
        )
        .unwrap();

        let distance = batch.model.dimensions.last().unwrap();
        assert!(distance.capacities[0] >= 10_000_000);
    }

    #[test]
    fn test_empty_rule_list_builds_a_bare_model() {
        let (index, matrix) = test_cities();
        let services = vec![test_service(1, "PORTO", "LISBOA")];
        let trailers = vec![test_trailer(1, "PORTO")];
        let batch = build_batch_model(
            &services,
            &trailers,
            &index,
            &matrix,
            &ConstraintWeights::default(),
            &[],
        )
        .unwrap();

        assert!(batch.model.dimensions.is_empty());
        assert!(batch.model.pairs.is_empty());
        assert!(batch.model.disjunctions.is_empty());
    }
}
