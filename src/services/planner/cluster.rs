//! Geographic round batching
//!
//! A full day can be too large for one solve, so services are grouped
//! by proximity of their effective locations. Pickup-side and
//! delivery-side clusterings are computed independently and their
//! groups interleaved, so successive rounds alternate between
//! origin-shaped and destination-shaped batches.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::services::cities::CoordinateCache;
use crate::types::{Coordinate, Service};

/// Cluster count per side. Small relative to fleet size so each batch
/// stays well inside the solve budget.
const CLUSTERS_PER_SIDE: usize = 5;

/// Fixed seed: identical inputs must produce identical rounds.
const KMEANS_SEED: u64 = 42;

const KMEANS_MAX_ITERATIONS: usize = 50;

/// Interleaved candidate batches over the remaining pool: pickup-side
/// cluster 0, delivery-side cluster 0, pickup-side cluster 1, and so
/// on. Values are indices into `services`. Every service appears once
/// per side; empty groups are dropped. Services with no cached
/// coordinate on a side are collected into a trailing group rather
/// than lost.
pub fn cluster_batches(services: &[Service], cache: &CoordinateCache) -> Vec<Vec<usize>> {
    if services.is_empty() {
        return Vec::new();
    }

    let pickup_groups = side_groups(services, cache, |service| service.cluster_pickup_city());
    let delivery_groups = side_groups(services, cache, |service| service.delivery_city.as_str());

    let mut groups = Vec::with_capacity(pickup_groups.len() + delivery_groups.len());
    let side_len = pickup_groups.len().max(delivery_groups.len());
    for i in 0..side_len {
        if let Some(group) = pickup_groups.get(i) {
            groups.push(group.clone());
        }
        if let Some(group) = delivery_groups.get(i) {
            groups.push(group.clone());
        }
    }
    groups.retain(|group| !group.is_empty());
    groups
}

/// One side's clusters, ordered by cluster index, plus a trailing
/// group of rows whose city has no coordinate.
fn side_groups<'a>(
    services: &'a [Service],
    cache: &CoordinateCache,
    city_of: impl Fn(&'a Service) -> &'a str,
) -> Vec<Vec<usize>> {
    let mut rows = Vec::new();
    let mut points = Vec::new();
    let mut missing = Vec::new();
    for (row, service) in services.iter().enumerate() {
        match cache.get(city_of(service)) {
            Some(coordinate) => {
                rows.push(row);
                points.push(coordinate);
            }
            None => missing.push(row),
        }
    }

    let assignment = kmeans(&points, CLUSTERS_PER_SIDE, KMEANS_SEED);
    let cluster_count = assignment.iter().copied().max().map_or(0, |max| max + 1);
    let mut groups = vec![Vec::new(); cluster_count];
    for (point, &cluster) in assignment.iter().enumerate() {
        groups[cluster].push(rows[point]);
    }
    if !missing.is_empty() {
        groups.push(missing);
    }
    groups
}

/// Lloyd's iteration over raw lat/lon with squared euclidean distance.
/// Returns the cluster index per point. `k` is clamped to the point
/// count; ties go to the lowest cluster index.
fn kmeans(points: &[Coordinate], k: usize, seed: u64) -> Vec<usize> {
    let k = k.min(points.len());
    if k == 0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.shuffle(&mut rng);
    let mut centroids: Vec<Coordinate> = order[..k].iter().map(|&i| points[i]).collect();

    let mut assignment = vec![0usize; points.len()];
    for _ in 0..KMEANS_MAX_ITERATIONS {
        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let nearest = nearest_centroid(point, &centroids);
            if assignment[i] != nearest {
                assignment[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![(0.0f64, 0.0f64, 0usize); k];
        for (i, point) in points.iter().enumerate() {
            let entry = &mut sums[assignment[i]];
            entry.0 += point.lat;
            entry.1 += point.lon;
            entry.2 += 1;
        }
        for (cluster, (lat_sum, lon_sum, count)) in sums.into_iter().enumerate() {
            // an emptied cluster keeps its previous centroid
            if count > 0 {
                centroids[cluster] = Coordinate {
                    lat: lat_sum / count as f64,
                    lon: lon_sum / count as f64,
                };
            }
        }
    }
    assignment
}

fn nearest_centroid(point: &Coordinate, centroids: &[Coordinate]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::MAX;
    for (cluster, centroid) in centroids.iter().enumerate() {
        let d_lat = point.lat - centroid.lat;
        let d_lon = point.lon - centroid.lon;
        let dist = d_lat * d_lat + d_lon * d_lon;
        if dist < best_dist {
            best = cluster;
            best_dist = dist;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Demand;

    fn service(id: i64, pickup: &str, delivery: &str) -> Service {
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

    fn cache() -> CoordinateCache {
        let mut cache = CoordinateCache::new();
        cache.insert("PORTO".into(), Coordinate { lat: 41.1579, lon: -8.6291 });
        cache.insert("BRAGA".into(), Coordinate { lat: 41.5454, lon: -8.4265 });
        cache.insert("FARO".into(), Coordinate { lat: 37.0194, lon: -7.9322 });
        cache.insert("LISBOA".into(), Coordinate { lat: 38.7223, lon: -9.1393 });
        cache
    }

    #[test]
    fn test_every_service_appears_once_per_side() {
        let services = vec![
            service(1, "PORTO", "LISBOA"),
            service(2, "BRAGA", "FARO"),
            service(3, "FARO", "PORTO"),
        ];
        let groups = cluster_batches(&services, &cache());

        let mut appearances = vec![0usize; services.len()];
        for group in &groups {
            for &row in group {
                appearances[row] += 1;
            }
        }
        assert_eq!(appearances, vec![2, 2, 2], "one pickup-side and one delivery-side slot each");
    }

    #[test]
    fn test_batching_is_deterministic() {
        let services = vec![
            service(1, "PORTO", "LISBOA"),
            service(2, "BRAGA", "FARO"),
            service(3, "FARO", "PORTO"),
            service(4, "LISBOA", "BRAGA"),
        ];
        let first = cluster_batches(&services, &cache());
        let second = cluster_batches(&services, &cache());
        assert_eq!(first, second);
    }

    #[test]
    fn test_same_city_services_share_a_pickup_group() {
        let services = vec![
            service(1, "PORTO", "LISBOA"),
            service(2, "PORTO", "FARO"),
            service(3, "FARO", "BRAGA"),
        ];
        let groups = cluster_batches(&services, &cache());

        // rows 0 and 1 have identical pickup coordinates, so some group
        // must hold exactly both of them
        assert!(
            groups.iter().any(|g| {
                let mut sorted = g.clone();
                sorted.sort_unstable();
                sorted == vec![0, 1]
            }),
            "identical pickup points must cluster together: {groups:?}"
        );
    }

    #[test]
    fn test_scheduled_base_moves_the_pickup_side() {
        let mut rerouted = service(1, "FARO", "LISBOA");
        rerouted.scheduled_base = Some("PORTO".into());
        let services = vec![rerouted, service(2, "PORTO", "BRAGA"), service(3, "FARO", "BRAGA")];
        let groups = cluster_batches(&services, &cache());

        // rows 0 and 1 cluster by PORTO on the pickup side
        assert!(
            groups.iter().any(|g| {
                let mut sorted = g.clone();
                sorted.sort_unstable();
                sorted == vec![0, 1]
            }),
            "scheduled base must drive the pickup-side position: {groups:?}"
        );
    }

    #[test]
    fn test_unknown_city_rows_form_a_trailing_group() {
        let services = vec![service(1, "PORTO", "LISBOA"), service(2, "NOWHERE", "LISBOA")];
        let groups = cluster_batches(&services, &cache());

        let mut appearances = vec![0usize; services.len()];
        for group in &groups {
            for &row in group {
                appearances[row] += 1;
            }
        }
        // the unknown pickup still appears on both sides
        assert_eq!(appearances, vec![2, 2]);
    }

    #[test]
    fn test_empty_pool_has_no_batches() {
        assert!(cluster_batches(&[], &cache()).is_empty());
    }
}
