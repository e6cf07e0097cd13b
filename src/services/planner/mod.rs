//! Daily planning orchestration
//!
//! One run owns all of its state: the remaining service and trailer
//! pools, the allocated-key ledger and the coordinate cache live for
//! exactly one run and are never shared between runs. Rounds are
//! strictly sequential; each round clusters the remaining pool, packs
//! a batch, builds a fresh model, solves it on a blocking thread and
//! folds the result back into the pools. The model of a finished
//! round is discarded whole.

mod cluster;
mod input;
mod packing;

pub use input::{infer_demand, prepare_services, prepare_trailers};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::db::queries;
use crate::services::cities::{normalize_city, CityIndex, CoordinateCache, DistanceMatrix};
use crate::services::geocoding::Geocoder;
use crate::services::model::{assigned_keys, build_batch_model, default_rules, extract_routes};
use crate::services::solver::{RouteSearch, SearchParams};
use crate::types::{
    ConstraintWeights, PendingReason, PendingService, PlanOutcome, Service, StopRole, Trailer,
};

use cluster::cluster_batches;
use packing::{build_blocks, exceeds_every_trailer, pack_blocks, PackedBatch};

/// Parameters of one planning run, resolved from the CLI and config.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub day: NaiveDate,
    /// Plates to scope the trailer pool to; empty means the whole fleet.
    pub registry_filter: Vec<String>,
    /// Plan only the restricted category pair, via base pickups.
    pub restricted: bool,
    pub max_rounds: u32,
    pub time_budget: Duration,
    /// Solve and report, but persist nothing.
    pub dry_run: bool,
}

/// What the round loop produced from the prepared pools.
#[derive(Debug)]
pub struct RoundsResult {
    pub routes: Vec<crate::types::PlannedRoute>,
    pub pending: Vec<PendingService>,
    pub rounds: u32,
}

/// Full planning run against the database: load, prepare, warm
/// coordinates, run rounds, persist (unless dry-run) and summarize.
pub async fn plan_day(
    pool: &PgPool,
    geocoder: &dyn Geocoder,
    solver: Arc<dyn RouteSearch>,
    request: &PlanRequest,
) -> Result<PlanOutcome> {
    info!(
        day = %request.day,
        restricted = request.restricted,
        dry_run = request.dry_run,
        "Planning run started"
    );

    let weight_map = queries::weights::latest_weights(pool)
        .await
        .context("loading constraint weights")?;
    let weights = ConstraintWeights::from_map(&weight_map);
    debug!(?weights, "Constraint weights resolved");

    let base_rules: HashMap<String, String> = queries::base_rules::load_base_rules(pool)
        .await
        .context("loading base rules")?
        .into_iter()
        .map(|(city, base)| (normalize_city(&city), normalize_city(&base)))
        .collect();

    let trailer_records = queries::trailer::active_trailers(pool)
        .await
        .context("loading trailers")?;
    let trailers = prepare_trailers(&trailer_records, &request.registry_filter);
    if trailers.is_empty() {
        warn!(day = %request.day, "No active trailers match the run, nothing to plan");
        return Ok(PlanOutcome::empty(request.day));
    }
    let base_cities: HashSet<String> = trailers.iter().map(|t| t.base_city.clone()).collect();

    let service_records = queries::service::eligible_services(pool, request.day, request.restricted)
        .await
        .context("loading services")?;
    let services = prepare_services(&service_records, &base_cities, &base_rules, request.restricted);
    if services.is_empty() {
        warn!(day = %request.day, "No eligible services for the day");
        return Ok(PlanOutcome::empty(request.day));
    }
    let eligible = services.len();
    info!(services = eligible, trailers = trailers.len(), "Inputs prepared");

    let coord_rows = queries::coords::load_city_coords(pool)
        .await
        .context("loading city coordinates")?;
    let mut cache = CoordinateCache::from_rows(coord_rows);

    let mut wanted: BTreeSet<String> = BTreeSet::new();
    wanted.extend(trailers.iter().map(|t| t.base_city.clone()));
    for service in &services {
        wanted.insert(service.pickup_city.clone());
        wanted.insert(service.delivery_city.clone());
        if let Some(base) = &service.scheduled_base {
            wanted.insert(base.clone());
        }
    }
    let resolved = warm_coordinates(pool, geocoder, &wanted, &mut cache).await;
    if resolved > 0 {
        info!(resolved, "Geocoded missing cities");
    }

    let trailers = exclude_unplaceable_trailers(trailers, &cache);
    let (services, mut pending) = exclude_unknown_cities(services, &cache);
    let (services, oversized) = exclude_oversized_blocks(services, &trailers);
    pending.extend(oversized);

    let params = SearchParams {
        time_budget: request.time_budget,
        ..SearchParams::default()
    };
    let result = run_rounds(
        request.day,
        services,
        trailers,
        &cache,
        &weights,
        solver,
        params,
        request.max_rounds,
    )
    .await;
    pending.extend(result.pending);

    let planned_services = result
        .routes
        .iter()
        .flat_map(|route| &route.stops)
        .filter(|stop| stop.role == StopRole::Pickup)
        .count();
    let outcome = PlanOutcome {
        day: request.day,
        routes: result.routes,
        pending,
        rounds_executed: result.rounds,
        eligible_services: eligible,
        planned_services,
    };
    log_summary(&outcome);

    if request.dry_run {
        info!("Dry run: skipping persistence");
    } else {
        let saved = queries::planned_route::persist_outcome(pool, &outcome)
            .await
            .context("persisting planned routes")?;
        info!(saved, "Routes persisted");
    }

    Ok(outcome)
}

/// Resolve and cache coordinates for the given planning day's cities
/// without running a plan. Returns how many cities were newly
/// geocoded.
pub async fn warm_day_coordinates(
    pool: &PgPool,
    geocoder: &dyn Geocoder,
    day: NaiveDate,
) -> Result<usize> {
    let trailer_records = queries::trailer::active_trailers(pool)
        .await
        .context("loading trailers")?;
    let trailers = prepare_trailers(&trailer_records, &[]);
    let base_cities: HashSet<String> = trailers.iter().map(|t| t.base_city.clone()).collect();

    let base_rules: HashMap<String, String> = queries::base_rules::load_base_rules(pool)
        .await
        .context("loading base rules")?
        .into_iter()
        .map(|(city, base)| (normalize_city(&city), normalize_city(&base)))
        .collect();

    let service_records = queries::service::eligible_services(pool, day, false)
        .await
        .context("loading services")?;
    let services = prepare_services(&service_records, &base_cities, &base_rules, false);

    let mut wanted: BTreeSet<String> = BTreeSet::new();
    wanted.extend(base_cities);
    wanted.extend(base_rules.into_values());
    for service in &services {
        wanted.insert(service.pickup_city.clone());
        wanted.insert(service.delivery_city.clone());
        if let Some(base) = &service.scheduled_base {
            wanted.insert(base.clone());
        }
    }

    let coord_rows = queries::coords::load_city_coords(pool)
        .await
        .context("loading city coordinates")?;
    let mut cache = CoordinateCache::from_rows(coord_rows);
    Ok(warm_coordinates(pool, geocoder, &wanted, &mut cache).await)
}

/// Geocode every city missing from the cache and store the results.
/// Lookup and storage failures are logged per city, never fatal: a city
/// left unresolved surfaces later as an exclusion.
async fn warm_coordinates(
    pool: &PgPool,
    geocoder: &dyn Geocoder,
    cities: &BTreeSet<String>,
    cache: &mut CoordinateCache,
) -> usize {
    let mut resolved = 0;
    for city in cities {
        if cache.contains(city) || city == crate::services::cities::UNKNOWN_CITY {
            continue;
        }
        match geocoder.geocode(city).await {
            Ok(Some(coordinate)) => {
                debug!(city = %city, provider = geocoder.name(), "Geocoded city");
                cache.insert(city.clone(), coordinate);
                resolved += 1;
                if let Err(err) = queries::coords::upsert_city_coord(pool, city, coordinate).await {
                    warn!(city = %city, error = %err, "Failed to store geocoded coordinate");
                }
            }
            Ok(None) => {
                warn!(city = %city, provider = geocoder.name(), "No geocoding result for city");
            }
            Err(err) => {
                warn!(city = %city, error = %err, "Geocoding failed for city");
            }
        }
    }
    resolved
}

/// Trailers whose base city has no coordinates cannot anchor a depot.
fn exclude_unplaceable_trailers(trailers: Vec<Trailer>, cache: &CoordinateCache) -> Vec<Trailer> {
    trailers
        .into_iter()
        .filter(|trailer| {
            let placeable = cache.contains(&trailer.base_city);
            if !placeable {
                warn!(
                    registry = %trailer.registry,
                    base = %trailer.base_city,
                    "Excluding trailer: base city has no coordinates"
                );
            }
            placeable
        })
        .collect()
}

/// Drop every row of any service key referencing a city without
/// coordinates, so a partially resolvable key is never split. The
/// dropped keys are reported as pending, not lost.
fn exclude_unknown_cities(
    services: Vec<Service>,
    cache: &CoordinateCache,
) -> (Vec<Service>, Vec<PendingService>) {
    let mut unresolved: BTreeSet<String> = BTreeSet::new();
    for service in &services {
        if !cache.contains(&service.pickup_city) || !cache.contains(&service.delivery_city) {
            warn!(
                service_key = %service.service_key,
                pickup = %service.pickup_city,
                delivery = %service.delivery_city,
                "Excluding service: city has no coordinates"
            );
            unresolved.insert(service.service_key.clone());
        }
    }
    let kept = services
        .into_iter()
        .filter(|service| !unresolved.contains(&service.service_key))
        .collect();
    let pending = unresolved
        .into_iter()
        .map(|service_key| PendingService {
            service_key,
            reason: PendingReason::UnknownCity,
        })
        .collect();
    (kept, pending)
}

/// Blocks too big for every trailer in the fleet can never be planned;
/// they are pending from the start instead of being retried each round.
fn exclude_oversized_blocks(
    services: Vec<Service>,
    fleet: &[Trailer],
) -> (Vec<Service>, Vec<PendingService>) {
    if fleet.is_empty() {
        return (services, Vec::new());
    }
    let rows: Vec<usize> = (0..services.len()).collect();
    let oversized: BTreeSet<String> = build_blocks(&services, &rows)
        .into_iter()
        .filter(|block| exceeds_every_trailer(block, fleet))
        .map(|block| {
            warn!(
                service_key = %block.service_key,
                ceu_tenths = block.ceu_tenths,
                "Service block exceeds every trailer's capacity"
            );
            block.service_key
        })
        .collect();
    let kept = services
        .into_iter()
        .filter(|service| !oversized.contains(&service.service_key))
        .collect();
    let pending = oversized
        .into_iter()
        .map(|service_key| PendingService {
            service_key,
            reason: PendingReason::ExceedsEveryTrailer,
        })
        .collect();
    (kept, pending)
}

/// The sequential round loop over prepared pools. Consumes services by
/// assigned key and trailers by use; stops when either pool empties,
/// no batch can be formed, or the round cap is hit. A round whose
/// solve fails leaves both pools untouched.
#[allow(clippy::too_many_arguments)]
pub async fn run_rounds(
    day: NaiveDate,
    mut services: Vec<Service>,
    mut trailers: Vec<Trailer>,
    cache: &CoordinateCache,
    weights: &ConstraintWeights,
    solver: Arc<dyn RouteSearch>,
    params: SearchParams,
    max_rounds: u32,
) -> RoundsResult {
    let mut routes = Vec::new();
    let mut allocated: HashSet<String> = HashSet::new();
    let mut cursor = 0usize;
    let mut rounds = 0u32;

    while rounds < max_rounds && !services.is_empty() && !trailers.is_empty() {
        let Some((packed, advance)) = next_batch(&services, &trailers, cache, cursor) else {
            debug!("No feasible batch can be formed from the remaining pools");
            break;
        };
        cursor += advance;
        rounds += 1;

        let batch_services: Vec<Service> = packed
            .service_rows
            .iter()
            .filter_map(|&row| services.get(row).cloned())
            .collect();
        let batch_trailers: Vec<Trailer> = packed
            .trailer_indices
            .iter()
            .filter_map(|&index| trailers.get(index).cloned())
            .collect();
        debug!(
            round = rounds,
            services = batch_services.len(),
            trailers = batch_trailers.len(),
            "Round batch packed"
        );

        let mut index = CityIndex::new();
        for trailer in &batch_trailers {
            index.insert(&trailer.base_city);
        }
        for service in &batch_services {
            index.insert(&service.pickup_city);
            index.insert(&service.delivery_city);
        }
        let matrix = match DistanceMatrix::build(&index, cache) {
            Ok(matrix) => matrix,
            Err(err) => {
                warn!(round = rounds, error = %err, "Skipping round: distance matrix failed");
                continue;
            }
        };
        let batch = match build_batch_model(
            &batch_services,
            &batch_trailers,
            &index,
            &matrix,
            weights,
            &default_rules(),
        ) {
            Ok(batch) => batch,
            Err(err) => {
                warn!(round = rounds, error = %err, "Skipping round: model construction failed");
                continue;
            }
        };

        let round_solver = Arc::clone(&solver);
        let solve = tokio::task::spawn_blocking(move || {
            let assignment = round_solver.solve(&batch.model, &params);
            (batch, assignment)
        });
        let (batch, assignment) = match solve.await {
            Ok(result) => result,
            Err(err) => {
                warn!(round = rounds, error = %err, "Solve task failed");
                continue;
            }
        };
        let Some(assignment) = assignment else {
            warn!(
                round = rounds,
                services = batch_services.len(),
                trailers = batch_trailers.len(),
                "Round found no solution; pools left as they were"
            );
            continue;
        };

        let round_routes = extract_routes(day, &assignment, &batch, &batch_services, &batch_trailers);
        let keys = assigned_keys(&assignment, &batch, &batch_services);
        info!(
            round = rounds,
            routes = round_routes.len(),
            assigned_keys = keys.len(),
            dropped_nodes = assignment.dropped().len(),
            objective = assignment.objective,
            "Round solved"
        );

        for key in &keys {
            if !allocated.insert(key.clone()) {
                warn!(service_key = %key, "Service key assigned in more than one round");
            }
        }

        // only trailers that actually drove leave the pool
        let routed_ids: HashSet<i64> = round_routes.iter().map(|r| r.trailer_id).collect();
        let used_indices: HashSet<usize> = packed
            .trailer_indices
            .iter()
            .enumerate()
            .filter(|&(vehicle, _)| {
                batch_trailers
                    .get(vehicle)
                    .is_some_and(|t| routed_ids.contains(&t.id))
            })
            .map(|(_, &index)| index)
            .collect();

        routes.extend(round_routes);
        services.retain(|service| !allocated.contains(&service.service_key));
        let mut position = 0;
        trailers.retain(|_| {
            let keep = !used_indices.contains(&position);
            position += 1;
            keep
        });
    }

    let leftover: BTreeSet<String> = services
        .iter()
        .map(|service| service.service_key.clone())
        .collect();
    let pending = leftover
        .into_iter()
        .map(|service_key| PendingService {
            service_key,
            reason: PendingReason::NoTrailerThisRun,
        })
        .collect();
    RoundsResult { routes, pending, rounds }
}

/// Pick the next batch: cluster the remaining pool, then scan the
/// interleaved groups starting at the cursor for the first one that
/// packs onto a trailer. Returns the batch and how far the cursor
/// moved.
fn next_batch(
    services: &[Service],
    trailers: &[Trailer],
    cache: &CoordinateCache,
    cursor: usize,
) -> Option<(PackedBatch, usize)> {
    let groups = cluster_batches(services, cache);
    if groups.is_empty() {
        return None;
    }
    let trailer_indices: Vec<usize> = (0..trailers.len()).collect();
    for offset in 0..groups.len() {
        let group = &groups[(cursor + offset) % groups.len()];
        let blocks = build_blocks(services, group);
        let packed = pack_blocks(&blocks, trailers, &trailer_indices);
        if !packed.is_empty() {
            return Some((packed, offset + 1));
        }
    }
    None
}

fn log_summary(outcome: &PlanOutcome) {
    info!(
        day = %outcome.day,
        eligible = outcome.eligible_services,
        planned = outcome.planned_services,
        pending = outcome.pending.len(),
        pending_unknown_city = outcome.pending_with_reason(PendingReason::UnknownCity),
        pending_oversized = outcome.pending_with_reason(PendingReason::ExceedsEveryTrailer),
        pending_no_trailer = outcome.pending_with_reason(PendingReason::NoTrailerThisRun),
        rounds = outcome.rounds_executed,
        routes = outcome.routes.len(),
        "Planning run finished"
    );
    for route in &outcome.routes {
        info!(
            registry = %route.registry,
            stops = route.stops.len(),
            total_km = route.total_km,
            total_ceu = route.total_ceu,
            "Planned route"
        );
    }
}
