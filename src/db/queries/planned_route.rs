//! Planned route persistence

use anyhow::Result;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::{PlanOutcome, PlannedRoute};

/// Insert one route header plus its ordered stops. A failed stop is
/// logged and skipped so one bad row cannot lose the whole route.
pub async fn insert_planned_route(pool: &PgPool, route: &PlannedRoute) -> Result<Uuid> {
    let route_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO planned_routes (id, day, trailer_id, registry, total_km, total_ceu)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(route_id)
    .bind(route.day)
    .bind(route.trailer_id)
    .bind(&route.registry)
    .bind(route.total_km)
    .bind(route.total_ceu)
    .execute(pool)
    .await?;

    for stop in &route.stops {
        let result = sqlx::query(
            r#"
            INSERT INTO planned_route_stops
                (id, route_id, service_id, service_key, role, city, stop_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(route_id)
        .bind(stop.service_id)
        .bind(&stop.service_key)
        .bind(stop.role.as_str())
        .bind(&stop.city)
        .bind(stop.stop_order)
        .execute(pool)
        .await;
        if let Err(err) = result {
            warn!(
                registry = %route.registry,
                service_key = %stop.service_key,
                stop_order = stop.stop_order,
                error = %err,
                "Failed to persist route stop, skipping it"
            );
        }
    }

    Ok(route_id)
}

/// Persist every route of a run. Returns how many made it; failed
/// headers are logged and skipped.
pub async fn persist_outcome(pool: &PgPool, outcome: &PlanOutcome) -> Result<usize> {
    let mut saved = 0;
    for route in &outcome.routes {
        match insert_planned_route(pool, route).await {
            Ok(route_id) => {
                debug!(
                    registry = %route.registry,
                    route_id = %route_id,
                    stops = route.stops.len(),
                    "Persisted planned route"
                );
                saved += 1;
            }
            Err(err) => {
                warn!(
                    registry = %route.registry,
                    error = %err,
                    "Failed to persist planned route"
                );
            }
        }
    }
    Ok(saved)
}
