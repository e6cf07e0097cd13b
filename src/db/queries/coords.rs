//! City coordinate cache queries

use anyhow::Result;
use sqlx::PgPool;

use crate::types::{CityCoordRow, Coordinate};

/// All cached city coordinates, keyed by normalized city name.
pub async fn load_city_coords(pool: &PgPool) -> Result<Vec<CityCoordRow>> {
    let rows = sqlx::query_as::<_, CityCoordRow>(
        r#"
        SELECT city_norm, lat, lon
        FROM city_coords
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Store a freshly geocoded coordinate so later runs skip the lookup.
pub async fn upsert_city_coord(
    pool: &PgPool,
    city_norm: &str,
    coordinate: Coordinate,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO city_coords (city_norm, lat, lon)
        VALUES ($1, $2, $3)
        ON CONFLICT (city_norm)
        DO UPDATE SET lat = EXCLUDED.lat, lon = EXCLUDED.lon
        "#,
    )
    .bind(city_norm)
    .bind(coordinate.lat)
    .bind(coordinate.lon)
    .execute(pool)
    .await?;

    Ok(())
}
