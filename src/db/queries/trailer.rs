//! Trailer fleet queries

use anyhow::Result;
use sqlx::PgPool;

use crate::types::TrailerRecord;

/// The active fleet, in a stable order.
pub async fn active_trailers(pool: &PgPool) -> Result<Vec<TrailerRecord>> {
    let trailers = sqlx::query_as::<_, TrailerRecord>(
        r#"
        SELECT
            id, registry, base_city,
            ceu_max, light_max, van_max, flatbed_max
        FROM trailers
        WHERE active = TRUE
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(trailers)
}
