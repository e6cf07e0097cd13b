//! Constraint weight queries

use std::collections::HashMap;

use anyhow::Result;
use sqlx::PgPool;

/// Latest value per weight key from the versioned table. Missing keys
/// fall back to defaults downstream.
pub async fn latest_weights(pool: &PgPool) -> Result<HashMap<String, f64>> {
    let rows: Vec<(String, f64)> = sqlx::query_as(
        r#"
        SELECT DISTINCT ON (key) key, value
        FROM constraint_weights
        ORDER BY key, version DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}
