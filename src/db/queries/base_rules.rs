//! Base-rule queries

use std::collections::HashMap;

use anyhow::Result;
use sqlx::PgPool;

/// Delivery city -> mandatory return base, both stored normalized.
/// A delivery into a key city forces the serving trailer straight back
/// to its base.
pub async fn load_base_rules(pool: &PgPool) -> Result<HashMap<String, String>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT city_norm, base_city
        FROM city_base_rules
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}
