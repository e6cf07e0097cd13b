//! Service source queries

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::types::ServiceRecord;

/// Lifecycle states a service may be in and still get planned.
pub const ELIGIBLE_STATES: &[&str] = &["P", "PA", "A", "S", "AM"];

/// Service categories the planner handles.
pub const ELIGIBLE_CATEGORY_IDS: &[i64] =
    &[8, 10, 12, 13, 19, 25, 27, 28, 29, 33, 37, 48, 50, 85, 86];

/// Categories planned only through base pickups, on dedicated runs.
pub const RESTRICTED_CATEGORY_IDS: &[i64] = &[85, 86];

/// Services due on or before the planning day, in the eligible states
/// and categories. `restricted_only` narrows to the restricted pair.
pub async fn eligible_services(
    pool: &PgPool,
    day: NaiveDate,
    restricted_only: bool,
) -> Result<Vec<ServiceRecord>> {
    let states: Vec<String> = ELIGIBLE_STATES.iter().map(|s| s.to_string()).collect();
    let category_ids: Vec<i64> = if restricted_only {
        RESTRICTED_CATEGORY_IDS.to_vec()
    } else {
        ELIGIBLE_CATEGORY_IDS.to_vec()
    };

    let services = sqlx::query_as::<_, ServiceRecord>(
        r#"
        SELECT
            id, service_key, pickup_city, delivery_city,
            vehicle_category, ceu_override, scheduled_base
        FROM services
        WHERE state = ANY($1)
          AND category_id = ANY($2)
          AND due_date <= $3
        ORDER BY id
        "#,
    )
    .bind(&states)
    .bind(&category_ids)
    .bind(day)
    .fetch_all(pool)
    .await?;

    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restricted_ids_are_a_subset_of_eligible() {
        for id in RESTRICTED_CATEGORY_IDS {
            assert!(ELIGIBLE_CATEGORY_IDS.contains(id));
        }
    }
}
