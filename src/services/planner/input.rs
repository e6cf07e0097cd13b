//! Raw row to domain conversion
//!
//! Pure mapping from source records to `Service` and `Trailer` values:
//! city normalization, demand inference from the vehicle-category
//! name, base flags, and the restricted-category narrowing. Built once
//! per run; nothing downstream mutates the results.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::services::cities::{normalize_city, normalize_city_opt, UNKNOWN_CITY};
use crate::types::{Demand, Service, ServiceRecord, Trailer, TrailerRecord, CEU_SCALE};

/// Demand vector from the vehicle-category name, with an optional
/// explicit CEU override. Motorcycles take a fraction of a slot and do
/// not count as a light vehicle; vans and flatbeds take more than one
/// slot and additionally consume their class counter.
pub fn infer_demand(category: &str, ceu_override: Option<f64>) -> Demand {
    let category = category.to_lowercase();
    let is_moto = category.contains("moto");
    let is_van = category.contains("furg");
    let is_flatbed = category.contains("rodado");

    let inferred_tenths = if is_moto {
        3
    } else if is_van || is_flatbed {
        15
    } else {
        10
    };
    let ceu_tenths = match ceu_override {
        Some(explicit) if explicit > 0.0 => (explicit * CEU_SCALE as f64).round() as i64,
        _ => inferred_tenths,
    };

    Demand {
        ceu_tenths,
        light: if is_moto { 0 } else { 1 },
        van: if is_van { 1 } else { 0 },
        flatbed: if is_flatbed { 1 } else { 0 },
    }
}

/// Build the run's service list from source rows.
///
/// In restricted mode only services picked up at a base survive, and a
/// set `scheduled_base` replaces the pickup city so the route starts
/// from the base actually holding the cargo.
pub fn prepare_services(
    records: &[ServiceRecord],
    base_cities: &HashSet<String>,
    base_rules: &HashMap<String, String>,
    restricted: bool,
) -> Vec<Service> {
    let mut services = Vec::with_capacity(records.len());
    for record in records {
        let mut pickup_city = normalize_city_opt(record.pickup_city.as_deref());
        let delivery_city = normalize_city_opt(record.delivery_city.as_deref());
        let scheduled_base = record
            .scheduled_base
            .as_deref()
            .map(normalize_city)
            .filter(|city| city != UNKNOWN_CITY);

        if restricted {
            if !base_cities.contains(&pickup_city) {
                debug!(
                    service_key = %record.service_key,
                    pickup = %pickup_city,
                    "Skipping restricted service not picked up at a base"
                );
                continue;
            }
            if let Some(base) = &scheduled_base {
                pickup_city = base.clone();
            }
        }

        let category = record.vehicle_category.clone().unwrap_or_default();
        let demand = infer_demand(&category, record.ceu_override);

        services.push(Service {
            id: record.id,
            service_key: record.service_key.clone(),
            force_return: base_rules.contains_key(&delivery_city),
            pickup_at_base: base_cities.contains(&pickup_city),
            delivery_at_base: base_cities.contains(&delivery_city),
            pickup_city,
            delivery_city,
            category,
            demand,
            scheduled_base,
        });
    }
    services
}

/// Build the run's trailer pool from fleet rows, optionally scoped to
/// specific registries. Trailers without a usable base city cannot
/// anchor a route and are skipped.
pub fn prepare_trailers(records: &[TrailerRecord], registry_filter: &[String]) -> Vec<Trailer> {
    let filter: HashSet<String> = registry_filter
        .iter()
        .map(|registry| registry.trim().to_uppercase())
        .collect();

    let mut trailers = Vec::with_capacity(records.len());
    for record in records {
        if !filter.is_empty() && !filter.contains(&record.registry.trim().to_uppercase()) {
            continue;
        }
        let base_city = normalize_city_opt(record.base_city.as_deref());
        if base_city == UNKNOWN_CITY {
            warn!(registry = %record.registry, "Skipping trailer without a base city");
            continue;
        }
        trailers.push(Trailer::from_record(record, base_city));
    }
    trailers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, pickup: &str, delivery: &str) -> ServiceRecord {
        ServiceRecord {
            id,
            service_key: format!("S-{id}"),
            pickup_city: Some(pickup.to_string()),
            delivery_city: Some(delivery.to_string()),
            vehicle_category: Some("Ligeiro".to_string()),
            ceu_override: None,
            scheduled_base: None,
        }
    }

    fn trailer_record(id: i64, registry: &str, base: Option<&str>) -> TrailerRecord {
        TrailerRecord {
            id,
            registry: registry.to_string(),
            base_city: base.map(str::to_string),
            ceu_max: 7.5,
            light_max: 7,
            van_max: 2,
            flatbed_max: 1,
        }
    }

    #[test]
    fn test_standard_category_takes_one_ceu_and_one_light_slot() {
        let demand = infer_demand("Ligeiro", None);
        assert_eq!(demand.ceu_tenths, 10);
        assert_eq!(demand.light, 1);
        assert_eq!(demand.van, 0);
        assert_eq!(demand.flatbed, 0);
    }

    #[test]
    fn test_moto_takes_a_fraction_and_no_light_slot() {
        let demand = infer_demand("Motociclo 125", None);
        assert_eq!(demand.ceu_tenths, 3);
        assert_eq!(demand.light, 0);
    }

    #[test]
    fn test_van_and_flatbed_take_fifteen_tenths_and_their_slot() {
        let van = infer_demand("Furgão longo", None);
        assert_eq!(van.ceu_tenths, 15);
        assert_eq!(van.light, 1);
        assert_eq!(van.van, 1);

        let flatbed = infer_demand("Ligeiro rodado duplo", None);
        assert_eq!(flatbed.ceu_tenths, 15);
        assert_eq!(flatbed.flatbed, 1);
        assert_eq!(flatbed.van, 0);
    }

    #[test]
    fn test_positive_override_beats_inference() {
        let demand = infer_demand("Motociclo", Some(2.2));
        assert_eq!(demand.ceu_tenths, 22);
        // class indicators still follow the category
        assert_eq!(demand.light, 0);
    }

    #[test]
    fn test_zero_or_negative_override_is_ignored() {
        assert_eq!(infer_demand("Ligeiro", Some(0.0)).ceu_tenths, 10);
        assert_eq!(infer_demand("Ligeiro", Some(-1.0)).ceu_tenths, 10);
    }

    #[test]
    fn test_cities_are_normalized_and_flags_derived() {
        let bases: HashSet<String> = ["PORTO".to_string()].into();
        let mut rules = HashMap::new();
        rules.insert("LISBOA".to_string(), "PORTO".to_string());

        let records = vec![record(1, "  põrto ", "Lisboa")];
        let services = prepare_services(&records, &bases, &rules, false);

        assert_eq!(services.len(), 1);
        assert_eq!(services[0].pickup_city, "PORTO");
        assert_eq!(services[0].delivery_city, "LISBOA");
        assert!(services[0].pickup_at_base);
        assert!(!services[0].delivery_at_base);
        assert!(services[0].force_return, "delivery city under a base rule");
    }

    #[test]
    fn test_restricted_mode_keeps_only_base_pickups() {
        let bases: HashSet<String> = ["PORTO".to_string()].into();
        let records = vec![record(1, "Porto", "Faro"), record(2, "Braga", "Faro")];
        let services = prepare_services(&records, &bases, &HashMap::new(), true);

        assert_eq!(services.len(), 1);
        assert_eq!(services[0].id, 1);
    }

    #[test]
    fn test_restricted_mode_rewrites_origin_to_scheduled_base() {
        let bases: HashSet<String> = ["PORTO".to_string(), "AVEIRO".to_string()].into();
        let mut with_base = record(1, "Porto", "Faro");
        with_base.scheduled_base = Some("Aveiro".to_string());

        let services = prepare_services(&[with_base], &bases, &HashMap::new(), true);
        assert_eq!(services[0].pickup_city, "AVEIRO");
        assert!(services[0].pickup_at_base);
    }

    #[test]
    fn test_registry_filter_matches_case_insensitively() {
        let records = vec![
            trailer_record(1, "AA-11-BB", Some("Porto")),
            trailer_record(2, "CC-22-DD", Some("Braga")),
        ];
        let trailers = prepare_trailers(&records, &["aa-11-bb ".to_string()]);
        assert_eq!(trailers.len(), 1);
        assert_eq!(trailers[0].registry, "AA-11-BB");
    }

    #[test]
    fn test_trailer_without_base_city_is_skipped() {
        let records = vec![
            trailer_record(1, "AA-11-BB", None),
            trailer_record(2, "CC-22-DD", Some("  ")),
            trailer_record(3, "EE-33-FF", Some("Braga")),
        ];
        let trailers = prepare_trailers(&records, &[]);
        assert_eq!(trailers.len(), 1);
        assert_eq!(trailers[0].base_city, "BRAGA");
    }

    #[test]
    fn test_trailer_capacity_scales_ceu_to_tenths() {
        let records = vec![trailer_record(1, "AA-11-BB", Some("Porto"))];
        let trailers = prepare_trailers(&records, &[]);
        assert_eq!(trailers[0].capacity.ceu_tenths, 75);
        assert_eq!(trailers[0].capacity.light, 7);
    }
}
