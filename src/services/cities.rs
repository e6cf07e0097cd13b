//! City name canonicalization, city indexing and distance matrices
//!
//! Every component downstream of input preparation works with canonical
//! city names only. Canonicalization is idempotent, so re-normalizing a
//! stored value is always safe.

use std::collections::HashMap;

use crate::services::geo::haversine_km_rounded;
use crate::types::{CityCoordRow, Coordinate};

/// Sentinel for city values that are empty or unusable after trimming.
pub const UNKNOWN_CITY: &str = "DESCONHECIDA";

/// Canonicalize a raw city name: fold accented letters to ASCII, drop
/// any other non-ASCII, trim and upper-case. Empty input maps to
/// [`UNKNOWN_CITY`].
pub fn normalize_city(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match fold_accent(ch) {
            Some(folded) => out.push_str(folded),
            None if ch.is_ascii() => out.push(ch.to_ascii_uppercase()),
            None => {} // non-ASCII without a fold rule is dropped
        }
    }
    let trimmed = out.trim();
    if trimmed.is_empty() {
        UNKNOWN_CITY.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Convenience for optional city fields from the database.
pub fn normalize_city_opt(raw: Option<&str>) -> String {
    match raw {
        Some(value) => normalize_city(value),
        None => UNKNOWN_CITY.to_string(),
    }
}

fn fold_accent(ch: char) -> Option<&'static str> {
    let folded = match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'Å' => "A",
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => "E",
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => "I",
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => "O",
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => "U",
        'ç' | 'Ç' => "C",
        'ñ' | 'Ñ' => "N",
        'ý' | 'ÿ' | 'Ý' => "Y",
        'æ' | 'Æ' => "AE",
        'œ' | 'Œ' => "OE",
        'ß' => "SS",
        _ => return None,
    };
    Some(folded)
}

/// Dense city index assigned by first appearance. The order inputs are
/// inserted in fully determines the index, which keeps matrices and
/// node numbering reproducible across identical runs.
#[derive(Debug, Default, Clone)]
pub struct CityIndex {
    names: Vec<String>,
    by_name: HashMap<String, usize>,
}

impl CityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a canonical city name, returning its index. Re-inserting
    /// an existing name returns the original index.
    pub fn insert(&mut self, city: &str) -> usize {
        if let Some(&idx) = self.by_name.get(city) {
            return idx;
        }
        let idx = self.names.len();
        self.names.push(city.to_string());
        self.by_name.insert(city.to_string(), idx);
        idx
    }

    pub fn get(&self, city: &str) -> Option<usize> {
        self.by_name.get(city).copied()
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i, n.as_str()))
    }
}

/// Per-run coordinate cache keyed by canonical city name. Owned by the
/// planning run that loaded it; never shared across runs.
#[derive(Debug, Default, Clone)]
pub struct CoordinateCache {
    coords: HashMap<String, Coordinate>,
}

impl CoordinateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<CityCoordRow>) -> Self {
        let coords = rows
            .into_iter()
            .map(|row| (row.city_norm.clone(), row.coordinate()))
            .collect();
        Self { coords }
    }

    pub fn get(&self, city: &str) -> Option<Coordinate> {
        self.coords.get(city).copied()
    }

    pub fn contains(&self, city: &str) -> bool {
        self.coords.contains_key(city)
    }

    pub fn insert(&mut self, city: String, coordinate: Coordinate) {
        self.coords.insert(city, coordinate);
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

/// A city listed in a batch has no cached coordinates. Inputs are
/// filtered before matrix construction, so hitting this means the
/// filter and the cache disagree.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("no coordinates for city '{0}'")]
pub struct UnknownCity(pub String);

/// Symmetric integer-kilometer great-circle distance matrix over a
/// city index.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    km: Vec<Vec<i64>>,
}

impl DistanceMatrix {
    pub fn build(index: &CityIndex, cache: &CoordinateCache) -> Result<Self, UnknownCity> {
        let mut points = Vec::with_capacity(index.len());
        for (_, name) in index.iter() {
            let coordinate = cache
                .get(name)
                .ok_or_else(|| UnknownCity(name.to_string()))?;
            points.push(coordinate);
        }

        let n = points.len();
        let mut km = vec![vec![0i64; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = haversine_km_rounded(points[i], points[j]);
                km[i][j] = d;
                km[j][i] = d;
            }
        }

        Ok(Self { km })
    }

    pub fn size(&self) -> usize {
        self.km.len()
    }

    /// Distance in whole kilometers, `None` when either index is out of
    /// range.
    pub fn km(&self, from: usize, to: usize) -> Option<i64> {
        self.km.get(from).and_then(|row| row.get(to)).copied()
    }
}
