//! Greedy capacity packing for one round
//!
//! Rows sharing a `service_key` move as one block so a multi-row
//! service is never split across rounds. Blocks are packed first-fit
//! in descending CEU order against remaining trailer capacity; what
//! fits nowhere stays in the pool for a later round.

use std::collections::HashMap;

use crate::types::{Service, Trailer};

/// All rows of one `service_key`, with their summed scaled CEU.
#[derive(Debug, Clone)]
pub struct ServiceBlock {
    pub service_key: String,
    /// Indices into the pool the block was built from.
    pub rows: Vec<usize>,
    pub ceu_tenths: i64,
}

/// One round's batch after packing: the service rows to model and the
/// trailers (pool indices) that will carry them.
#[derive(Debug, Clone, Default)]
pub struct PackedBatch {
    pub service_rows: Vec<usize>,
    pub trailer_indices: Vec<usize>,
}

impl PackedBatch {
    pub fn is_empty(&self) -> bool {
        self.service_rows.is_empty()
    }
}

/// Group `rows` by service key, preserving first-appearance order.
pub fn build_blocks(services: &[Service], rows: &[usize]) -> Vec<ServiceBlock> {
    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, ServiceBlock> = HashMap::new();
    for &row in rows {
        let Some(service) = services.get(row) else { continue };
        let block = by_key
            .entry(service.service_key.clone())
            .or_insert_with(|| {
                order.push(service.service_key.clone());
                ServiceBlock {
                    service_key: service.service_key.clone(),
                    rows: Vec::new(),
                    ceu_tenths: 0,
                }
            });
        block.rows.push(row);
        block.ceu_tenths += service.demand.ceu_tenths;
    }
    order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .collect()
}

/// First-fit-descending over remaining CEU. Trailers are tried in pool
/// order; a block lands on the first one with room. Returns the packed
/// batch; unpacked blocks simply stay behind.
pub fn pack_blocks(
    blocks: &[ServiceBlock],
    trailers: &[Trailer],
    trailer_indices: &[usize],
) -> PackedBatch {
    let mut sorted: Vec<&ServiceBlock> = blocks.iter().collect();
    // stable, so equal demands keep first-appearance order
    sorted.sort_by(|a, b| b.ceu_tenths.cmp(&a.ceu_tenths));

    let mut remaining: Vec<i64> = trailer_indices
        .iter()
        .filter_map(|&i| trailers.get(i).map(|t| t.capacity.ceu_tenths))
        .collect();

    let mut batch = PackedBatch::default();
    let mut used = vec![false; trailer_indices.len()];
    for block in sorted {
        let slot = remaining.iter().position(|&left| left >= block.ceu_tenths);
        if let Some(slot) = slot {
            remaining[slot] -= block.ceu_tenths;
            used[slot] = true;
            batch.service_rows.extend(block.rows.iter().copied());
        }
    }
    batch.trailer_indices = trailer_indices
        .iter()
        .zip(used)
        .filter_map(|(&index, used)| used.then_some(index))
        .collect();
    batch.service_rows.sort_unstable();
    batch
}

/// True when no trailer in the whole fleet could ever carry the block,
/// even empty. Such blocks are pending from the start, not retried
/// round after round.
pub fn exceeds_every_trailer(block: &ServiceBlock, fleet: &[Trailer]) -> bool {
    fleet
        .iter()
        .all(|trailer| trailer.capacity.ceu_tenths < block.ceu_tenths)
}
