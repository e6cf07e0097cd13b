//! Node index arithmetic
//!
//! The search model addresses everything by node index. The layout is
//! fixed: depot nodes first, then one pickup node per service row, then
//! one delivery node per service row. All arithmetic over that layout
//! lives here; the rest of the crate asks the indexer instead of
//! computing offsets.

/// Side of a service a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Pickup,
    Delivery,
}

/// Maps between (service row, role) and flat node indices for one
/// batch. Depots occupy `[0, depot_count)`, pickups
/// `[depot_count, depot_count + services)`, deliveries the block after.
#[derive(Debug, Clone, Copy)]
pub struct NodeIndexer {
    depot_count: usize,
    service_count: usize,
}

impl NodeIndexer {
    pub fn new(depot_count: usize, service_count: usize) -> Self {
        Self { depot_count, service_count }
    }

    pub fn node_count(&self) -> usize {
        self.depot_count + 2 * self.service_count
    }

    pub fn depot_count(&self) -> usize {
        self.depot_count
    }

    pub fn service_count(&self) -> usize {
        self.service_count
    }

    /// Node index of a depot slot.
    pub fn depot_node(&self, depot: usize) -> usize {
        debug_assert!(depot < self.depot_count);
        depot
    }

    pub fn is_depot(&self, node: usize) -> bool {
        node < self.depot_count
    }

    /// Node index for one side of a service row.
    pub fn node_for(&self, service: usize, role: NodeRole) -> usize {
        debug_assert!(service < self.service_count);
        match role {
            NodeRole::Pickup => self.depot_count + service,
            NodeRole::Delivery => self.depot_count + self.service_count + service,
        }
    }

    /// Reverse lookup; `None` for depot or out-of-range nodes.
    pub fn service_for(&self, node: usize) -> Option<(usize, NodeRole)> {
        if node < self.depot_count {
            return None;
        }
        let offset = node - self.depot_count;
        if offset < self.service_count {
            Some((offset, NodeRole::Pickup))
        } else if offset < 2 * self.service_count {
            Some((offset - self.service_count, NodeRole::Delivery))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_blocks_are_contiguous() {
        let indexer = NodeIndexer::new(2, 3);
        assert_eq!(indexer.node_count(), 8);
        assert_eq!(indexer.depot_node(0), 0);
        assert_eq!(indexer.depot_node(1), 1);
        assert_eq!(indexer.node_for(0, NodeRole::Pickup), 2);
        assert_eq!(indexer.node_for(2, NodeRole::Pickup), 4);
        assert_eq!(indexer.node_for(0, NodeRole::Delivery), 5);
        assert_eq!(indexer.node_for(2, NodeRole::Delivery), 7);
    }

    #[test]
    fn test_round_trip_for_every_service_node() {
        let indexer = NodeIndexer::new(3, 4);
        for service in 0..4 {
            for role in [NodeRole::Pickup, NodeRole::Delivery] {
                let node = indexer.node_for(service, role);
                assert_eq!(indexer.service_for(node), Some((service, role)));
                assert!(!indexer.is_depot(node));
            }
        }
    }

    #[test]
    fn test_depots_have_no_service() {
        let indexer = NodeIndexer::new(2, 5);
        assert!(indexer.is_depot(0));
        assert!(indexer.is_depot(1));
        assert_eq!(indexer.service_for(0), None);
        assert_eq!(indexer.service_for(1), None);
        assert_eq!(indexer.service_for(indexer.node_count()), None);
    }

    #[test]
    fn test_empty_batch_is_just_depots() {
        let indexer = NodeIndexer::new(1, 0);
        assert_eq!(indexer.node_count(), 1);
        assert_eq!(indexer.service_for(0), None);
    }
}
