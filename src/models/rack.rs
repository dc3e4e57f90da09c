// Rack and aisle models describing the physical storage layout

use crate::models::{AisleId, RackId};
use serde::{Deserialize, Serialize};

/// A storage rack with a fixed number of slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rack {
    /// Index of the rack, `0..num_racks`
    pub id: RackId,

    /// Number of product slots in the rack
    pub capacity: u32,
}

impl Rack {
    pub fn new(id: RackId, capacity: u32) -> Self {
        Self { id, capacity }
    }
}

/// An aisle: an ordered group of racks sharing one aeration requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aisle {
    /// Index of the aisle, `0..num_aisles`
    pub id: AisleId,

    /// Racks of the aisle in traversal order
    pub racks: Vec<RackId>,
}

impl Aisle {
    /// Creates a new aisle from its racks in traversal order
    pub fn new(id: AisleId, racks: Vec<RackId>) -> Self {
        Self { id, racks }
    }

    /// Racks of the aisle sorted by id, duplicates removed
    pub fn sorted_racks(&self) -> Vec<RackId> {
        let mut racks = self.racks.clone();
        racks.sort_unstable();
        racks.dedup();
        racks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_racks() {
        let aisle = Aisle::new(1, vec![7, 5, 6, 5]);
        assert_eq!(aisle.sorted_racks(), vec![5, 6, 7]);
    }
}
