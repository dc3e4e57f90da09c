//! Greedy circuit-ordered bin packing.
//!
//! Products are grouped by circuit (ascending circuit id, first-seen order
//! inside a circuit) and poured into the racks in ascending rack id order.
//! Every rack draws on the remaining fill allowance of its aisle, so the
//! result respects rack capacities and aisle aeration, and circuits never
//! interleave. The travel cost is not optimised: the objective reported is
//! the number of placed products.
//!
//! Racks are walked once over the whole warehouse, not aisle by aisle. When
//! aisle rack ids are not ascending across aisles, an aisle-by-aisle walk
//! could split a circuit around racks of another aisle; the global walk
//! keeps every circuit on one contiguous id range while each aisle still
//! caps its own fill.

use crate::algorithms::SlottingSolver;
use crate::models::{ObjectiveKind, ProductId, RackId, Solution, WarehouseInstance};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GreedyError {
    #[error("insufficient capacity with aeration: {available} slots allowed for {required} products")]
    Capacity { available: u64, required: usize },

    /// The fill loop disagreed with the capacity pre-check
    #[error("failed to assign {unplaced} of {total} products to racks")]
    Placement { unplaced: usize, total: usize },
}

/// Fast feasible baseline solver
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySolver;

impl GreedySolver {
    pub fn new() -> Self {
        Self
    }

    /// Global placement order: circuits by ascending id, products of a
    /// circuit in first-seen order
    pub fn placement_order(instance: &WarehouseInstance) -> Vec<ProductId> {
        instance.circuits().into_values().flatten().collect()
    }
}

impl SlottingSolver for GreedySolver {
    type Error = GreedyError;

    fn name(&self) -> &'static str {
        "greedy"
    }

    fn solve(&self, instance: &WarehouseInstance) -> Result<Solution, GreedyError> {
        let num_products = instance.num_products();
        info!(
            instance = %instance.name,
            products = num_products,
            racks = instance.num_racks(),
            "running greedy slotting"
        );

        // Allowed fill per aisle
        let mut remaining: Vec<u64> = instance.aisles.iter().map(|a| instance.max_fill(a)).collect();
        let available = instance.total_allowed_fill();
        if available < num_products as u64 {
            warn!(available, required = num_products, "not enough aerated capacity");
            return Err(GreedyError::Capacity {
                available,
                required: num_products,
            });
        }

        let order = Self::placement_order(instance);
        let owner = instance.aisle_of_racks();
        let mut positions: Vec<Option<RackId>> = vec![None; num_products];
        let mut next = 0;

        for rack in 0..instance.num_racks() {
            if next >= order.len() {
                break;
            }
            let Some(aisle) = owner[rack] else {
                continue;
            };
            let slots = u64::from(instance.capacity(rack)).min(remaining[aisle]) as usize;
            let take = slots.min(order.len() - next);
            for &product in &order[next..next + take] {
                positions[product] = Some(rack);
            }
            next += take;
            remaining[aisle] -= take as u64;
            if take > 0 && remaining[aisle] == 0 {
                debug!(aisle, rack, "aisle allowance exhausted");
            }
        }

        let unplaced = positions.iter().filter(|p| p.is_none()).count();
        if unplaced > 0 {
            warn!(unplaced, "greedy fill left products without a rack");
            return Err(GreedyError::Placement {
                unplaced,
                total: num_products,
            });
        }

        let positions: Vec<RackId> = positions.into_iter().flatten().collect();
        info!(placed = num_products, "greedy slotting done");
        Ok(Solution::with_positions(
            positions,
            num_products as u64,
            ObjectiveKind::PlacedProducts,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{check, circuit_intervals};
    use crate::models::{CircuitId, DistanceMatrix};

    fn create_instance(
        capacities: Vec<u32>,
        circuits: Vec<CircuitId>,
        aisles: Vec<Vec<RackId>>,
        aeration_rate: f64,
    ) -> WarehouseInstance {
        let n = capacities.len();
        WarehouseInstance::new(
            "greedy",
            capacities,
            circuits,
            aisles,
            vec![],
            DistanceMatrix::linear(n, 1),
            aeration_rate,
        )
        .unwrap()
    }

    #[test]
    fn test_two_racks_one_circuit() {
        let instance = create_instance(vec![2, 2], vec![0, 0, 0, 0], vec![vec![0, 1]], 0.0);
        let solution = GreedySolver::new().solve(&instance).unwrap();
        assert_eq!(solution.positions, vec![0, 0, 1, 1]);
        assert_eq!(solution.objective, 4);
        assert_eq!(solution.objective_kind, ObjectiveKind::PlacedProducts);
        assert!(check(&instance, &solution).is_ok());
    }

    #[test]
    fn test_insufficient_capacity_after_aeration() {
        // 4 slots, 50 % aeration leaves 2 for 3 products
        let instance = create_instance(vec![2, 2], vec![0, 0, 1], vec![vec![0, 1]], 50.0);
        let err = GreedySolver::new().solve(&instance).unwrap_err();
        assert_eq!(
            err,
            GreedyError::Capacity {
                available: 2,
                required: 3
            }
        );
    }

    #[test]
    fn test_placement_order_groups_circuits() {
        let instance = create_instance(vec![9], vec![2, 0, 2, 1, 0], vec![vec![0]], 0.0);
        assert_eq!(GreedySolver::placement_order(&instance), vec![1, 4, 3, 0, 2]);
    }

    #[test]
    fn test_circuits_never_interleave() {
        let instance = create_instance(
            vec![3, 2, 3, 1, 4, 2],
            vec![3, 1, 1, 2, 3, 1, 2, 0, 0, 3],
            vec![vec![0, 1, 2], vec![3, 4, 5]],
            20.0,
        );
        let solution = GreedySolver::new().solve(&instance).unwrap();
        assert!(check(&instance, &solution).is_ok());

        let mut intervals: Vec<_> = circuit_intervals(&instance, &solution)
            .into_values()
            .collect();
        intervals.sort();
        for pair in intervals.windows(2) {
            assert!(pair[0].1 <= pair[1].0);
        }
    }

    #[test]
    fn test_aisle_allowance_moves_to_next_aisle() {
        // aisle 0 has 4 slots and 50 % aeration: only 2 products fit there
        let instance = create_instance(
            vec![2, 2, 2, 2],
            vec![0, 0, 0, 0],
            vec![vec![0, 1], vec![2, 3]],
            50.0,
        );
        let solution = GreedySolver::new().solve(&instance).unwrap();
        assert_eq!(solution.positions, vec![0, 0, 2, 2]);
        assert!(check(&instance, &solution).is_ok());
    }

    #[test]
    fn test_walk_spans_interleaved_aisles() {
        // aisles {0, 2} and {1, 3}: walking aisle by aisle would split both circuits
        let instance = create_instance(
            vec![1, 1, 1, 1],
            vec![0, 0, 1, 1],
            vec![vec![0, 2], vec![1, 3]],
            0.0,
        );
        let solution = GreedySolver::new().solve(&instance).unwrap();
        assert_eq!(solution.positions, vec![0, 1, 2, 3]);
        assert!(check(&instance, &solution).is_ok());
    }

    #[test]
    fn test_racks_outside_aisles_stay_empty() {
        let instance = create_instance(vec![5, 1, 1], vec![0, 0], vec![vec![1, 2]], 0.0);
        let solution = GreedySolver::new().solve(&instance).unwrap();
        assert_eq!(solution.positions, vec![1, 2]);
    }

    #[test]
    fn test_empty_instance() {
        let instance = create_instance(vec![1], vec![], vec![vec![0]], 0.0);
        let solution = GreedySolver::new().solve(&instance).unwrap();
        assert!(solution.is_empty());
        assert_eq!(solution.objective, 0);
    }
}
