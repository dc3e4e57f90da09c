// Order-picking travel cost: the single source of truth for route costs

use crate::models::{Cost, DistanceMatrix, Order, RackId, WarehouseInstance};
use rayon::prelude::*;

/// Cost of walking `start -> racks[0] -> ... -> racks[k-1] -> end`.
///
/// `racks` is visited in the given order; callers pass the sorted,
/// deduplicated racks of an order.
pub fn route_cost(distances: &DistanceMatrix, start: RackId, racks: &[RackId], end: RackId) -> Cost {
    let mut total = 0;
    let mut current = start;
    for &rack in racks {
        total += distances.get(current, rack);
        current = rack;
    }
    total + distances.get(current, end)
}

/// Sum of consecutive legs along `racks`, without the boundary racks
pub fn path_cost(distances: &DistanceMatrix, racks: &[RackId]) -> Cost {
    racks
        .windows(2)
        .map(|leg| distances.get(leg[0], leg[1]))
        .sum()
}

/// Travel cost of one order under the given placement
pub fn order_cost(instance: &WarehouseInstance, positions: &[RackId], order: &Order) -> Cost {
    let racks = order.racks(positions);
    route_cost(
        &instance.distances,
        instance.start_rack(),
        &racks,
        instance.end_rack(),
    )
}

/// Total travel cost over all orders.
///
/// `positions` must hold an in-range rack for every product.
pub fn total_cost(instance: &WarehouseInstance, positions: &[RackId]) -> Cost {
    instance
        .orders
        .iter()
        .map(|order| order_cost(instance, positions, order))
        .sum()
}

/// Same as [`total_cost`], evaluating orders in parallel
pub fn par_total_cost(instance: &WarehouseInstance, positions: &[RackId]) -> Cost {
    instance
        .orders
        .par_iter()
        .map(|order| order_cost(instance, positions, order))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_instance() -> WarehouseInstance {
        WarehouseInstance::new(
            "cost",
            vec![0, 2, 2, 2, 0],
            vec![0, 0, 1, 1],
            vec![vec![0, 1, 2, 3, 4]],
            vec![vec![0, 2], vec![3, 1, 1], vec![]],
            DistanceMatrix::linear(5, 10),
            0.0,
        )
        .unwrap()
    }

    #[test]
    fn test_route_cost() {
        let distances = DistanceMatrix::linear(5, 1);
        assert_eq!(route_cost(&distances, 0, &[1, 3], 4), 4);
        assert_eq!(route_cost(&distances, 0, &[], 4), 4);
        // Unsorted racks are walked as given
        assert_eq!(route_cost(&distances, 0, &[3, 1], 4), 3 + 2 + 3);
    }

    #[test]
    fn test_path_cost() {
        let distances = DistanceMatrix::linear(5, 2);
        assert_eq!(path_cost(&distances, &[1, 2, 4]), 6);
        assert_eq!(path_cost(&distances, &[3]), 0);
    }

    #[test]
    fn test_order_cost_uses_sorted_distinct_racks() {
        let instance = create_test_instance();
        let positions = vec![3, 1, 2, 3];
        // order 0 touches racks {3, 2} -> 0,2,3,4
        assert_eq!(order_cost(&instance, &positions, &instance.orders[0]), 40);
        // order 1 touches racks {3, 1} -> 0,1,3,4
        assert_eq!(order_cost(&instance, &positions, &instance.orders[1]), 40);
        // empty order walks straight from start to end
        assert_eq!(order_cost(&instance, &positions, &instance.orders[2]), 40);
    }

    #[test]
    fn test_asymmetric_distances() {
        let distances =
            DistanceMatrix::from_rows(vec![vec![0, 1, 9], vec![5, 0, 2], vec![7, 3, 0]]).unwrap();
        assert_eq!(route_cost(&distances, 0, &[1], 2), 3);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let instance = create_test_instance();
        let positions = vec![1, 2, 3, 1];
        assert_eq!(
            total_cost(&instance, &positions),
            par_total_cost(&instance, &positions)
        );
        assert_eq!(total_cost(&instance, &positions), 120);
    }
}
