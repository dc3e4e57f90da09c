//! Feasibility checker for slotting solutions.
//!
//! The checker only needs an instance and a solution (typically read back
//! from disk); it never depends on the solver that produced the solution.
//! Checks run in a fixed order and stop at the first violation:
//! assignment, capacity, aeration, contiguity. The travel cost is computed
//! only once all of them pass.

use crate::models::{
    CircuitId, Cost, ProductId, RackId, Solution, SolutionError, WarehouseInstance,
};
use crate::utils::cost::total_cost;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// The solution does not assign every product to an existing rack
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum AssignmentError {
    #[error("{actual} products provided, {expected} expected")]
    ProductCount { expected: usize, actual: usize },

    #[error("product {product}: invalid rack {rack} (0 to {})", .num_racks.saturating_sub(1))]
    RackOutOfRange {
        product: ProductId,
        rack: i64,
        num_racks: usize,
    },
}

/// A broken feasibility constraint, with the offending ids and values
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum Violation {
    #[error(transparent)]
    Assignment(#[from] AssignmentError),

    #[error("rack {rack}: {occupancy} products for capacity {capacity}")]
    Capacity {
        rack: RackId,
        occupancy: u32,
        capacity: u32,
    },

    #[error("aisle {aisle}: aeration {actual}, minimum {required}")]
    Aeration {
        aisle: usize,
        actual: i64,
        required: u64,
    },

    #[error("contiguity violated: circuit {circuit1} {interval1:?} and circuit {circuit2} {interval2:?}")]
    Contiguity {
        circuit1: CircuitId,
        circuit2: CircuitId,
        interval1: (RackId, RackId),
        interval2: (RackId, RackId),
    },
}

/// Category of a [`Violation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationKind {
    Assignment,
    Capacity,
    Aeration,
    Contiguity,
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::Assignment(_) => ViolationKind::Assignment,
            Violation::Capacity { .. } => ViolationKind::Capacity,
            Violation::Aeration { .. } => ViolationKind::Aeration,
            Violation::Contiguity { .. } => ViolationKind::Contiguity,
        }
    }
}

/// Failure of [`check_file`]: the file could not be read, or its content is infeasible
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Solution(#[from] SolutionError),

    #[error(transparent)]
    Violation(#[from] Violation),
}

/// Result of a successful check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Total travel cost over all orders
    pub cost: Cost,
    pub num_products: usize,
    pub num_orders: usize,
}

/// Every product has exactly one rack, and that rack exists
pub fn check_assignment(
    instance: &WarehouseInstance,
    solution: &Solution,
) -> Result<(), Violation> {
    let expected = instance.num_products();
    let actual = solution.num_products();
    if actual != expected {
        return Err(AssignmentError::ProductCount { expected, actual }.into());
    }

    let num_racks = instance.num_racks();
    for (product, &rack) in solution.positions.iter().enumerate() {
        if rack >= num_racks {
            return Err(AssignmentError::RackOutOfRange {
                product,
                rack: i64::try_from(rack).unwrap_or(i64::MAX),
                num_racks,
            }
            .into());
        }
    }
    Ok(())
}

/// No rack holds more products than it has slots
pub fn check_capacity(instance: &WarehouseInstance, solution: &Solution) -> Result<(), Violation> {
    let occupancy = solution.occupancy(instance.num_racks());
    for (rack, &count) in occupancy.iter().enumerate() {
        let capacity = instance.capacity(rack);
        if count > capacity {
            return Err(Violation::Capacity {
                rack,
                occupancy: count,
                capacity,
            });
        }
    }
    Ok(())
}

/// Every aisle keeps at least `ceil(rate * capacity)` free slots
pub fn check_aeration(instance: &WarehouseInstance, solution: &Solution) -> Result<(), Violation> {
    let occupancy = solution.occupancy(instance.num_racks());
    for aisle in &instance.aisles {
        let total = instance.aisle_capacity(aisle);
        let occupied: u64 = aisle.racks.iter().map(|&r| u64::from(occupancy[r])).sum();
        let actual = total as i64 - occupied as i64;
        let required = instance.required_free_slots(aisle);
        if actual < required as i64 {
            return Err(Violation::Aeration {
                aisle: aisle.id,
                actual,
                required,
            });
        }
    }
    Ok(())
}

/// Occupied rack interval `[low, high]` of every circuit.
///
/// Positions must be in range; run [`check_assignment`] first.
pub fn circuit_intervals(
    instance: &WarehouseInstance,
    solution: &Solution,
) -> BTreeMap<CircuitId, (RackId, RackId)> {
    let mut intervals: BTreeMap<CircuitId, (RackId, RackId)> = BTreeMap::new();
    for (product, &rack) in solution.positions.iter().enumerate() {
        let circuit = instance.products[product].circuit;
        intervals
            .entry(circuit)
            .and_modify(|(low, high)| {
                *low = (*low).min(rack);
                *high = (*high).max(rack);
            })
            .or_insert((rack, rack));
    }
    intervals
}

/// Circuit intervals may touch at a shared boundary rack but never overlap.
///
/// Intervals are sorted by `(low, high)` and only neighbours are compared,
/// which is enough: if any pair overlaps, so does some adjacent pair.
pub fn check_contiguity(
    instance: &WarehouseInstance,
    solution: &Solution,
) -> Result<(), Violation> {
    let mut intervals: Vec<(CircuitId, (RackId, RackId))> =
        circuit_intervals(instance, solution).into_iter().collect();
    intervals.sort_by_key(|&(circuit, (low, high))| (low, high, circuit));

    for pair in intervals.windows(2) {
        let (circuit1, interval1) = pair[0];
        let (circuit2, interval2) = pair[1];
        if interval1.1 > interval2.0 {
            return Err(Violation::Contiguity {
                circuit1,
                circuit2,
                interval1,
                interval2,
            });
        }
    }
    Ok(())
}

/// Runs every structural check in order and, if they all pass, returns the
/// solution's travel cost
pub fn check(instance: &WarehouseInstance, solution: &Solution) -> Result<CheckReport, Violation> {
    check_assignment(instance, solution)?;
    check_capacity(instance, solution)?;
    check_aeration(instance, solution)?;
    check_contiguity(instance, solution)?;
    debug!("all structural checks passed");

    let cost = total_cost(instance, &solution.positions);
    info!(cost, instance = %instance.name, "valid solution");
    Ok(CheckReport {
        cost,
        num_products: solution.num_products(),
        num_orders: instance.num_orders(),
    })
}

/// Runs each structural check independently and returns all violations.
///
/// When the assignment check fails nothing else can be evaluated safely,
/// so only that violation is returned.
pub fn collect_violations(instance: &WarehouseInstance, solution: &Solution) -> Vec<Violation> {
    if let Err(violation) = check_assignment(instance, solution) {
        return vec![violation];
    }
    let checks: [fn(&WarehouseInstance, &Solution) -> Result<(), Violation>; 3] =
        [check_capacity, check_aeration, check_contiguity];
    checks
        .iter()
        .filter_map(|run| run(instance, solution).err())
        .collect()
}

/// Reads a persisted solution for checking. A negative rack id is an
/// assignment violation, not a malformed file.
pub fn read_solution<P: AsRef<Path>>(
    instance: &WarehouseInstance,
    path: P,
) -> Result<Solution, CheckError> {
    match Solution::load(path) {
        Ok(solution) => Ok(solution),
        Err(SolutionError::NegativeRack { product, rack, .. }) => {
            let violation = Violation::from(AssignmentError::RackOutOfRange {
                product,
                rack,
                num_racks: instance.num_racks(),
            });
            debug!(%violation, "solution file names a negative rack");
            Err(violation.into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Reads a persisted solution and checks it against the instance
pub fn check_file<P: AsRef<Path>>(
    instance: &WarehouseInstance,
    path: P,
) -> Result<CheckReport, CheckError> {
    let solution = read_solution(instance, path)?;
    Ok(check(instance, &solution)?)
}
