// Seeded synthetic instances for tests, benchmarks and the `generate` command

use crate::models::{CircuitId, Cost, DistanceMatrix, InstanceError, RackId, WarehouseInstance};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Shape of a generated warehouse.
///
/// Racks are laid out aisle after aisle, `racks_per_aisle` to an aisle, with
/// cross aisles at both ends. The first and last rack are boundary racks
/// with no capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub num_aisles: usize,
    pub racks_per_aisle: usize,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub num_products: usize,
    pub num_circuits: usize,
    pub num_orders: usize,
    pub max_order_size: usize,
    /// Minimum free share of every aisle, in percent
    pub aeration_rate: f64,
    /// Walking distance between neighbouring aisles
    pub aisle_spacing: Cost,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_aisles: 4,
            racks_per_aisle: 6,
            min_capacity: 2,
            max_capacity: 4,
            num_products: 40,
            num_circuits: 5,
            num_orders: 20,
            max_order_size: 5,
            aeration_rate: 20.0,
            aisle_spacing: 3,
            seed: 0,
        }
    }
}

impl GeneratorConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_products(mut self, num_products: usize, num_circuits: usize) -> Self {
        self.num_products = num_products;
        self.num_circuits = num_circuits;
        self
    }

    pub fn with_layout(mut self, num_aisles: usize, racks_per_aisle: usize) -> Self {
        self.num_aisles = num_aisles;
        self.racks_per_aisle = racks_per_aisle;
        self
    }

    pub fn with_orders(mut self, num_orders: usize, max_order_size: usize) -> Self {
        self.num_orders = num_orders;
        self.max_order_size = max_order_size;
        self
    }

    pub fn with_aeration_rate(mut self, aeration_rate: f64) -> Self {
        self.aeration_rate = aeration_rate;
        self
    }

    pub fn num_racks(&self) -> usize {
        self.num_aisles * self.racks_per_aisle
    }
}

// Shortest walk between two racks of the aisle ladder
fn ladder_distance(config: &GeneratorConfig, from: RackId, to: RackId) -> Cost {
    let length = config.racks_per_aisle;
    let (aisle_a, pos_a) = (from / length, from % length);
    let (aisle_b, pos_b) = (to / length, to % length);
    if aisle_a == aisle_b {
        return pos_a.abs_diff(pos_b) as Cost;
    }
    // Leave through the front or back cross aisle, whichever is shorter
    let front = pos_a + pos_b + 2;
    let back = (length - 1 - pos_a) + (length - 1 - pos_b) + 2;
    front.min(back) as Cost + aisle_a.abs_diff(aisle_b) as Cost * config.aisle_spacing
}

/// Generates a random instance from `config`.
///
/// The same config always yields the same instance. Capacities are not
/// tuned to the product count, so the instance may have too little aerated
/// room for every product.
pub fn generate(config: &GeneratorConfig) -> Result<WarehouseInstance, InstanceError> {
    if config.num_aisles == 0 || config.racks_per_aisle == 0 {
        return Err(InstanceError::Inconsistent(
            "a generated warehouse needs at least one aisle of one rack".into(),
        ));
    }
    if config.min_capacity > config.max_capacity {
        return Err(InstanceError::Inconsistent(format!(
            "capacity range {}..={} is empty",
            config.min_capacity, config.max_capacity
        )));
    }
    if config.num_products > 0 && config.num_circuits == 0 {
        return Err(InstanceError::Inconsistent("products need at least one circuit".into()));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let n = config.num_racks();

    let capacities: Vec<u32> = (0..n)
        .map(|rack| {
            if rack == 0 || rack == n - 1 {
                0
            } else {
                rng.gen_range(config.min_capacity..=config.max_capacity)
            }
        })
        .collect();

    let aisles: Vec<Vec<RackId>> = (0..config.num_aisles)
        .map(|a| (a * config.racks_per_aisle..(a + 1) * config.racks_per_aisle).collect())
        .collect();

    // Every circuit gets at least one product when there are enough of them
    let mut circuits: Vec<CircuitId> = (0..config.num_products)
        .map(|k| {
            if k < config.num_circuits {
                k as CircuitId
            } else {
                rng.gen_range(0..config.num_circuits) as CircuitId
            }
        })
        .collect();
    circuits.shuffle(&mut rng);

    let all_products: Vec<usize> = (0..config.num_products).collect();
    let orders: Vec<Vec<usize>> = (0..config.num_orders)
        .map(|_| {
            let size = rng.gen_range(1..=config.max_order_size.max(1));
            all_products
                .choose_multiple(&mut rng, size.min(config.num_products))
                .copied()
                .collect()
        })
        .collect();

    let rows: Vec<Vec<Cost>> = (0..n)
        .map(|i| (0..n).map(|j| ladder_distance(config, i, j)).collect())
        .collect();
    let distances = DistanceMatrix::from_rows(rows)
        .ok_or_else(|| InstanceError::Inconsistent("generated matrix is not square".into()))?;

    debug!(
        seed = config.seed,
        racks = n,
        products = config.num_products,
        orders = config.num_orders,
        "generated instance"
    );
    WarehouseInstance::new(
        format!("synthetic_{}", config.seed),
        capacities,
        circuits,
        aisles,
        orders,
        distances,
        config.aeration_rate,
    )
}
