// Warehouse instance: the read-only description of one slotting problem

use crate::models::{
    Aisle, AisleId, CircuitId, DistanceMatrix, Order, Product, ProductId, Rack, RackId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating an instance
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}, line {line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("inconsistent instance: {0}")]
    Inconsistent(String),
}

/// Summary counts of an instance, in the key order of the metadata file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub num_racks: usize,
    pub total_slots: u64,
    pub aeration_rate: f64,
    pub num_products: usize,
    pub num_circuits: usize,
    pub num_aisles: usize,
    pub num_orders: usize,
}

/// Complete slotting problem instance.
///
/// Racks `0` and `num_racks - 1` are the boundary racks where every picking
/// route starts and ends. `aeration_rate` is a percentage: `20.0` means one
/// fifth of every aisle's slots must stay empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseInstance {
    /// Instance name, used to name solution files
    pub name: String,

    pub racks: Vec<Rack>,

    pub aisles: Vec<Aisle>,

    pub products: Vec<Product>,

    pub orders: Vec<Order>,

    pub distances: DistanceMatrix,

    /// Minimum free share of every aisle, in percent
    pub aeration_rate: f64,
}

impl WarehouseInstance {
    /// Creates and validates an instance from raw per-entity columns
    pub fn new<S: Into<String>>(
        name: S,
        capacities: Vec<u32>,
        product_circuits: Vec<CircuitId>,
        aisles: Vec<Vec<RackId>>,
        orders: Vec<Vec<ProductId>>,
        distances: DistanceMatrix,
        aeration_rate: f64,
    ) -> Result<Self, InstanceError> {
        let instance = Self {
            name: name.into(),
            racks: capacities
                .into_iter()
                .enumerate()
                .map(|(id, capacity)| Rack::new(id, capacity))
                .collect(),
            aisles: aisles
                .into_iter()
                .enumerate()
                .map(|(id, racks)| Aisle::new(id, racks))
                .collect(),
            products: product_circuits
                .into_iter()
                .enumerate()
                .map(|(id, circuit)| Product::new(id, circuit))
                .collect(),
            orders: orders
                .into_iter()
                .enumerate()
                .map(|(id, products)| Order::new(id, products))
                .collect(),
            distances,
            aeration_rate,
        };
        instance.validate()?;
        Ok(instance)
    }

    /// Checks the structural consistency of the instance
    pub fn validate(&self) -> Result<(), InstanceError> {
        let n = self.num_racks();
        if n == 0 {
            return Err(InstanceError::Inconsistent("instance has no racks".into()));
        }
        if self.distances.size() != n {
            return Err(InstanceError::Inconsistent(format!(
                "distance matrix is {0}x{0} but there are {1} racks",
                self.distances.size(),
                n
            )));
        }
        if !self.aeration_rate.is_finite() || !(0.0..=100.0).contains(&self.aeration_rate) {
            return Err(InstanceError::Inconsistent(format!(
                "aeration rate {} is not a percentage",
                self.aeration_rate
            )));
        }
        for (index, rack) in self.racks.iter().enumerate() {
            if rack.id != index {
                return Err(InstanceError::Inconsistent(format!(
                    "rack at position {} has id {}",
                    index, rack.id
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for aisle in &self.aisles {
            for &rack in &aisle.racks {
                if rack >= n {
                    return Err(InstanceError::Inconsistent(format!(
                        "aisle {} references rack {} (0 to {})",
                        aisle.id,
                        rack,
                        n - 1
                    )));
                }
                if !seen.insert(rack) {
                    return Err(InstanceError::Inconsistent(format!(
                        "rack {} belongs to more than one aisle",
                        rack
                    )));
                }
            }
        }

        let m = self.num_products();
        for order in &self.orders {
            if let Some(&product) = order.products.iter().find(|&&p| p >= m) {
                return Err(InstanceError::Inconsistent(format!(
                    "order {} references product {} (0 to {})",
                    order.id,
                    product,
                    m.saturating_sub(1)
                )));
            }
        }
        Ok(())
    }

    pub fn num_racks(&self) -> usize {
        self.racks.len()
    }

    pub fn num_products(&self) -> usize {
        self.products.len()
    }

    pub fn num_aisles(&self) -> usize {
        self.aisles.len()
    }

    pub fn num_orders(&self) -> usize {
        self.orders.len()
    }

    /// Rack where every picking route starts
    pub fn start_rack(&self) -> RackId {
        0
    }

    /// Rack where every picking route ends
    pub fn end_rack(&self) -> RackId {
        self.num_racks().saturating_sub(1)
    }

    pub fn is_boundary(&self, rack: RackId) -> bool {
        rack == self.start_rack() || rack == self.end_rack()
    }

    /// Gets the capacity of a rack
    pub fn capacity(&self, rack: RackId) -> u32 {
        self.racks[rack].capacity
    }

    /// Total number of slots over all racks
    pub fn total_slots(&self) -> u64 {
        self.racks.iter().map(|r| u64::from(r.capacity)).sum()
    }

    /// Total number of slots in an aisle
    pub fn aisle_capacity(&self, aisle: &Aisle) -> u64 {
        aisle
            .racks
            .iter()
            .map(|&r| u64::from(self.capacity(r)))
            .sum()
    }

    /// Minimum number of slots of the aisle that must stay empty
    pub fn required_free_slots(&self, aisle: &Aisle) -> u64 {
        required_free(self.aisle_capacity(aisle), self.aeration_rate)
    }

    /// Maximum number of products the aisle may hold while staying aerated
    pub fn max_fill(&self, aisle: &Aisle) -> u64 {
        self.aisle_capacity(aisle) - self.required_free_slots(aisle)
    }

    /// Sum of `max_fill` over all aisles
    pub fn total_allowed_fill(&self) -> u64 {
        self.aisles.iter().map(|a| self.max_fill(a)).sum()
    }

    /// Products grouped by circuit, ascending circuit id, each group in
    /// first-seen product order
    pub fn circuits(&self) -> BTreeMap<CircuitId, Vec<ProductId>> {
        let mut circuits: BTreeMap<CircuitId, Vec<ProductId>> = BTreeMap::new();
        for product in &self.products {
            circuits.entry(product.circuit).or_default().push(product.id);
        }
        circuits
    }

    /// Aisle of every rack, `None` for racks outside all aisles
    pub fn aisle_of_racks(&self) -> Vec<Option<AisleId>> {
        let mut owner = vec![None; self.num_racks()];
        for aisle in &self.aisles {
            for &rack in &aisle.racks {
                owner[rack] = Some(aisle.id);
            }
        }
        owner
    }

    /// Summary counts, as written to the metadata file
    pub fn metadata(&self) -> Metadata {
        Metadata {
            num_racks: self.num_racks(),
            total_slots: self.total_slots(),
            aeration_rate: self.aeration_rate,
            num_products: self.num_products(),
            num_circuits: self.circuits().len(),
            num_aisles: self.num_aisles(),
            num_orders: self.num_orders(),
        }
    }
}

/// Relative slack on the product before rounding up
const ROUNDING_SLACK: f64 = 1e-12;

/// `ceil(total * rate_percent / 100)`, tolerant to floating-point noise so
/// that e.g. 30 % of 10 slots is 3 and not 4. The slack scales with the
/// product, so a genuinely tiny fraction still rounds up.
pub fn required_free(total: u64, rate_percent: f64) -> u64 {
    let raw = total as f64 * (rate_percent / 100.0);
    let free = (raw - raw.abs() * ROUNDING_SLACK).ceil().max(0.0) as u64;
    free.min(total)
}
