// Product model representing items that have to be slotted into racks

use crate::models::{CircuitId, ProductId};
use serde::{Deserialize, Serialize};

/// Represents a product stored in the warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Index of the product, `0..num_products`
    pub id: ProductId,

    /// Circuit (family) the product belongs to
    pub circuit: CircuitId,
}

impl Product {
    /// Creates a new product with the given id and circuit
    pub fn new(id: ProductId, circuit: CircuitId) -> Self {
        Self { id, circuit }
    }
}
