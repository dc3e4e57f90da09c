// Order model representing one picking trip through the warehouse

use crate::models::{OrderId, ProductId, RackId};
use serde::{Deserialize, Serialize};

/// A picking order: the products one picker collects in a single trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Index of the order, `0..num_orders`
    pub id: OrderId,

    /// Products of the order as listed in the instance
    pub products: Vec<ProductId>,
}

impl Order {
    /// Creates a new order
    pub fn new(id: OrderId, products: Vec<ProductId>) -> Self {
        Self { id, products }
    }

    /// Gets the number of product lines (duplicates included)
    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Distinct products of the order in ascending id order
    pub fn distinct_products(&self) -> Vec<ProductId> {
        let mut products = self.products.clone();
        products.sort_unstable();
        products.dedup();
        products
    }

    /// Racks touched by the order under the given placement, sorted and deduplicated
    pub fn racks(&self, positions: &[RackId]) -> Vec<RackId> {
        let mut racks: Vec<RackId> = self.products.iter().map(|&p| positions[p]).collect();
        racks.sort_unstable();
        racks.dedup();
        racks
    }
}
