// Models module - exports all model types

mod distance;
mod instance;
mod order;
mod product;
mod rack;
mod solution;

// Re-export model types
pub use self::distance::DistanceMatrix;
pub use self::instance::{required_free, InstanceError, Metadata, WarehouseInstance};
pub use self::order::Order;
pub use self::product::Product;
pub use self::rack::{Aisle, Rack};
pub use self::solution::{solution_file_name, ObjectiveKind, Solution, SolutionError};

// Common type aliases for improved code readability
pub type RackId = usize;
pub type AisleId = usize;
pub type ProductId = usize;
pub type OrderId = usize;
pub type CircuitId = u32;
pub type Cost = u64;
