pub mod exact;
pub mod greedy;

// Common algorithm traits
use crate::models::{Solution, WarehouseInstance};

/// Trait for slotting strategies
pub trait SlottingSolver {
    /// Error raised when no solution can be produced
    type Error: std::error::Error;

    /// Short name used in solution file names
    fn name(&self) -> &'static str;

    /// Assign every product of the instance to a rack
    fn solve(&self, instance: &WarehouseInstance) -> Result<Solution, Self::Error>;
}
