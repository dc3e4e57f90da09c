// Public modules
pub mod algorithms;
pub mod checker;
pub mod models;
pub mod utils;

// Re-exports for convenience
pub use algorithms::exact::{ExactConfig, ExactSolver, MipSolver, RouteGranularity};
pub use algorithms::greedy::GreedySolver;
pub use algorithms::SlottingSolver;
pub use checker::{check, check_file, collect_violations, read_solution, CheckReport, Violation};
pub use models::{Solution, WarehouseInstance};
