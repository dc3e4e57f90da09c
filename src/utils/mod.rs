// Utility modules: cost evaluation, instance files, synthetic instances

pub mod cost;
pub mod generator;
pub mod loader;

pub use self::cost::{order_cost, par_total_cost, path_cost, route_cost, total_cost};
pub use self::generator::{generate, GeneratorConfig};
pub use self::loader::{load_instance, write_instance};
