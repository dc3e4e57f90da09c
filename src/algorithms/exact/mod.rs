// Exact slotting: integer program, its formulation and the solver interface

pub mod backend;
pub mod formulation;
#[cfg(feature = "milp")]
pub mod highs;
pub mod model;

pub use self::backend::{
    solve_with_timeout, Assignment, ExactConfig, ExactError, ExactSolver, MipSolver, SolveOutcome,
};
#[cfg(feature = "milp")]
pub use self::highs::HighsSolver;
pub use self::formulation::{build, Formulation, FormulationError, RouteGranularity, Stop};
pub use self::model::{
    Constraint, ConstraintKind, Evaluation, LinearExpr, Model, Node, Sense, VarId, VarKey,
};
