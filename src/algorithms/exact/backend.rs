// External MIP backend interface and the time-limited exact solver built on it

use super::formulation::{Formulation, FormulationError, RouteGranularity};
use super::model::Model;
use crate::algorithms::SlottingSolver;
use crate::models::{Solution, WarehouseInstance};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Values of every model variable, in `VarId` order, and their objective
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub values: Vec<f64>,
    pub objective: f64,
}

/// What a backend reports back for one model
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Optimal(Assignment),
    Infeasible,
    Timeout,
    Error(String),
}

/// A binary integer programming engine.
///
/// Implementations should poll `cancel` and give up with
/// [`SolveOutcome::Timeout`] once it is set.
pub trait MipSolver: Send + Sync {
    fn name(&self) -> &str;

    fn solve(&self, model: &Model, cancel: &AtomicBool) -> SolveOutcome;
}

/// Runs the backend on a worker thread and waits at most `limit` for it.
///
/// On timeout the cancel flag is raised and the worker is left to wind down
/// on its own.
pub fn solve_with_timeout(
    backend: Arc<dyn MipSolver>,
    model: Arc<Model>,
    limit: Duration,
) -> SolveOutcome {
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();

    let worker_cancel = Arc::clone(&cancel);
    let spawned = thread::Builder::new()
        .name(format!("mip-{}", backend.name()))
        .spawn(move || {
            let outcome = backend.solve(&model, &worker_cancel);
            // The receiver is gone once the caller timed out
            let _ = tx.send(outcome);
        });
    if let Err(err) = spawned {
        return SolveOutcome::Error(format!("failed to start solver thread: {}", err));
    }

    match rx.recv_timeout(limit) {
        Ok(outcome) => outcome,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            cancel.store(true, Ordering::Relaxed);
            SolveOutcome::Timeout
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            SolveOutcome::Error("solver thread stopped without an answer".into())
        }
    }
}

/// Settings of the exact solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactConfig {
    /// Wall-clock budget for the backend, in milliseconds
    pub time_limit_ms: u64,

    pub granularity: RouteGranularity,
}

impl Default for ExactConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: 60_000,
            granularity: RouteGranularity::default(),
        }
    }
}

impl ExactConfig {
    pub fn with_time_limit_ms(mut self, time_limit_ms: u64) -> Self {
        self.time_limit_ms = time_limit_ms;
        self
    }

    pub fn with_granularity(mut self, granularity: RouteGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExactError {
    #[error("model is infeasible")]
    Infeasible,

    #[error("no solution within {0:?}")]
    Timeout(Duration),

    #[error("backend {backend} failed: {message}")]
    Backend { backend: String, message: String },

    #[error("cannot read the backend's answer: {0}")]
    Decode(#[from] FormulationError),
}

/// Builds the exact model, hands it to a backend and decodes the optimum
pub struct ExactSolver {
    backend: Arc<dyn MipSolver>,
    config: ExactConfig,
}

impl ExactSolver {
    pub fn new(backend: Arc<dyn MipSolver>) -> Self {
        Self {
            backend,
            config: ExactConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExactConfig) -> Self {
        self.config = config;
        self
    }
}

impl SlottingSolver for ExactSolver {
    type Error = ExactError;

    fn name(&self) -> &'static str {
        "exact"
    }

    fn solve(&self, instance: &WarehouseInstance) -> Result<Solution, ExactError> {
        let start = Instant::now();
        let formulation = Formulation::build(instance, self.config.granularity);
        info!(
            instance = %instance.name,
            backend = self.backend.name(),
            granularity = %self.config.granularity,
            variables = formulation.model.num_variables(),
            constraints = formulation.model.num_constraints(),
            "solving exact model"
        );

        let model = Arc::new(formulation.model.clone());
        let limit = self.config.time_limit();
        match solve_with_timeout(Arc::clone(&self.backend), model, limit) {
            SolveOutcome::Optimal(assignment) => {
                debug!(
                    objective = assignment.objective,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "backend returned an optimum"
                );
                let solution = formulation.decode(instance, &assignment.values)?;
                info!(cost = solution.objective, "exact slotting done");
                Ok(solution)
            }
            SolveOutcome::Infeasible => {
                warn!("exact model reported infeasible");
                Err(ExactError::Infeasible)
            }
            SolveOutcome::Timeout => {
                warn!(?limit, "exact solve timed out");
                Err(ExactError::Timeout(limit))
            }
            SolveOutcome::Error(message) => Err(ExactError::Backend {
                backend: self.backend.name().to_string(),
                message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DistanceMatrix, ObjectiveKind};
    use crate::utils::cost::total_cost;

    fn create_test_instance() -> WarehouseInstance {
        WarehouseInstance::new(
            "backend",
            vec![0, 1, 1, 0],
            vec![0, 1],
            vec![vec![0, 1, 2, 3]],
            vec![vec![0, 1]],
            DistanceMatrix::linear(4, 2),
            0.0,
        )
        .unwrap()
    }

    /// Answers with the encoding of a fixed placement
    struct Fixed(Vec<f64>);

    impl MipSolver for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn solve(&self, model: &Model, _cancel: &AtomicBool) -> SolveOutcome {
            SolveOutcome::Optimal(Assignment {
                objective: model.evaluate(&self.0).objective,
                values: self.0.clone(),
            })
        }
    }

    struct Refuses;

    impl MipSolver for Refuses {
        fn name(&self) -> &str {
            "refuses"
        }

        fn solve(&self, _model: &Model, _cancel: &AtomicBool) -> SolveOutcome {
            SolveOutcome::Infeasible
        }
    }

    /// Spins until cancelled
    struct Sleeper;

    impl MipSolver for Sleeper {
        fn name(&self) -> &str {
            "sleeper"
        }

        fn solve(&self, _model: &Model, cancel: &AtomicBool) -> SolveOutcome {
            while !cancel.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(5));
            }
            SolveOutcome::Timeout
        }
    }

    struct Panics;

    impl MipSolver for Panics {
        fn name(&self) -> &str {
            "panics"
        }

        fn solve(&self, _model: &Model, _cancel: &AtomicBool) -> SolveOutcome {
            panic!("backend crashed");
        }
    }

    #[test]
    fn test_exact_decodes_backend_answer() {
        let instance = create_test_instance();
        let formulation = Formulation::build(&instance, RouteGranularity::default());
        let placement = Solution::with_positions(vec![1, 2], 0, ObjectiveKind::Unknown);
        let values = formulation.encode(&instance, &placement).unwrap();

        let solver = ExactSolver::new(Arc::new(Fixed(values)));
        let solution = solver.solve(&instance).unwrap();
        assert_eq!(solution.positions, vec![1, 2]);
        assert_eq!(solution.objective_kind, ObjectiveKind::TravelCost);
        assert_eq!(solution.objective, total_cost(&instance, &[1, 2]));
    }

    #[test]
    fn test_infeasible_backend() {
        let solver = ExactSolver::new(Arc::new(Refuses));
        assert_eq!(
            solver.solve(&create_test_instance()).unwrap_err(),
            ExactError::Infeasible
        );
    }

    #[test]
    fn test_timeout_cancels_backend() {
        let config = ExactConfig::default().with_time_limit_ms(20);
        let solver = ExactSolver::new(Arc::new(Sleeper)).with_config(config);
        assert_eq!(
            solver.solve(&create_test_instance()).unwrap_err(),
            ExactError::Timeout(Duration::from_millis(20))
        );
    }

    #[test]
    fn test_crashed_backend_is_an_error() {
        let outcome = solve_with_timeout(
            Arc::new(Panics),
            Arc::new(Model::new("empty")),
            Duration::from_secs(5),
        );
        assert!(matches!(outcome, SolveOutcome::Error(_)));
    }

    #[test]
    fn test_wrong_sized_answer_is_a_decode_error() {
        struct Garbage;

        impl MipSolver for Garbage {
            fn name(&self) -> &str {
                "garbage"
            }

            fn solve(&self, _model: &Model, _cancel: &AtomicBool) -> SolveOutcome {
                SolveOutcome::Optimal(Assignment {
                    values: vec![1.0],
                    objective: 0.0,
                })
            }
        }

        let solver = ExactSolver::new(Arc::new(Garbage));
        assert!(matches!(
            solver.solve(&create_test_instance()),
            Err(ExactError::Decode(FormulationError::ValuationSize { actual: 1, .. }))
        ));
    }

    #[test]
    fn test_config_builders() {
        let config = ExactConfig::default()
            .with_time_limit_ms(1500)
            .with_granularity(RouteGranularity::Aisle);
        assert_eq!(config.time_limit(), Duration::from_millis(1500));
        assert_eq!(config.granularity, RouteGranularity::Aisle);
        assert_eq!(ExactConfig::default().granularity, RouteGranularity::Rack);
    }
}
