//! HiGHS backend through `good_lp`.
//!
//! Only built with the `milp` feature. Every [`Model`] row becomes one
//! `good_lp` constraint over binary variables in [`VarId`](super::VarId)
//! order, so the returned valuation can be decoded by the formulation that
//! built the model.

use super::backend::{Assignment, MipSolver, SolveOutcome};
use super::model::{LinearExpr, Model, Sense};
use good_lp::solvers::highs::highs;
use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
    Variable,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Exact backend running the HiGHS MIP solver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighsSolver {
    time_limit: Duration,
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl HighsSolver {
    pub fn new(time_limit: Duration) -> Self {
        Self { time_limit }
    }
}

fn expression(expr: &LinearExpr, vars: &[Variable]) -> Expression {
    expr.terms
        .iter()
        .fold(Expression::from(0.0), |acc, &(var, coefficient)| {
            acc + coefficient * vars[var.0]
        })
}

impl MipSolver for HighsSolver {
    fn name(&self) -> &str {
        "highs"
    }

    fn solve(&self, model: &Model, cancel: &AtomicBool) -> SolveOutcome {
        let start = Instant::now();
        let mut problem_vars = ProblemVariables::new();
        let vars: Vec<Variable> = model
            .variables()
            .iter()
            .map(|key| problem_vars.add(variable().binary().name(key.name())))
            .collect();

        let objective = expression(model.objective(), &vars);
        let mut problem = problem_vars
            .minimise(objective)
            .using(highs)
            .set_time_limit(self.time_limit.as_secs_f64());

        for row in model.constraints() {
            if cancel.load(Ordering::Relaxed) {
                return SolveOutcome::Timeout;
            }
            let lhs = expression(&row.expr, &vars);
            let rhs = row.rhs;
            problem = problem.with(match row.sense {
                Sense::Le => constraint!(lhs <= rhs),
                Sense::Ge => constraint!(lhs >= rhs),
                Sense::Eq => constraint!(lhs == rhs),
            });
        }
        if cancel.load(Ordering::Relaxed) {
            return SolveOutcome::Timeout;
        }
        debug!(
            model = model.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "HiGHS problem built"
        );

        match problem.solve() {
            Ok(solution) => {
                let values: Vec<f64> = vars.iter().map(|&var| solution.value(var)).collect();
                let objective = model.objective().evaluate(&values);
                info!(
                    objective,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "HiGHS finished"
                );
                SolveOutcome::Optimal(Assignment { values, objective })
            }
            Err(ResolutionError::Infeasible) => SolveOutcome::Infeasible,
            Err(err) => {
                warn!(error = %err, "HiGHS failed");
                SolveOutcome::Error(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::exact::{ExactConfig, ExactSolver};
    use crate::algorithms::SlottingSolver;
    use crate::checker::check;
    use crate::models::{DistanceMatrix, ObjectiveKind, Solution as Placement, WarehouseInstance};
    use crate::utils::cost::total_cost;
    use std::sync::Arc;

    // 5 racks on a line, boundaries 0 and 4, two circuits of two products
    fn create_test_instance(aeration_rate: f64) -> WarehouseInstance {
        WarehouseInstance::new(
            "highs",
            vec![0, 2, 2, 2, 0],
            vec![0, 0, 1, 1],
            vec![vec![0, 1, 2, 3, 4]],
            vec![vec![0, 2], vec![1], vec![3]],
            DistanceMatrix::linear(5, 1),
            aeration_rate,
        )
        .unwrap()
    }

    #[test]
    fn test_highs_matches_cheapest_placement() {
        let instance = create_test_instance(0.0);
        let mut cheapest = u64::MAX;
        for a in 1..4 {
            for b in 1..4 {
                for c in 1..4 {
                    for d in 1..4 {
                        let placement =
                            Placement::with_positions(vec![a, b, c, d], 0, ObjectiveKind::Unknown);
                        if let Ok(report) = check(&instance, &placement) {
                            cheapest = cheapest.min(report.cost);
                        }
                    }
                }
            }
        }

        let solver = ExactSolver::new(Arc::new(HighsSolver::default()))
            .with_config(ExactConfig::default().with_time_limit_ms(30_000));
        let solution = solver.solve(&instance).unwrap();
        assert_eq!(check(&instance, &solution).unwrap().cost, cheapest);
        assert_eq!(solution.objective, total_cost(&instance, &solution.positions));
    }

    #[test]
    fn test_highs_reports_infeasible() {
        let solver = ExactSolver::new(Arc::new(HighsSolver::default()));
        assert!(solver.solve(&create_test_instance(100.0)).is_err());
    }

    #[test]
    fn test_cancelled_before_solving() {
        let model = crate::algorithms::exact::build(&create_test_instance(0.0), Default::default())
            .model;
        let cancel = AtomicBool::new(true);
        assert_eq!(
            HighsSolver::default().solve(&model, &cancel),
            SolveOutcome::Timeout
        );
    }
}
