// Integration test: greedy slotting, persistence and checking end to end
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use warehouse_slotting::algorithms::greedy::{GreedyError, GreedySolver};
use warehouse_slotting::algorithms::SlottingSolver;
use warehouse_slotting::checker::{check, check_file, circuit_intervals, CheckError, Violation};
use warehouse_slotting::models::{
    solution_file_name, DistanceMatrix, ObjectiveKind, Solution, WarehouseInstance,
};
use warehouse_slotting::utils::cost::{par_total_cost, total_cost};
use warehouse_slotting::utils::generator::{generate, GeneratorConfig};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("slotting_it_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_two_racks_four_products() -> Result<(), Box<dyn Error>> {
    let instance = WarehouseInstance::new(
        "two_racks",
        vec![2, 2],
        vec![0, 0, 0, 0],
        vec![vec![0, 1]],
        vec![vec![0, 3]],
        DistanceMatrix::linear(2, 1),
        0.0,
    )?;
    let solution = GreedySolver::new().solve(&instance)?;
    assert_eq!(solution.positions, vec![0, 0, 1, 1]);
    let report = check(&instance, &solution)?;
    assert_eq!(report.cost, 1);
    Ok(())
}

#[test]
fn test_capacity_error_after_aeration() -> Result<(), Box<dyn Error>> {
    let instance = WarehouseInstance::new(
        "tight",
        vec![2, 2, 2],
        vec![0, 1, 1, 2],
        vec![vec![0, 1, 2]],
        vec![],
        DistanceMatrix::linear(3, 1),
        50.0,
    )?;
    let err = GreedySolver::new().solve(&instance).unwrap_err();
    assert_eq!(
        err,
        GreedyError::Capacity {
            available: 3,
            required: 4
        }
    );
    Ok(())
}

#[test]
fn test_interleaved_circuits_rejected() -> Result<(), Box<dyn Error>> {
    let instance = WarehouseInstance::new(
        "interleaved",
        vec![2, 2, 2],
        vec![0, 0, 1],
        vec![vec![0, 1, 2]],
        vec![vec![0, 1, 2]],
        DistanceMatrix::linear(3, 1),
        0.0,
    )?;
    let solution = Solution::with_positions(vec![0, 2, 1], 0, ObjectiveKind::Unknown);
    match check(&instance, &solution) {
        Err(Violation::Contiguity {
            circuit1,
            circuit2,
            interval1,
            interval2,
        }) => {
            assert_eq!((circuit1, circuit2), (0, 1));
            assert_eq!(interval1, (0, 2));
            assert_eq!(interval2, (1, 1));
        }
        other => panic!("expected a contiguity violation, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_greedy_feasible_on_generated_instances() -> Result<(), Box<dyn Error>> {
    for seed in 0..20 {
        let config = GeneratorConfig::default()
            .with_seed(seed)
            .with_layout(5, 8)
            .with_products(50, 7)
            .with_orders(40, 6);
        let instance = generate(&config)?;
        let solution = GreedySolver::new().solve(&instance)?;

        let report = check(&instance, &solution)?;
        assert_eq!(report.num_products, 50);
        assert_eq!(solution.objective, 50);
        assert_eq!(solution.objective_kind, ObjectiveKind::PlacedProducts);

        // No two circuits properly overlap
        let mut intervals: Vec<_> = circuit_intervals(&instance, &solution)
            .into_values()
            .collect();
        intervals.sort();
        for pair in intervals.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "seed {}: {:?}", seed, pair);
        }

        // Cost is deterministic and matches the parallel evaluator
        let cost = total_cost(&instance, &solution.positions);
        assert_eq!(cost, report.cost);
        assert_eq!(cost, total_cost(&instance, &solution.positions));
        assert_eq!(cost, par_total_cost(&instance, &solution.positions));
    }
    Ok(())
}

#[test]
fn test_persisted_solution_checks_the_same() -> Result<(), Box<dyn Error>> {
    let instance = generate(&GeneratorConfig::default().with_seed(3).with_products(30, 5))?;
    let solver = GreedySolver::new();
    let solution = solver.solve(&instance)?;
    let expected = check(&instance, &solution)?;

    let dir = scratch_dir("persist");
    let name = solution_file_name(&instance.name, solver.name(), &solution.content_id());
    assert!(name.starts_with("synthetic_3_greedy_"));
    assert!(name.ends_with(".sol"));
    let path = dir.join(name);
    solution.save(&path)?;

    let reloaded = Solution::load(&path)?;
    assert_eq!(reloaded.positions, solution.positions);
    assert_eq!(reloaded.content_id(), solution.content_id());
    assert_eq!(check_file(&instance, &path)?, expected);

    fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn test_check_file_rejects_bad_count() -> Result<(), Box<dyn Error>> {
    let instance = generate(&GeneratorConfig::default().with_seed(5))?;
    let dir = scratch_dir("badcount");
    let path = dir.join("broken.sol");
    fs::write(&path, "3\n1\n2\n")?;

    assert!(matches!(
        check_file(&instance, &path),
        Err(CheckError::Solution(_))
    ));
    fs::remove_dir_all(&dir)?;
    Ok(())
}
