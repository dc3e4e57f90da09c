use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;
#[cfg(feature = "milp")]
use std::sync::Arc;
#[cfg(feature = "milp")]
use warehouse_slotting::algorithms::exact::{ExactSolver, HighsSolver};
use warehouse_slotting::algorithms::exact::{ExactConfig, Formulation, RouteGranularity};
use warehouse_slotting::checker::{check, collect_violations, read_solution, CheckError, Violation};
use warehouse_slotting::models::{solution_file_name, Solution, WarehouseInstance};
use warehouse_slotting::utils::generator::{generate, GeneratorConfig};
use warehouse_slotting::utils::loader::{load_instance, write_instance};
use warehouse_slotting::{GreedySolver, SlottingSolver};

#[derive(Parser)]
#[command(name = "slotting")]
#[command(about = "Warehouse slotting: place products in racks, check placements")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Algorithm {
    Greedy,
    Exact,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance and write the solution file
    Solve {
        /// Instance directory
        #[arg(short, long)]
        instance: PathBuf,

        #[arg(short, long, value_enum, default_value = "greedy")]
        algorithm: Algorithm,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Solution id used in the file name, defaults to a content hash
        #[arg(long)]
        id: Option<String>,

        /// Exact solver settings (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check a solution file against an instance
    Check {
        /// Instance directory
        #[arg(short, long)]
        instance: PathBuf,

        /// Solution file
        #[arg(short, long)]
        solution: PathBuf,

        /// Report every violation instead of stopping at the first
        #[arg(long)]
        all: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the exact model of an instance in LP format
    ExportModel {
        /// Instance directory
        #[arg(short, long)]
        instance: PathBuf,

        /// Output LP file
        #[arg(short, long)]
        out: PathBuf,

        /// Route nodes: rack (exact cost) or aisle (smaller model)
        #[arg(short, long, default_value = "rack")]
        granularity: RouteGranularity,
    },

    /// Generate a synthetic instance directory
    Generate {
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Random seed for reproducibility
        #[arg(short, long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "4")]
        aisles: usize,

        #[arg(long, default_value = "6")]
        racks_per_aisle: usize,

        #[arg(long, default_value = "40")]
        products: usize,

        #[arg(long, default_value = "5")]
        circuits: usize,

        #[arg(long, default_value = "20")]
        orders: usize,

        #[arg(long, default_value = "5")]
        max_order_size: usize,

        /// Free share of every aisle, in percent
        #[arg(long, default_value = "20")]
        aeration_rate: f64,
    },
}

fn enable_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load(dir: &Path) -> Result<WarehouseInstance> {
    load_instance(dir).with_context(|| format!("cannot load instance {}", dir.display()))
}

fn load_config(path: Option<&Path>) -> Result<ExactConfig> {
    let Some(path) = path else {
        return Ok(ExactConfig::default());
    };
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    serde_json::from_reader(file).with_context(|| format!("invalid config {}", path.display()))
}

fn save(
    instance: &WarehouseInstance,
    algorithm: &str,
    solution: &Solution,
    out: &Path,
    id: Option<String>,
) -> Result<PathBuf> {
    fs::create_dir_all(out).with_context(|| format!("cannot create {}", out.display()))?;
    let id = id.unwrap_or_else(|| solution.content_id());
    let path = out.join(solution_file_name(&instance.name, algorithm, &id));
    solution
        .save(&path)
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(path)
}

#[cfg(feature = "milp")]
fn solve_exact(
    instance: &WarehouseInstance,
    config: ExactConfig,
    out: &Path,
    id: Option<String>,
) -> Result<()> {
    let backend = Arc::new(HighsSolver::new(config.time_limit()));
    let solver = ExactSolver::new(backend).with_config(config);
    let start = Instant::now();
    let solution = solver.solve(instance).context("exact slotting failed")?;
    let elapsed = start.elapsed();

    let path = save(instance, solver.name(), &solution, out, id)?;
    let report = check(instance, &solution).context("exact solver returned an infeasible solution")?;
    println!("Solution written to {}", path.display());
    println!("  Travel cost: {}", report.cost);
    println!("  Solved in {:.2?}", elapsed);
    Ok(())
}

/// Without a linked engine the model is written out for an external solver
#[cfg(not(feature = "milp"))]
fn solve_exact(
    instance: &WarehouseInstance,
    config: ExactConfig,
    out: &Path,
    _id: Option<String>,
) -> Result<()> {
    let formulation = Formulation::build(instance, config.granularity);
    fs::create_dir_all(out).with_context(|| format!("cannot create {}", out.display()))?;
    let path = out.join(format!("{}_exact.lp", instance.name));
    let file = File::create(&path).with_context(|| format!("cannot write {}", path.display()))?;
    formulation
        .model
        .write_lp(file)
        .with_context(|| format!("cannot write {}", path.display()))?;
    println!("Model written to {}", path.display());
    println!(
        "  {} variables, {} constraints",
        formulation.model.num_variables(),
        formulation.model.num_constraints()
    );
    bail!("no MIP solver is linked into this binary (build with --features milp), or solve the LP file externally");
}

fn solve(
    instance_dir: &Path,
    algorithm: Algorithm,
    out: &Path,
    id: Option<String>,
    config: Option<&Path>,
) -> Result<()> {
    let instance = load(instance_dir)?;
    match algorithm {
        Algorithm::Greedy => {
            let solver = GreedySolver::new();
            let start = Instant::now();
            let solution = solver.solve(&instance).context("greedy slotting failed")?;
            let elapsed = start.elapsed();

            let path = save(&instance, solver.name(), &solution, out, id)?;
            let report = check(&instance, &solution).context("greedy produced an infeasible solution")?;
            println!("Solution written to {}", path.display());
            println!("  Placed products: {}", solution.objective);
            println!("  Travel cost: {}", report.cost);
            println!("  Solved in {:.2?}", elapsed);
        }
        Algorithm::Exact => solve_exact(&instance, load_config(config)?, out, id)?,
    }
    Ok(())
}

fn print_violations(violations: &[Violation], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(violations)?);
    } else {
        for violation in violations {
            println!("{}", violation);
        }
    }
    Ok(())
}

fn check_command(instance_dir: &Path, solution_path: &Path, all: bool, json: bool) -> Result<()> {
    let instance = load(instance_dir)?;
    let solution = match read_solution(&instance, solution_path) {
        Ok(solution) => solution,
        Err(CheckError::Violation(violation)) => {
            if all {
                print_violations(std::slice::from_ref(&violation), json)?;
            }
            return Err(violation.into());
        }
        Err(CheckError::Solution(err)) => {
            return Err(err)
                .with_context(|| format!("cannot read solution {}", solution_path.display()));
        }
    };

    if all {
        let violations = collect_violations(&instance, &solution);
        print_violations(&violations, json)?;
        if !violations.is_empty() {
            bail!("{} violation(s) found", violations.len());
        }
        let report = check(&instance, &solution)?;
        if !json {
            println!("Valid solution, travel cost {}", report.cost);
        }
        return Ok(());
    }

    let report = check(&instance, &solution)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Valid solution, travel cost {}", report.cost);
    }
    Ok(())
}

fn export_model(instance_dir: &Path, out: &Path, granularity: RouteGranularity) -> Result<()> {
    let instance = load(instance_dir)?;
    let formulation = Formulation::build(&instance, granularity);
    let file = File::create(out).with_context(|| format!("cannot write {}", out.display()))?;
    formulation.model.write_lp(file)?;
    println!(
        "Model {} written to {} ({} variables, {} constraints)",
        formulation.model.name(),
        out.display(),
        formulation.model.num_variables(),
        formulation.model.num_constraints()
    );
    Ok(())
}

fn main() -> Result<()> {
    enable_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            instance,
            algorithm,
            out,
            id,
            config,
        } => solve(&instance, algorithm, &out, id, config.as_deref()),
        Commands::Check {
            instance,
            solution,
            all,
            json,
        } => check_command(&instance, &solution, all, json),
        Commands::ExportModel {
            instance,
            out,
            granularity,
        } => export_model(&instance, &out, granularity),
        Commands::Generate {
            out,
            seed,
            aisles,
            racks_per_aisle,
            products,
            circuits,
            orders,
            max_order_size,
            aeration_rate,
        } => {
            let config = GeneratorConfig::default()
                .with_seed(seed)
                .with_layout(aisles, racks_per_aisle)
                .with_products(products, circuits)
                .with_orders(orders, max_order_size)
                .with_aeration_rate(aeration_rate);
            let instance = generate(&config).context("cannot generate instance")?;
            write_instance(&out, &instance)
                .with_context(|| format!("cannot write instance to {}", out.display()))?;
            println!(
                "Instance written to {} ({} racks, {} products, {} orders)",
                out.display(),
                instance.num_racks(),
                instance.num_products(),
                instance.num_orders()
            );
            Ok(())
        }
    }
}
