use clap::{Parser, Subcommand};
use lpstep_solver::{
    convert_to_standard_form, BranchAndBoundAction, IntegerProgram, LinearProgram, Solution, SolutionStatus,
    Solver, SolverTrace,
};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "lpstep")]
#[command(about = "Step-by-step simplex, dual simplex and branch-and-bound solver", long_about = None)]
struct Cli {
    /// Maximum pivots per simplex loop
    #[arg(long, global = true, default_value_t = 10000)]
    max_pivots: usize,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a JSON linear program to standard form and print it
    StandardForm {
        /// The JSON file holding the program
        file: PathBuf,
    },
    /// Solve a linear program with the two-phase simplex method
    Solve {
        /// The JSON file holding the program
        file: PathBuf,
        /// Print every tableau the solver visited
        #[arg(short, long)]
        trace: bool,
        /// Print the whole trace as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Solve an integer program by branch and bound
    BranchAndBound {
        /// The JSON file holding the integer program
        file: PathBuf,
        /// Maximum number of nodes to solve
        #[arg(short, long, default_value_t = 1000)]
        max_iterations: usize,
    },
    /// Solve, then move one constraint's RHS and re-optimize with dual simplex
    Sensitivity {
        /// The JSON file holding the program
        file: PathBuf,
        /// Name of the constraint to change
        constraint: String,
        /// New right-hand side
        rhs: f64,
    },
}

fn read_json<T: DeserializeOwned>(file: &Path) -> T {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            std::process::exit(1);
        }
    };
    match serde_json::from_str(&source) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            std::process::exit(1);
        }
    }
}

fn solve_or_exit(solver: &Solver, problem: &LinearProgram) -> SolverTrace {
    match solver.solve(problem) {
        Ok(trace) => trace,
        Err(e) => {
            eprintln!("Invalid problem: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_trace(trace: &SolverTrace) {
    for (k, step) in trace.steps.iter().enumerate() {
        print!("Step {}: {:?}", k, step.status);
        if let Some((row, col)) = step.pivot {
            let names = step.tableau.column_names();
            let leaving = step.leaving.map(|l| names[l].as_str()).unwrap_or("?");
            print!("  (pivot row {}, {} enters, {} leaves)", row, names[col], leaving);
        }
        println!();
        println!("{}", step.tableau);
    }
}

/// Print a solution; exits non-zero unless it is optimal
fn print_solution(problem: &LinearProgram, solution: &Solution) {
    match solution.status {
        SolutionStatus::Optimal => {
            println!("Status: OPTIMAL");
            println!("Objective: {:.4}", solution.objective_value);
            println!();
            println!("Variables:");
            for (name, value) in problem.variables.iter().zip(&solution.values) {
                println!("  {:20} {:12.4}", name, value);
            }

            let analysis = &solution.analysis;
            if !analysis.binding_constraints.is_empty() {
                println!();
                println!("Binding constraints:");
                for name in &analysis.binding_constraints {
                    println!("  - {}", name);
                }
            }

            if !analysis.shadow_prices.is_empty() {
                println!();
                println!("Shadow prices:");
                for sp in &analysis.shadow_prices {
                    println!("  {:20} {:12.4}", sp.constraint, sp.value);
                    println!("    {}", sp.interpretation);
                }
            }

            if !analysis.rhs_sensitivity.is_empty() {
                println!();
                println!("RHS ranges:");
                for range in &analysis.rhs_sensitivity {
                    println!(
                        "  {:20} {:12.4} in [{}, {}]",
                        range.name, range.current, range.lower_bound, range.upper_bound
                    );
                }
            }

            let entering: Vec<_> = analysis
                .reduced_costs
                .iter()
                .filter(|rc| !rc.is_basic && rc.reduced_cost.abs() > 1e-9)
                .collect();
            if !entering.is_empty() {
                println!();
                println!("Reduced costs (variables not in solution):");
                for rc in entering {
                    println!("  {:20} {:12.4}", rc.variable, rc.reduced_cost);
                }
            }
        }
        SolutionStatus::Infeasible => {
            println!("Status: INFEASIBLE");
            println!("No solution exists that satisfies all constraints.");
            std::process::exit(1);
        }
        SolutionStatus::Unbounded => {
            println!("Status: UNBOUNDED");
            println!("The problem has no finite optimal solution.");
            std::process::exit(1);
        }
        SolutionStatus::IterationLimit => {
            println!("Status: ITERATION LIMIT");
            println!("The solver stopped before reaching a conclusion.");
            std::process::exit(1);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let solver = Solver::new().with_max_iterations(cli.max_pivots);

    match cli.command {
        Commands::StandardForm { file } => {
            let problem: LinearProgram = read_json(&file);
            let form = match convert_to_standard_form(&problem) {
                Ok(form) => form,
                Err(e) => {
                    eprintln!("Invalid problem: {}", e);
                    std::process::exit(1);
                }
            };

            let program = &form.program;
            if form.negated_objective {
                println!("(maximization negated to minimization)");
            }
            let terms: Vec<String> = program
                .objective
                .iter()
                .zip(&program.variables)
                .map(|(c, name)| format!("{}*{}", c, name))
                .collect();
            println!("minimize {}", terms.join(" + "));
            println!("subject to");
            for c in &program.constraints {
                let terms: Vec<String> = c
                    .coefficients
                    .iter()
                    .zip(&program.variables)
                    .filter(|(a, _)| **a != 0.0)
                    .map(|(a, name)| format!("{}*{}", a, name))
                    .collect();
                println!("  {:12} {} = {}", c.name, terms.join(" + "), c.rhs);
            }
            println!("  all variables >= 0");

            match serde_json::to_string_pretty(program) {
                Ok(json) => {
                    println!();
                    println!("{}", json);
                }
                Err(e) => log::warn!("could not serialize standard form: {}", e),
            }
        }
        Commands::Solve { file, trace, json } => {
            let problem: LinearProgram = read_json(&file);
            let result = solve_or_exit(&solver, &problem);

            if json {
                match serde_json::to_string_pretty(&result) {
                    Ok(out) => println!("{}", out),
                    Err(e) => {
                        eprintln!("Error serializing trace: {}", e);
                        std::process::exit(1);
                    }
                }
                return;
            }
            if trace {
                print_trace(&result);
            }
            println!("Pivots: {}", result.iterations());
            print_solution(&problem, &result.solution);
        }
        Commands::BranchAndBound { file, max_iterations } => {
            let ip: IntegerProgram = read_json(&file);
            let result = match solver.solve_branch_and_bound(&ip, max_iterations) {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("Invalid problem: {}", e);
                    std::process::exit(1);
                }
            };

            for step in &result.steps {
                let node = step.current_node.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
                match &step.action {
                    BranchAndBoundAction::Start => println!("node {:>4}: start", node),
                    BranchAndBoundAction::Fathomed(reason) => println!("node {:>4}: fathomed ({})", node, reason),
                    BranchAndBoundAction::IntegerSolution { improved } => {
                        let bound = step.current_node.map(|id| step.tree[id].bound).unwrap_or(f64::NAN);
                        let note = if *improved { "new incumbent" } else { "not better" };
                        println!("node {:>4}: integer solution {} ({})", node, bound, note);
                    }
                    BranchAndBoundAction::Branched { variable, value } => {
                        println!("node {:>4}: branch on {} = {}", node, ip.program.variables[*variable], value);
                    }
                    BranchAndBoundAction::Finished(status) => println!("finished: {:?}", status),
                }
            }
            println!("Nodes: {}", result.tree().len());
            println!();

            match (&result.incumbent, result.status) {
                (Some(incumbent), SolutionStatus::Optimal) => {
                    println!("Status: OPTIMAL");
                    println!("Objective: {:.4}", incumbent.objective_value);
                    println!();
                    println!("Variables:");
                    for (name, value) in ip.program.variables.iter().zip(&incumbent.values) {
                        println!("  {:20} {:12.4}", name, value);
                    }
                }
                (incumbent, status) => {
                    println!("Status: {:?}", status);
                    if let Some(incumbent) = incumbent {
                        println!("Best integer solution found: {:.4}", incumbent.objective_value);
                    }
                    std::process::exit(1);
                }
            }
        }
        Commands::Sensitivity { file, constraint, rhs } => {
            let problem: LinearProgram = read_json(&file);
            let Some(index) = problem.constraint_index(&constraint) else {
                eprintln!("Unknown constraint: {}", constraint);
                std::process::exit(1);
            };

            let base = solve_or_exit(&solver, &problem);
            if !base.solution.is_optimal() {
                print_solution(&problem, &base.solution);
                return;
            }
            println!(
                "Original objective: {:.4} ({} = {})",
                base.solution.objective_value, constraint, problem.constraints[index].rhs
            );

            let result = match solver.change_constraint_rhs(&base, &problem, index, rhs) {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("Cannot re-optimize: {}", e);
                    std::process::exit(1);
                }
            };
            println!("Dual simplex pivots: {}", result.iterations());
            println!();

            let mut changed = problem.clone();
            changed.constraints[index].rhs = rhs;
            print_solution(&changed, &result.solution);
        }
    }
}
