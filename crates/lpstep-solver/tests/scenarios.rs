use lpstep_solver::{
    ConstraintOp, IntegerProgram, LinearProgram, NodeStatus, SolutionStatus, Solver, StepStatus,
    VariableRestriction,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn vars(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn assert_close(actual: f64, expected: f64, what: &str) {
    assert!((actual - expected).abs() < 1e-6, "{} = {} (expected {})", what, actual, expected);
}

fn production_problem() -> LinearProgram {
    let mut lp = LinearProgram::new(vars(&["x1", "x2"]));
    lp.set_objective(vec![3.0, 2.0], true);
    lp.add_constraint("machine", vec![2.0, 1.0], ConstraintOp::Le, 10.0);
    lp.add_constraint("labor", vec![1.0, 2.0], ConstraintOp::Le, 8.0);
    lp
}

#[test]
fn test_all_slack_problem_skips_phase_one() {
    init_logging();
    let trace = Solver::new().solve(&production_problem()).unwrap();

    assert_eq!(trace.solution.status, SolutionStatus::Optimal);
    assert_close(trace.solution.objective_value, 16.0, "objective");
    assert_close(trace.solution.values[0], 4.0, "x1");
    assert_close(trace.solution.values[1], 2.0, "x2");

    let statuses: Vec<StepStatus> = trace.steps.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            StepStatus::StandardForm,
            StepStatus::Phase2NonCanonical,
            StepStatus::Phase2Canonical,
            StepStatus::Iteration,
            StepStatus::Iteration,
            StepStatus::Optimal,
        ]
    );
    assert!(trace.steps.iter().all(|s| s.status != StepStatus::Phase1Start));
    assert!(trace.steps.iter().all(|s| s.status != StepStatus::ArtificialVarsAdded));
    assert_eq!(trace.terminal_status(), Some(StepStatus::Optimal));
    assert_eq!(trace.iterations(), 2);

    let mut binding = trace.solution.analysis.binding_constraints.clone();
    binding.sort();
    assert_eq!(binding, vec!["labor".to_string(), "machine".to_string()]);
}

#[test]
fn test_every_tableau_in_trace_is_canonical() {
    let trace = Solver::new().solve(&production_problem()).unwrap();
    for step in &trace.steps {
        assert!(step.tableau.is_canonical(1e-9), "{:?} step is not canonical", step.status);
    }
}

#[test]
fn test_pivot_steps_record_entering_and_leaving() {
    let trace = Solver::new().solve(&production_problem()).unwrap();
    let pivots: Vec<_> = trace
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Iteration)
        .collect();

    // x1 enters on the machine row, then x2 on the labor row
    assert_eq!(pivots[0].pivot, Some((1, 0)));
    assert_eq!(pivots[0].entering, Some(0));
    assert_eq!(pivots[0].leaving, Some(2));
    assert_eq!(pivots[1].pivot, Some((2, 1)));
    assert_eq!(pivots[1].leaving, Some(3));
    assert!(pivots[1].tableau.is_basic(1));
}

#[test]
fn test_integral_relaxation_needs_no_branching() {
    init_logging();
    let mut lp = LinearProgram::new(vars(&["x", "y"]));
    lp.set_objective(vec![3.0, 2.0], true);
    lp.add_constraint("c1", vec![2.0, 1.0], ConstraintOp::Le, 6.0);
    lp.add_constraint("c2", vec![1.0, 2.0], ConstraintOp::Le, 6.0);
    let ip = IntegerProgram::new(lp, vec![0, 1]);

    let trace = Solver::new().solve_branch_and_bound(&ip, 100).unwrap();
    assert_eq!(trace.status, SolutionStatus::Optimal);
    let incumbent = trace.incumbent.as_ref().unwrap();
    assert_close(incumbent.values[0], 2.0, "x");
    assert_close(incumbent.values[1], 2.0, "y");
    assert_close(incumbent.objective_value, 10.0, "objective");
    assert_eq!(trace.tree().len(), 1);
    assert_eq!(trace.tree()[0].status, NodeStatus::Integer);
}

#[test]
fn test_contradictory_bounds_are_infeasible() {
    let mut lp = LinearProgram::new(vars(&["x1", "x2"]));
    lp.set_objective(vec![3.0, 2.0], false);
    lp.add_constraint("at_most", vec![1.0, 1.0], ConstraintOp::Le, 10.0);
    lp.add_constraint("at_least", vec![1.0, 1.0], ConstraintOp::Ge, 15.0);

    let trace = Solver::new().solve(&lp).unwrap();
    assert_eq!(trace.solution.status, SolutionStatus::Infeasible);
    assert_eq!(trace.terminal_status(), Some(StepStatus::Infeasible));
    assert!(trace.steps.iter().any(|s| s.status == StepStatus::Phase1Start));
    assert!(trace.steps.iter().all(|s| s.status != StepStatus::Phase1Optimal));

    // the phase one objective stalls at the gap between the two right-hand sides
    let last = trace.final_tableau().unwrap();
    assert_close(last.objective_value(), 5.0, "phase one objective");
}

#[test]
fn test_overlapping_lower_bounds_are_feasible() {
    let mut lp = LinearProgram::new(vars(&["x1", "x2"]));
    lp.set_objective(vec![3.0, 2.0], false);
    lp.add_constraint("first", vec![1.0, 1.0], ConstraintOp::Ge, 10.0);
    lp.add_constraint("second", vec![1.0, 1.0], ConstraintOp::Ge, 15.0);

    let trace = Solver::new().solve(&lp).unwrap();
    assert_eq!(trace.solution.status, SolutionStatus::Optimal);
    assert_close(trace.solution.objective_value, 30.0, "objective");
    assert_close(trace.solution.values[1], 15.0, "x2");
}

#[test]
fn test_ray_without_positive_entries_is_unbounded() {
    let mut lp = LinearProgram::new(vars(&["x", "y"]));
    lp.set_objective(vec![1.0, 1.0], true);
    lp.add_constraint("gap", vec![1.0, -1.0], ConstraintOp::Le, 1.0);

    let trace = Solver::new().solve(&lp).unwrap();
    assert_eq!(trace.solution.status, SolutionStatus::Unbounded);
    assert_eq!(trace.solution.objective_value, f64::INFINITY);

    let last = trace.steps.last().unwrap();
    assert_eq!(last.status, StepStatus::Unbounded);
    let col = last.entering.unwrap();
    assert_eq!(col, 1);
    assert!(last.tableau.column(col).iter().all(|&v| v <= 0.0));
}

#[test]
fn test_unbounded_integer_program() {
    let mut lp = LinearProgram::new(vars(&["x", "y"]));
    lp.set_objective(vec![1.0, 1.0], true);
    lp.add_constraint("gap", vec![1.0, -1.0], ConstraintOp::Le, 1.0);
    let ip = IntegerProgram::new(lp, vec![0]);

    let trace = Solver::new().solve_branch_and_bound(&ip, 100).unwrap();
    assert_eq!(trace.status, SolutionStatus::Unbounded);
    assert!(trace.incumbent.is_none());
}

#[test]
fn test_free_variable_with_equality_and_negative_rhs() {
    // minimize x - y with x free, x + y = 2, x >= -3 written as -x <= 3
    let mut lp = LinearProgram::new(vars(&["x", "y"]));
    lp.set_objective(vec![1.0, -1.0], false);
    lp.set_restriction(0, VariableRestriction::Free);
    lp.add_constraint("total", vec![1.0, 1.0], ConstraintOp::Eq, 2.0);
    lp.add_constraint("floor", vec![-1.0], ConstraintOp::Le, 3.0);
    lp.add_constraint("cap", vec![0.0, 1.0], ConstraintOp::Le, 10.0);

    let trace = Solver::new().solve(&lp).unwrap();
    assert_eq!(trace.solution.status, SolutionStatus::Optimal);
    assert_close(trace.solution.values[0], -3.0, "x");
    assert_close(trace.solution.values[1], 5.0, "y");
    assert_close(trace.solution.objective_value, -8.0, "objective");
    assert!(lp.is_feasible(&trace.solution.values, 1e-9));
}

#[test]
fn test_sensitivity_change_reuses_final_tableau() {
    let lp = production_problem();
    let solver = Solver::new();
    let base = solver.solve(&lp).unwrap();

    let labor = lp.constraint_index("labor").unwrap();
    let changed = solver.change_constraint_rhs(&base, &lp, labor, 12.0).unwrap();
    assert_eq!(changed.steps[0].status, StepStatus::RhsModified);

    let mut fresh_lp = lp.clone();
    fresh_lp.constraints[labor].rhs = 12.0;
    let fresh = solver.solve(&fresh_lp).unwrap();

    assert_eq!(changed.solution.status, SolutionStatus::Optimal);
    assert_close(changed.solution.objective_value, fresh.solution.objective_value, "objective");
    for (a, b) in changed.solution.values.iter().zip(&fresh.solution.values) {
        assert_close(*a, *b, "value");
    }
}
