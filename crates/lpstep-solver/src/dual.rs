//! Dual simplex re-optimization of an optimal tableau after RHS changes.

use crate::error::ProblemError;
use crate::problem::LinearProgram;
use crate::simplex::Solver;
use crate::solution::{Analysis, Solution, SolutionStatus, SolverStep, SolverTrace, StepStatus};
use crate::standard_form::convert_to_standard_form;
use crate::tableau::{Phase, Tableau};

/// Why the dual loop stopped short of an optimal tableau
enum DualFailure {
    /// The leaving row has no negative entry
    Infeasible(Tableau, usize),
    IterationLimit(Tableau),
}

impl Solver {
    /// Overwrite tableau RHS values (`rows` are `1..=m`) and restore primal
    /// feasibility with the dual simplex method.
    ///
    /// The reported solution is in tableau terms: one value per column and the
    /// tableau's own (minimization) objective.
    pub fn reoptimize_with_dual_simplex(
        &self,
        tableau: &Tableau,
        rhs_changes: &[(usize, f64)],
    ) -> Result<SolverTrace, ProblemError> {
        let mut steps = Vec::new();
        let tableau = self.apply_rhs_changes(tableau, rhs_changes, &mut steps)?;

        let solution = match self.dual_iterate(tableau, &mut steps) {
            Ok(tableau) => {
                let solution = Solution {
                    status: SolutionStatus::Optimal,
                    values: tableau.basic_solution(),
                    objective_value: tableau.objective_value(),
                    analysis: Analysis::empty(),
                };
                steps.push(SolverStep::snapshot(tableau, StepStatus::Optimal));
                solution
            }
            Err(failure) => self.push_dual_failure(failure, false, &mut steps),
        };

        Ok(SolverTrace { steps, solution })
    }

    /// Re-solve `problem` with constraint `constraint` moved to `new_rhs`, starting
    /// from the optimal tableau of `trace` instead of from scratch.
    ///
    /// Only inequality constraints can be changed this way: their slack or surplus
    /// column in the final tableau carries the needed column of the basis inverse.
    pub fn change_constraint_rhs(
        &self,
        trace: &SolverTrace,
        problem: &LinearProgram,
        constraint: usize,
        new_rhs: f64,
    ) -> Result<SolverTrace, ProblemError> {
        let tableau = match trace.steps.last() {
            Some(step) if step.status == StepStatus::Optimal => &step.tableau,
            _ => return Err(ProblemError::NotOptimal),
        };
        let original = problem
            .constraints
            .get(constraint)
            .ok_or_else(|| ProblemError::UnknownConstraint(constraint.to_string()))?;

        let form = convert_to_standard_form(problem)?;
        if tableau.column_names() != form.program.variables.as_slice() {
            return Err(ProblemError::TraceMismatch {
                expected: form.program.variables.clone(),
                found: tableau.column_names().to_vec(),
            });
        }
        let (slack_col, sigma) = form
            .slack_column(constraint)
            .ok_or_else(|| ProblemError::NoSlackColumn(original.name.clone()))?;

        let delta = new_rhs - original.rhs;
        let changes: Vec<(usize, f64)> = (1..=tableau.rows())
            .map(|row| (row, tableau.rhs(row) + delta * tableau.value(row, slack_col) / sigma))
            .collect();

        log::info!(
            "moving rhs of {} from {} to {}",
            original.name,
            original.rhs,
            new_rhs
        );

        let mut changed = problem.clone();
        changed.constraints[constraint].rhs = new_rhs;

        let mut steps = Vec::new();
        let start = self.apply_rhs_changes(tableau, &changes, &mut steps)?;
        let solution = match self.dual_iterate(start, &mut steps) {
            Ok(tableau) => {
                let solution = self.extract_solution(&tableau, &form, &changed);
                steps.push(SolverStep::snapshot(tableau, StepStatus::Optimal));
                solution
            }
            Err(failure) => self.push_dual_failure(failure, problem.is_maximization, &mut steps),
        };

        Ok(SolverTrace { steps, solution })
    }

    fn apply_rhs_changes(
        &self,
        tableau: &Tableau,
        rhs_changes: &[(usize, f64)],
        steps: &mut Vec<SolverStep>,
    ) -> Result<Tableau, ProblemError> {
        if let Phase::One { .. } = tableau.phase() {
            return Err(ProblemError::PhaseOneTableau);
        }
        for &(row, value) in rhs_changes {
            if row == 0 || row > tableau.rows() {
                return Err(ProblemError::RowOutOfRange {
                    row,
                    rows: tableau.rows(),
                });
            }
            if !value.is_finite() {
                return Err(ProblemError::NonFinite(format!("rhs of row {}", row)));
            }
        }
        if let Some(column) = tableau.entering_column(self.tolerance) {
            return Err(ProblemError::NotDualFeasible {
                column,
                value: tableau.reduced_cost(column),
            });
        }

        let tableau = tableau.with_rhs(rhs_changes);
        steps.push(SolverStep::snapshot(tableau.clone(), StepStatus::RhsModified));
        Ok(tableau)
    }

    fn dual_iterate(&self, mut tableau: Tableau, steps: &mut Vec<SolverStep>) -> Result<Tableau, DualFailure> {
        for _ in 0..self.max_iterations {
            let Some(pivot_row) = self.dual_leaving_row(&tableau) else {
                return Ok(tableau);
            };
            let Some(pivot_col) = self.dual_entering_column(&tableau, pivot_row) else {
                return Err(DualFailure::Infeasible(tableau, pivot_row));
            };
            let leaving = tableau.basic_variables()[pivot_row - 1];
            log::debug!(
                "dual pivot ({}, {}): {} enters, {} leaves",
                pivot_row,
                pivot_col,
                tableau.column_names()[pivot_col],
                tableau.column_names()[leaving]
            );
            tableau = tableau.pivot(pivot_row, pivot_col);
            steps.push(SolverStep::pivoted(tableau.clone(), pivot_row, pivot_col, leaving));
        }

        match self.dual_leaving_row(&tableau) {
            None => Ok(tableau),
            Some(_) => Err(DualFailure::IterationLimit(tableau)),
        }
    }

    /// Row with the most negative RHS, lowest index on ties
    fn dual_leaving_row(&self, tableau: &Tableau) -> Option<usize> {
        let mut min_val = -self.tolerance;
        let mut min_row = None;
        for i in 1..=tableau.rows() {
            if tableau.rhs(i) < min_val {
                min_val = tableau.rhs(i);
                min_row = Some(i);
            }
        }
        min_row
    }

    /// Column with a negative entry in `row` minimizing |reduced cost / entry|,
    /// lowest index on ties
    fn dual_entering_column(&self, tableau: &Tableau, row: usize) -> Option<usize> {
        let mut min_ratio = f64::INFINITY;
        let mut min_col = None;
        for j in 0..tableau.columns() {
            let entry = tableau.value(row, j);
            if entry < -self.tolerance {
                let ratio = (tableau.reduced_cost(j) / entry).abs();
                if ratio < min_ratio {
                    min_ratio = ratio;
                    min_col = Some(j);
                }
            }
        }
        min_col
    }

    fn push_dual_failure(&self, failure: DualFailure, maximize: bool, steps: &mut Vec<SolverStep>) -> Solution {
        match failure {
            DualFailure::Infeasible(tableau, row) => {
                log::info!("row {} has no negative entry, problem is infeasible", row);
                steps.push(SolverStep {
                    leaving: Some(tableau.basic_variables()[row - 1]),
                    ..SolverStep::snapshot(tableau, StepStatus::Infeasible)
                });
                Solution::infeasible(maximize)
            }
            DualFailure::IterationLimit(tableau) => {
                log::warn!("dual simplex stopped at the iteration limit ({})", self.max_iterations);
                steps.push(SolverStep::snapshot(tableau, StepStatus::IterationLimit));
                Solution::iteration_limit()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ConstraintOp;

    fn assert_close(actual: f64, expected: f64, what: &str) {
        assert!((actual - expected).abs() < 1e-6, "{} = {} (expected {})", what, actual, expected);
    }

    // maximize 3x1 + 2x2, 2x1 + x2 <= 10, x1 + 2x2 <= 8
    fn production() -> LinearProgram {
        let mut problem = LinearProgram::new(vec!["x1".to_string(), "x2".to_string()]);
        problem.set_objective(vec![3.0, 2.0], true);
        problem.add_constraint("c1", vec![2.0, 1.0], ConstraintOp::Le, 10.0);
        problem.add_constraint("c2", vec![1.0, 2.0], ConstraintOp::Le, 8.0);
        problem
    }

    #[test]
    fn test_change_rhs_within_range_keeps_basis() {
        let solver = Solver::new();
        let problem = production();
        let trace = solver.solve(&problem).unwrap();

        let changed = solver.change_constraint_rhs(&trace, &problem, 0, 13.0).unwrap();
        assert_eq!(changed.solution.status, SolutionStatus::Optimal);
        assert_eq!(changed.iterations(), 0);
        // x1 = (2*13 - 8)/3 = 6, x2 = (2*8 - 13)/3 = 1
        assert_close(changed.solution.values[0], 6.0, "x1");
        assert_close(changed.solution.values[1], 1.0, "x2");
        assert_close(changed.solution.objective_value, 20.0, "obj");
    }

    #[test]
    fn test_change_rhs_outside_range_pivots() {
        let solver = Solver::new();
        let problem = production();
        let trace = solver.solve(&problem).unwrap();

        // Above 16 the c2 row alone binds: x1 = 8, x2 = 0
        let changed = solver.change_constraint_rhs(&trace, &problem, 0, 20.0).unwrap();
        assert_eq!(changed.solution.status, SolutionStatus::Optimal);
        assert_eq!(changed.iterations(), 1);
        assert_close(changed.solution.values[0], 8.0, "x1");
        assert_close(changed.solution.values[1], 0.0, "x2");
        assert_close(changed.solution.objective_value, 24.0, "obj");

        let fresh = {
            let mut p = problem.clone();
            p.constraints[0].rhs = 20.0;
            solver.solve(&p).unwrap().solution
        };
        assert_close(fresh.objective_value, changed.solution.objective_value, "fresh obj");
    }

    #[test]
    fn test_dual_simplex_detects_infeasibility() {
        // x1 + x2 <= 4 and x1 + x2 >= 2 (surplus row), then demand x1 + x2 >= 6 via the surplus
        let mut problem = LinearProgram::new(vec!["x1".to_string(), "x2".to_string()]);
        problem.set_objective(vec![1.0, 1.0], false);
        problem.add_constraint("cap", vec![1.0, 1.0], ConstraintOp::Le, 4.0);
        problem.add_constraint("need", vec![1.0, 1.0], ConstraintOp::Ge, 2.0);

        let solver = Solver::new();
        let trace = solver.solve(&problem).unwrap();
        assert_close(trace.solution.objective_value, 2.0, "obj");

        let changed = solver.change_constraint_rhs(&trace, &problem, 1, 6.0).unwrap();
        assert_eq!(changed.solution.status, SolutionStatus::Infeasible);
        assert_eq!(changed.terminal_status(), Some(StepStatus::Infeasible));
        assert_eq!(changed.solution.objective_value, f64::INFINITY);
    }

    #[test]
    fn test_change_rhs_rejects_trace_of_another_problem() {
        let solver = Solver::new();
        let problem = production();
        let trace = solver.solve(&problem).unwrap();

        // An extra row adds a slack column the trace's tableau does not have
        let mut other = problem.clone();
        other.add_constraint("c3", vec![1.0, 0.0], ConstraintOp::Le, 5.0);
        assert!(matches!(
            solver.change_constraint_rhs(&trace, &other, 0, 12.0),
            Err(ProblemError::TraceMismatch { .. })
        ));

        // A standard-form solve of the slack-augmented program names its columns differently
        let form = convert_to_standard_form(&problem).unwrap();
        let mut renamed = form.program.clone();
        renamed.variables = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let standard_trace = solver.solve_standard(&renamed).unwrap();
        assert!(matches!(
            solver.change_constraint_rhs(&standard_trace, &problem, 0, 12.0),
            Err(ProblemError::TraceMismatch { .. })
        ));
    }

    #[test]
    fn test_raw_rhs_changes() {
        let solver = Solver::new();
        let trace = solver.solve(&production()).unwrap();
        let optimal = trace.final_tableau().unwrap();

        // Tableau rows: x1 = 4, x2 = 2. Force x2's row negative.
        let x2_row = optimal.basic_row(1).unwrap();
        let result = solver.reoptimize_with_dual_simplex(optimal, &[(x2_row, -1.0)]).unwrap();

        assert_eq!(result.steps[0].status, StepStatus::RhsModified);
        let last = result.final_tableau().unwrap();
        assert!(last.is_primal_feasible(1e-9) || result.solution.status == SolutionStatus::Infeasible);
        if result.solution.is_optimal() {
            assert!(last.is_dual_feasible(1e-9));
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        let solver = Solver::new();
        let problem = production();
        let trace = solver.solve(&problem).unwrap();
        let optimal = trace.final_tableau().unwrap();

        assert_eq!(
            solver.reoptimize_with_dual_simplex(optimal, &[(3, 1.0)]).unwrap_err(),
            ProblemError::RowOutOfRange { row: 3, rows: 2 }
        );

        let start = &trace.steps[0].tableau;
        assert!(matches!(
            solver.reoptimize_with_dual_simplex(start, &[(1, 1.0)]),
            Err(ProblemError::NotDualFeasible { column: 0, .. })
        ));

        let mut with_eq = problem.clone();
        with_eq.add_constraint("fixed", vec![1.0, 0.0], ConstraintOp::Eq, 4.0);
        let eq_trace = solver.solve(&with_eq).unwrap();
        assert_eq!(
            solver.change_constraint_rhs(&eq_trace, &with_eq, 2, 3.0).unwrap_err(),
            ProblemError::NoSlackColumn("fixed".to_string())
        );
    }
}
