use crate::error::ProblemError;
use crate::problem::{ConstraintOp, LinearProgram};
use crate::solution::{
    Analysis, ReducedCost, SensitivityRange, ShadowPrice, Solution, SolutionStatus, SolverStep, SolverTrace,
    StepStatus,
};
use crate::standard_form::{convert_to_standard_form, ColumnKind, StandardForm};
use crate::tableau::{Phase, Tableau};

/// Simplex solver for linear programming problems
#[derive(Debug, Clone)]
pub struct Solver {
    /// Maximum iterations of each loop before giving up
    pub(crate) max_iterations: usize,
    /// Tolerance for floating point comparisons
    pub(crate) tolerance: f64,
    /// Distance from an integer still accepted as integral
    pub(crate) integrality_tolerance: f64,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: 1e-9,
            integrality_tolerance: 1e-6,
        }
    }
}

/// How a pivoting loop stopped
pub(crate) enum LoopOutcome {
    Optimal(Tableau),
    Unbounded(Tableau, usize),
    IterationLimit(Tableau),
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_integrality_tolerance(mut self, tol: f64) -> Self {
        self.integrality_tolerance = tol;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Solve the LP problem using the two-phase simplex method
    pub fn solve(&self, problem: &LinearProgram) -> Result<SolverTrace, ProblemError> {
        let form = convert_to_standard_form(problem)?;
        Ok(self.run(&form, problem))
    }

    /// Solve a problem that is already in standard form, skipping conversion
    pub fn solve_standard(&self, problem: &LinearProgram) -> Result<SolverTrace, ProblemError> {
        let form = StandardForm::from_standard(problem)?;
        Ok(self.run(&form, problem))
    }

    fn run(&self, form: &StandardForm, problem: &LinearProgram) -> SolverTrace {
        let mut steps = Vec::new();
        let program = &form.program;

        let start = match identity_basis(program, self.tolerance) {
            Some(basis) => {
                log::info!("identity basis found, skipping phase one");
                let tableau = Tableau::from_program(program, Some(basis));
                steps.push(SolverStep::snapshot(tableau.clone(), StepStatus::StandardForm));
                steps.push(SolverStep::snapshot(tableau.clone(), StepStatus::Phase2NonCanonical));
                let tableau = tableau.canonicalize();
                steps.push(SolverStep::snapshot(tableau.clone(), StepStatus::Phase2Canonical));
                tableau
            }
            None => {
                let tableau = Tableau::from_program(program, None);
                steps.push(SolverStep::snapshot(tableau.clone(), StepStatus::StandardForm));
                match self.phase1(tableau, form, &mut steps) {
                    Some(tableau) => tableau,
                    None => {
                        let solution = self.terminal_solution(&steps, problem.is_maximization);
                        return SolverTrace { steps, solution };
                    }
                }
            }
        };

        match self.phase2(start, &mut steps) {
            LoopOutcome::Optimal(tableau) => {
                let solution = self.extract_solution(&tableau, form, problem);
                log::info!("optimal after {} steps, objective {}", steps.len(), solution.objective_value);
                steps.push(SolverStep::snapshot(tableau, StepStatus::Optimal));
                SolverTrace { steps, solution }
            }
            LoopOutcome::Unbounded(tableau, col) => {
                log::info!("unbounded along column {}", tableau.column_names()[col]);
                steps.push(SolverStep {
                    entering: Some(col),
                    ..SolverStep::snapshot(tableau, StepStatus::Unbounded)
                });
                SolverTrace {
                    steps,
                    solution: Solution::unbounded(problem.is_maximization),
                }
            }
            LoopOutcome::IterationLimit(tableau) => {
                log::warn!("phase two stopped at the iteration limit ({})", self.max_iterations);
                steps.push(SolverStep::snapshot(tableau, StepStatus::IterationLimit));
                SolverTrace {
                    steps,
                    solution: Solution::iteration_limit(),
                }
            }
        }
    }

    fn terminal_solution(&self, steps: &[SolverStep], maximize: bool) -> Solution {
        match steps.last().map(|step| step.status) {
            Some(StepStatus::IterationLimit) => Solution::iteration_limit(),
            Some(StepStatus::Unbounded) => Solution::unbounded(maximize),
            _ => Solution::infeasible(maximize),
        }
    }

    /// Phase one: minimize the sum of artificial variables.
    ///
    /// Returns the canonical phase-two starting tableau, or `None` after pushing a
    /// terminal step.
    fn phase1(&self, tableau: Tableau, form: &StandardForm, steps: &mut Vec<SolverStep>) -> Option<Tableau> {
        let artificial = match tableau.phase() {
            Phase::One { artificial } => artificial.clone(),
            Phase::Two => Vec::new(),
        };

        let mut costs = vec![0.0; tableau.columns()];
        for &a in &artificial {
            costs[a] = 1.0;
        }
        let tableau = tableau.with_objective(costs, 0.0);
        steps.push(SolverStep::snapshot(tableau.clone(), StepStatus::ArtificialVarsAdded));

        let tableau = tableau.canonicalize();
        log::info!("phase one: {} artificial variables, infeasibility {}", artificial.len(), tableau.objective_value());
        steps.push(SolverStep::snapshot(tableau.clone(), StepStatus::Phase1Start));

        let tableau = match self.iterate(tableau, steps) {
            LoopOutcome::Optimal(tableau) => tableau,
            LoopOutcome::Unbounded(tableau, col) => {
                // The phase one objective is bounded below by zero
                log::error!("phase one reported unbounded on column {}", col);
                steps.push(SolverStep::snapshot(tableau, StepStatus::Infeasible));
                return None;
            }
            LoopOutcome::IterationLimit(tableau) => {
                log::warn!("phase one stopped at the iteration limit ({})", self.max_iterations);
                steps.push(SolverStep::snapshot(tableau, StepStatus::IterationLimit));
                return None;
            }
        };

        let threshold = self.feasibility_threshold(&form.program);
        if tableau.objective_value().abs() > threshold {
            log::info!("phase one optimum {} > 0, problem is infeasible", tableau.objective_value());
            steps.push(SolverStep::snapshot(tableau, StepStatus::Infeasible));
            return None;
        }

        let tableau = self.drive_out_artificials(tableau, &artificial, threshold, steps);

        if let Some(row) = (1..=tableau.rows())
            .find(|&i| artificial.contains(&tableau.basic_variables()[i - 1]) && tableau.rhs(i) > threshold)
        {
            log::error!(
                "artificial {} still basic with value {} after phase one",
                tableau.column_names()[tableau.basic_variables()[row - 1]],
                tableau.rhs(row)
            );
            steps.push(SolverStep::snapshot(tableau, StepStatus::Infeasible));
            return None;
        }

        steps.push(SolverStep::snapshot(tableau.clone(), StepStatus::Phase1Optimal));

        let phase2 = tableau.into_phase_two(form.program.objective.clone(), form.program.objective_constant);
        steps.push(SolverStep::snapshot(phase2.clone(), StepStatus::Phase2NonCanonical));

        let phase2 = phase2.canonicalize();
        steps.push(SolverStep::snapshot(phase2.clone(), StepStatus::Phase2Canonical));

        Some(phase2)
    }

    /// Zero test for phase-one residuals: the pivot tolerance scaled by the largest
    /// right-hand side, since rounding grows with the data.
    fn feasibility_threshold(&self, program: &LinearProgram) -> f64 {
        let scale = program.constraints.iter().map(|c| c.rhs.abs()).fold(1.0, f64::max);
        self.tolerance * scale
    }

    /// Pivot zero-valued artificial variables out of the basis. Rows where no
    /// structural column can replace the artificial are redundant and removed.
    fn drive_out_artificials(
        &self,
        mut tableau: Tableau,
        artificial: &[usize],
        threshold: f64,
        steps: &mut Vec<SolverStep>,
    ) -> Tableau {
        let mut row = 1;
        while row <= tableau.rows() {
            let basic = tableau.basic_variables()[row - 1];
            if !artificial.contains(&basic) || tableau.rhs(row).abs() > threshold {
                row += 1;
                continue;
            }

            let replacement = (0..tableau.columns())
                .find(|&j| !artificial.contains(&j) && tableau.value(row, j).abs() > self.tolerance);

            match replacement {
                Some(col) => {
                    log::debug!("driving artificial {} out of row {}", tableau.column_names()[basic], row);
                    tableau = tableau.pivot(row, col);
                    steps.push(SolverStep::pivoted(tableau.clone(), row, col, basic));
                    row += 1;
                }
                None => {
                    log::warn!("constraint row {} is redundant, removing it", row);
                    tableau = tableau.without_row(row);
                }
            }
        }
        tableau
    }

    fn phase2(&self, tableau: Tableau, steps: &mut Vec<SolverStep>) -> LoopOutcome {
        self.iterate(tableau, steps)
    }

    /// Primal simplex loop on whatever objective row 0 currently holds
    pub(crate) fn iterate(&self, mut tableau: Tableau, steps: &mut Vec<SolverStep>) -> LoopOutcome {
        for _ in 0..self.max_iterations {
            let Some(pivot_col) = tableau.entering_column(self.tolerance) else {
                return LoopOutcome::Optimal(tableau);
            };
            let Some(pivot_row) = tableau.leaving_row(pivot_col, self.tolerance) else {
                return LoopOutcome::Unbounded(tableau, pivot_col);
            };
            let leaving = tableau.basic_variables()[pivot_row - 1];
            log::debug!(
                "pivot ({}, {}): {} enters, {} leaves",
                pivot_row,
                pivot_col,
                tableau.column_names()[pivot_col],
                tableau.column_names()[leaving]
            );
            tableau = tableau.pivot(pivot_row, pivot_col);
            steps.push(SolverStep::pivoted(tableau.clone(), pivot_row, pivot_col, leaving));
        }

        match tableau.entering_column(self.tolerance) {
            None => LoopOutcome::Optimal(tableau),
            Some(_) => LoopOutcome::IterationLimit(tableau),
        }
    }

    pub(crate) fn extract_solution(&self, tableau: &Tableau, form: &StandardForm, problem: &LinearProgram) -> Solution {
        let values = form.recover(&tableau.basic_solution());
        let objective_value = problem.evaluate_objective(&values);
        let analysis = self.analyze(tableau, form, problem, &values);

        Solution {
            status: SolutionStatus::Optimal,
            values,
            objective_value,
            analysis,
        }
    }

    fn analyze(&self, tableau: &Tableau, form: &StandardForm, problem: &LinearProgram, values: &[f64]) -> Analysis {
        // Reduced costs and duals are read in the minimization sense of the tableau
        let sense = if form.negated_objective { -1.0 } else { 1.0 };
        let rhs = tableau.column(tableau.columns());

        let mut shadow_prices = Vec::new();
        let mut rhs_sensitivity = Vec::new();
        for (i, constraint) in problem.constraints.iter().enumerate() {
            let Some((slack_col, sigma)) = form.slack_column(i) else {
                continue;
            };

            let value = -sense * tableau.reduced_cost(slack_col) / sigma;
            let interpretation = if value.abs() < self.tolerance {
                "Non-binding constraint".to_string()
            } else if value > 0.0 {
                format!("Increasing RHS by 1 unit would increase the objective by {:.4}", value)
            } else {
                format!("Increasing RHS by 1 unit would decrease the objective by {:.4}", -value)
            };
            shadow_prices.push(ShadowPrice {
                constraint: constraint.name.clone(),
                value,
                interpretation,
            });

            // rhs + delta * d >= 0 keeps the basis feasible
            let direction: Vec<f64> = tableau.column(slack_col).iter().map(|v| v / sigma).collect();
            let mut lower = f64::NEG_INFINITY;
            let mut upper = f64::INFINITY;
            for (r, &d) in direction.iter().enumerate() {
                if d > self.tolerance {
                    lower = lower.max(-rhs[r] / d);
                } else if d < -self.tolerance {
                    upper = upper.min(-rhs[r] / d);
                }
            }
            rhs_sensitivity.push(SensitivityRange {
                name: constraint.name.clone(),
                current: constraint.rhs,
                lower_bound: constraint.rhs + lower,
                upper_bound: constraint.rhs + upper,
            });
        }

        let mut reduced_costs = Vec::new();
        for (j, var_name) in problem.variables.iter().enumerate() {
            let mut is_basic = false;
            let mut rc = 0.0;
            for (col, kind) in form.columns.iter().enumerate() {
                match *kind {
                    ColumnKind::Original(i) | ColumnKind::FreePositive(i) if i == j => {
                        is_basic |= tableau.is_basic(col);
                        rc = tableau.reduced_cost(col);
                    }
                    ColumnKind::FreeNegative(i) if i == j => is_basic |= tableau.is_basic(col),
                    _ => {}
                }
            }
            reduced_costs.push(ReducedCost {
                variable: var_name.clone(),
                value: values[j],
                reduced_cost: if is_basic { 0.0 } else { sense * rc },
                is_basic,
            });
        }

        let binding_constraints = problem
            .constraints
            .iter()
            .filter(|c| c.op == ConstraintOp::Eq || (c.lhs(values) - c.rhs).abs() <= self.tolerance.max(1e-7))
            .map(|c| c.name.clone())
            .collect();

        Analysis {
            shadow_prices,
            reduced_costs,
            binding_constraints,
            rhs_sensitivity,
        }
    }
}

/// One column per row that is `+1` there, zero in every other row and zero in the
/// objective. `None` when some row has no such column and phase one is needed.
pub fn identity_basis(program: &LinearProgram, tolerance: f64) -> Option<Vec<usize>> {
    let n = program.num_variables();
    let mut basis: Vec<usize> = Vec::with_capacity(program.num_constraints());

    for (row, constraint) in program.constraints.iter().enumerate() {
        let col = (0..n).find(|&j| {
            !basis.contains(&j)
                && (constraint.coefficient(j) - 1.0).abs() <= tolerance
                && program.objective.get(j).copied().unwrap_or(0.0).abs() <= tolerance
                && program
                    .constraints
                    .iter()
                    .enumerate()
                    .all(|(other, c)| other == row || c.coefficient(j).abs() <= tolerance)
        })?;
        basis.push(col);
    }

    Some(basis)
}

/// Whether the standard-form program needs an artificial phase one
pub fn needs_phase_one(program: &LinearProgram, tolerance: f64) -> bool {
    identity_basis(program, tolerance).is_none()
}
