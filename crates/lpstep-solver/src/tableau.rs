use std::collections::BTreeSet;
use std::fmt;

use crate::problem::LinearProgram;

/// Which objective row 0 currently carries.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// Minimizing the sum of the listed artificial columns
    One { artificial: Vec<usize> },
    /// Minimizing the true objective
    Two,
}

/// Dense simplex tableau.
///
/// `matrix` has `m + 1` rows and `n + 1` columns. Row 0 holds the reduced costs of the
/// active objective and, in its RHS cell, the negated objective value. Rows `1..=m` are
/// the constraints; `basic_variables[i - 1]` is the basic column of row `i`.
///
/// Every operation returns a new tableau so callers can keep earlier ones.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Tableau {
    matrix: Vec<Vec<f64>>,
    basic_variables: Vec<usize>,
    column_names: Vec<String>,
    /// Cost of each column under the active objective
    costs: Vec<f64>,
    cost_constant: f64,
    phase: Phase,
}

impl Tableau {
    /// Build a tableau over the equality rows of a standard-form program.
    ///
    /// `artificial` appends one identity column per row; those columns then form the
    /// basis and the tableau starts in phase one. Row 0 always receives the program's
    /// own objective (zero on artificial columns).
    pub(crate) fn from_program(program: &LinearProgram, basis: Option<Vec<usize>>) -> Self {
        let m = program.num_constraints();
        let n_structural = program.num_variables();
        let (basis, phase, n) = match basis {
            Some(basis) => (basis, Phase::Two, n_structural),
            None => {
                let artificial: Vec<usize> = (n_structural..n_structural + m).collect();
                (artificial.clone(), Phase::One { artificial }, n_structural + m)
            }
        };

        let mut matrix = vec![vec![0.0; n + 1]; m + 1];
        for (i, c) in program.constraints.iter().enumerate() {
            for j in 0..n_structural {
                matrix[i + 1][j] = c.coefficient(j);
            }
            matrix[i + 1][n] = c.rhs;
            if n > n_structural {
                matrix[i + 1][n_structural + i] = 1.0;
            }
        }

        let mut costs = vec![0.0; n];
        for (j, &coef) in program.objective.iter().enumerate() {
            costs[j] = coef;
        }

        let mut column_names = program.variables.clone();
        column_names.extend((n_structural..n).map(|j| format!("a{}", j - n_structural + 1)));

        let mut tableau = Self {
            matrix,
            basic_variables: basis,
            column_names,
            costs: Vec::new(),
            cost_constant: 0.0,
            phase,
        };
        tableau.install_objective(costs, program.objective_constant);
        tableau
    }

    fn install_objective(&mut self, costs: Vec<f64>, constant: f64) {
        let n = self.columns();
        for j in 0..n {
            self.matrix[0][j] = costs[j];
        }
        self.matrix[0][n] = -constant;
        self.costs = costs;
        self.cost_constant = constant;
    }

    /// Replace row 0 with raw objective coefficients (not yet canonical).
    pub(crate) fn with_objective(&self, costs: Vec<f64>, constant: f64) -> Self {
        let mut next = self.clone();
        next.install_objective(costs, constant);
        next
    }

    /// Eliminate every basic column from row 0, one basic variable at a time.
    pub fn canonicalize(&self) -> Self {
        let mut next = self.clone();
        let n_cols = self.columns() + 1;
        for (i, &basic) in self.basic_variables.iter().enumerate() {
            let factor = next.matrix[0][basic];
            if factor != 0.0 {
                for j in 0..n_cols {
                    next.matrix[0][j] -= factor * next.matrix[i + 1][j];
                }
            }
        }
        next
    }

    /// Number of constraint rows
    pub fn rows(&self) -> usize {
        self.basic_variables.len()
    }

    /// Number of variable columns (excluding RHS)
    pub fn columns(&self) -> usize {
        self.matrix[0].len() - 1
    }

    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.matrix
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.matrix[row][col]
    }

    pub fn rhs(&self, row: usize) -> f64 {
        self.matrix[row][self.columns()]
    }

    pub fn reduced_cost(&self, col: usize) -> f64 {
        self.matrix[0][col]
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        (1..=self.rows()).map(|i| self.matrix[i][col]).collect()
    }

    pub fn basic_variables(&self) -> &[usize] {
        &self.basic_variables
    }

    pub fn non_basic_variables(&self) -> BTreeSet<usize> {
        let mask = self.basic_mask();
        (0..self.columns()).filter(|&j| !mask[j]).collect()
    }

    fn basic_mask(&self) -> Vec<bool> {
        let mut mask = vec![false; self.columns()];
        for &b in &self.basic_variables {
            mask[b] = true;
        }
        mask
    }

    pub fn is_basic(&self, col: usize) -> bool {
        self.basic_variables.contains(&col)
    }

    /// Row (1-based) in which `col` is basic
    pub fn basic_row(&self, col: usize) -> Option<usize> {
        self.basic_variables.iter().position(|&b| b == col).map(|i| i + 1)
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn costs(&self) -> &[f64] {
        &self.costs
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Objective value of the current basic solution under the active objective
    pub fn objective_value(&self) -> f64 {
        -self.rhs(0)
    }

    /// Value of every column in the current basic solution
    pub fn basic_solution(&self) -> Vec<f64> {
        let mut values = vec![0.0; self.columns()];
        for (i, &basic) in self.basic_variables.iter().enumerate() {
            values[basic] = self.rhs(i + 1);
        }
        values
    }

    /// Every basic column is a unit vector, including a zero in row 0.
    pub fn is_canonical(&self, tolerance: f64) -> bool {
        self.basic_variables.iter().enumerate().all(|(i, &basic)| {
            (0..=self.rows()).all(|r| {
                let expected = if r == i + 1 { 1.0 } else { 0.0 };
                (self.matrix[r][basic] - expected).abs() <= tolerance
            })
        })
    }

    /// No non-basic column has a reduced cost below `-tolerance`.
    pub fn is_dual_feasible(&self, tolerance: f64) -> bool {
        self.entering_column(tolerance).is_none()
    }

    pub fn is_primal_feasible(&self, tolerance: f64) -> bool {
        (1..=self.rows()).all(|i| self.rhs(i) >= -tolerance)
    }

    /// Non-basic column with the most negative reduced cost, lowest index on ties.
    /// `None` means the basis is optimal for the active objective.
    pub fn entering_column(&self, tolerance: f64) -> Option<usize> {
        let mask = self.basic_mask();
        let mut min_val = -tolerance;
        let mut min_col = None;

        for j in 0..self.columns() {
            if !mask[j] && self.matrix[0][j] < min_val {
                min_val = self.matrix[0][j];
                min_col = Some(j);
            }
        }

        min_col
    }

    /// Minimum-ratio test on `col`, lowest row on ties. `None` means unbounded.
    pub fn leaving_row(&self, col: usize, tolerance: f64) -> Option<usize> {
        let rhs_col = self.columns();
        let mut min_ratio = f64::INFINITY;
        let mut min_row = None;

        for i in 1..=self.rows() {
            let val = self.matrix[i][col];
            if val > tolerance {
                let ratio = self.matrix[i][rhs_col] / val;
                if ratio < min_ratio {
                    min_ratio = ratio;
                    min_row = Some(i);
                }
            }
        }

        min_row
    }

    /// Pivot on (`row`, `col`), `row` in `1..=m`.
    pub fn pivot(&self, row: usize, col: usize) -> Self {
        let mut next = self.clone();
        let n_cols = self.columns() + 1;

        next.basic_variables[row - 1] = col;

        // Scale pivot row
        let pivot_val = next.matrix[row][col];
        for j in 0..n_cols {
            next.matrix[row][j] /= pivot_val;
        }
        next.matrix[row][col] = 1.0;

        // Eliminate column in other rows
        for i in 0..next.matrix.len() {
            if i != row {
                let factor = next.matrix[i][col];
                if factor != 0.0 {
                    for j in 0..n_cols {
                        next.matrix[i][j] -= factor * next.matrix[row][j];
                    }
                    next.matrix[i][col] = 0.0;
                }
            }
        }

        next
    }

    /// Remove constraint row `row` (1-based) together with its basis entry.
    pub(crate) fn without_row(&self, row: usize) -> Self {
        let mut next = self.clone();
        next.matrix.remove(row);
        next.basic_variables.remove(row - 1);
        next
    }

    /// Drop the artificial columns and switch to phase two with `costs` in row 0.
    ///
    /// No artificial column may still be basic.
    pub(crate) fn into_phase_two(&self, costs: Vec<f64>, constant: f64) -> Self {
        let artificial: &[usize] = match &self.phase {
            Phase::One { artificial } => artificial.as_slice(),
            Phase::Two => &[],
        };
        let keep: Vec<usize> = (0..=self.columns()).filter(|j| !artificial.contains(j)).collect();

        let mut remap = vec![usize::MAX; self.columns()];
        for (new, &old) in keep.iter().enumerate() {
            if old < self.columns() {
                remap[old] = new;
            }
        }

        let matrix = self
            .matrix
            .iter()
            .map(|row| keep.iter().map(|&j| row[j]).collect())
            .collect();
        let column_names = keep
            .iter()
            .filter(|&&j| j < self.columns())
            .map(|&j| self.column_names[j].clone())
            .collect();
        let basic_variables = self.basic_variables.iter().map(|&b| remap[b]).collect();

        let mut next = Self {
            matrix,
            basic_variables,
            column_names,
            costs: Vec::new(),
            cost_constant: 0.0,
            phase: Phase::Two,
        };
        next.install_objective(costs, constant);
        next
    }

    /// Overwrite constraint RHS values and refresh the objective cell to match.
    pub(crate) fn with_rhs(&self, changes: &[(usize, f64)]) -> Self {
        let mut next = self.clone();
        let rhs_col = self.columns();
        for &(row, value) in changes {
            next.matrix[row][rhs_col] = value;
        }
        let objective: f64 = next
            .basic_variables
            .iter()
            .enumerate()
            .map(|(i, &b)| next.costs[b] * next.matrix[i + 1][rhs_col])
            .sum();
        next.matrix[0][rhs_col] = -(objective + next.cost_constant);
        next
    }
}

impl fmt::Display for Tableau {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "basis")?;
        for name in &self.column_names {
            write!(f, " {:>9}", name)?;
        }
        writeln!(f, " {:>9}", "rhs")?;

        for (i, row) in self.matrix.iter().enumerate() {
            let label = if i == 0 {
                "z"
            } else {
                self.column_names[self.basic_variables[i - 1]].as_str()
            };
            write!(f, "{:>8}", label)?;
            for value in row {
                write!(f, " {:>9.3}", value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ConstraintOp;

    const TOL: f64 = 1e-9;

    // minimize -3x - 2y
    //   2x +  y + s1      = 10
    //    x + 2y      + s2 =  8
    fn slack_tableau() -> Tableau {
        let names = ["x", "y", "s1", "s2"].iter().map(|s| s.to_string()).collect();
        let mut program = LinearProgram::new(names);
        program.set_objective(vec![-3.0, -2.0, 0.0, 0.0], false);
        program.add_constraint("c1", vec![2.0, 1.0, 1.0, 0.0], ConstraintOp::Eq, 10.0);
        program.add_constraint("c2", vec![1.0, 2.0, 0.0, 1.0], ConstraintOp::Eq, 8.0);
        Tableau::from_program(&program, Some(vec![2, 3]))
    }

    #[test]
    fn test_entering_and_leaving() {
        let tableau = slack_tableau();
        assert!(tableau.is_canonical(TOL));
        assert_eq!(tableau.entering_column(TOL), Some(0));
        // ratios 10/2 = 5 and 8/1 = 8
        assert_eq!(tableau.leaving_row(0, TOL), Some(1));
        assert_eq!(tableau.non_basic_variables().into_iter().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_entering_tie_breaks_on_lowest_index() {
        let tableau = slack_tableau().with_objective(vec![-2.0, -2.0, 0.0, 0.0], 0.0);
        assert_eq!(tableau.entering_column(TOL), Some(0));
    }

    #[test]
    fn test_pivot_keeps_previous_tableau() {
        let before = slack_tableau();
        let after = before.pivot(1, 0);

        assert_eq!(before.basic_variables(), &[2, 3]);
        assert_eq!(after.basic_variables(), &[0, 3]);
        assert!(after.is_canonical(TOL));
        assert!((after.rhs(1) - 5.0).abs() < TOL);
        assert!((after.rhs(2) - 3.0).abs() < TOL);
        assert!((after.objective_value() + 15.0).abs() < TOL);
    }

    #[test]
    fn test_phase_one_layout() {
        let names = ["x", "y"].iter().map(|s| s.to_string()).collect();
        let mut program = LinearProgram::new(names);
        program.set_objective(vec![1.0, 1.0], false);
        program.add_constraint("c1", vec![1.0, 1.0], ConstraintOp::Eq, 4.0);
        program.add_constraint("c2", vec![1.0, -1.0], ConstraintOp::Eq, 2.0);

        let tableau = Tableau::from_program(&program, None);
        assert_eq!(tableau.columns(), 4);
        assert_eq!(tableau.basic_variables(), &[2, 3]);
        assert_eq!(tableau.column_names()[2], "a1");
        assert_eq!(tableau.phase(), &Phase::One { artificial: vec![2, 3] });

        let phase_one = tableau.with_objective(vec![0.0, 0.0, 1.0, 1.0], 0.0).canonicalize();
        assert!(phase_one.is_canonical(TOL));
        assert!((phase_one.objective_value() - 6.0).abs() < TOL);
    }

    #[test]
    fn test_with_rhs_refreshes_objective() {
        let optimal = slack_tableau().pivot(1, 0).pivot(2, 1);
        // x = 4, y = 2, objective -16
        assert!((optimal.objective_value() + 16.0).abs() < 1e-9);

        let x_row = optimal.basic_row(0).unwrap();
        let changed = optimal.with_rhs(&[(x_row, 5.0)]);
        assert!((changed.objective_value() + 19.0).abs() < 1e-9);
    }
}
