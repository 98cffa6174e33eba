//! Conversion of arbitrary linear programs into minimization, equality-only,
//! non-negative-variable form.

use crate::error::ProblemError;
use crate::problem::{Constraint, ConstraintOp, LinearProgram, VariableRestriction};

/// What a standard-form column stands for in the original program
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Non-negative original variable
    Original(usize),
    /// Positive part of a free original variable
    FreePositive(usize),
    /// Negative part of a free original variable
    FreeNegative(usize),
    /// Slack of the `Le` constraint with this index
    Slack(usize),
    /// Surplus of the `Ge` constraint with this index
    Surplus(usize),
}

/// A standard-form program together with its correspondence to the original one
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct StandardForm {
    /// Minimization, all constraints `Eq`, all variables non-negative, RHS >= 0
    pub program: LinearProgram,
    /// One entry per column of `program`
    pub columns: Vec<ColumnKind>,
    /// Rows that were multiplied by -1 to make their RHS non-negative
    pub row_negated: Vec<bool>,
    /// The original program was a maximization
    pub negated_objective: bool,
    /// Variable count of the original program
    pub original_variables: usize,
}

/// Convert `lp` into standard form.
pub fn convert_to_standard_form(lp: &LinearProgram) -> Result<StandardForm, ProblemError> {
    lp.validate()?;

    let sign = if lp.is_maximization { -1.0 } else { 1.0 };

    // Structural columns: free variables split in place
    let mut columns = Vec::new();
    let mut names = Vec::new();
    for (i, name) in lp.variables.iter().enumerate() {
        match lp.restrictions[i] {
            VariableRestriction::NonNegative => {
                columns.push(ColumnKind::Original(i));
                names.push(name.clone());
            }
            VariableRestriction::Free => {
                columns.push(ColumnKind::FreePositive(i));
                names.push(format!("{}+", name));
                columns.push(ColumnKind::FreeNegative(i));
                names.push(format!("{}-", name));
            }
        }
    }

    // Slack and surplus columns, in constraint order
    for (row, c) in lp.constraints.iter().enumerate() {
        match c.op {
            ConstraintOp::Le => {
                columns.push(ColumnKind::Slack(row));
                names.push(format!("s{}", row + 1));
            }
            ConstraintOp::Ge => {
                columns.push(ColumnKind::Surplus(row));
                names.push(format!("e{}", row + 1));
            }
            ConstraintOp::Eq => {}
        }
    }

    let total = columns.len();
    let structural = |coefficient: &dyn Fn(usize) -> f64| -> Vec<f64> {
        let mut row = vec![0.0; total];
        for (j, kind) in columns.iter().enumerate() {
            row[j] = match *kind {
                ColumnKind::Original(i) | ColumnKind::FreePositive(i) => coefficient(i),
                ColumnKind::FreeNegative(i) => -coefficient(i),
                ColumnKind::Slack(_) | ColumnKind::Surplus(_) => 0.0,
            };
        }
        row
    };

    let objective = structural(&|i| sign * lp.objective.get(i).copied().unwrap_or(0.0));

    let mut constraints = Vec::with_capacity(lp.num_constraints());
    let mut row_negated = Vec::with_capacity(lp.num_constraints());
    for (row, c) in lp.constraints.iter().enumerate() {
        let mut coefficients = structural(&|i| c.coefficient(i));
        // Slack sign is fixed before any row negation
        if let Some(j) = columns
            .iter()
            .position(|kind| matches!(kind, ColumnKind::Slack(r) | ColumnKind::Surplus(r) if *r == row))
        {
            coefficients[j] = if c.op == ConstraintOp::Le { 1.0 } else { -1.0 };
        }

        let mut rhs = c.rhs;
        let negate = rhs < 0.0;
        if negate {
            rhs = -rhs;
            for coef in coefficients.iter_mut() {
                *coef = -*coef;
            }
        }
        row_negated.push(negate);

        constraints.push(Constraint {
            name: c.name.clone(),
            coefficients,
            op: ConstraintOp::Eq,
            rhs,
        });
    }

    log::debug!(
        "standard form: {} original variables -> {} columns, {} rows negated",
        lp.num_variables(),
        total,
        row_negated.iter().filter(|&&n| n).count()
    );

    Ok(StandardForm {
        program: LinearProgram {
            variables: names,
            objective,
            objective_constant: sign * lp.objective_constant,
            constraints,
            is_maximization: false,
            restrictions: vec![VariableRestriction::NonNegative; total],
        },
        columns,
        row_negated,
        negated_objective: lp.is_maximization,
        original_variables: lp.num_variables(),
    })
}

impl StandardForm {
    /// Wrap a program that is already in standard form, checking that it really is.
    pub fn from_standard(lp: &LinearProgram) -> Result<Self, ProblemError> {
        lp.validate()?;
        if lp.is_maximization {
            return Err(ProblemError::NotStandardForm("objective is a maximization".to_string()));
        }
        if let Some(j) = lp
            .restrictions
            .iter()
            .position(|r| *r != VariableRestriction::NonNegative)
        {
            return Err(ProblemError::NotStandardForm(format!(
                "variable {} is free",
                lp.variables[j]
            )));
        }
        for c in &lp.constraints {
            if c.op != ConstraintOp::Eq {
                return Err(ProblemError::NotStandardForm(format!(
                    "constraint {} uses {}",
                    c.name, c.op
                )));
            }
            if c.rhs < 0.0 {
                return Err(ProblemError::NotStandardForm(format!(
                    "constraint {} has a negative right-hand side",
                    c.name
                )));
            }
        }

        let n = lp.num_variables();
        let mut program = lp.clone();
        program.objective.resize(n, 0.0);
        for c in program.constraints.iter_mut() {
            c.coefficients.resize(n, 0.0);
        }

        Ok(Self {
            program,
            columns: (0..n).map(ColumnKind::Original).collect(),
            row_negated: vec![false; lp.num_constraints()],
            negated_objective: false,
            original_variables: n,
        })
    }

    /// Project standard-form column values back onto the original variables.
    pub fn recover(&self, values: &[f64]) -> Vec<f64> {
        let mut original = vec![0.0; self.original_variables];
        for (kind, &value) in self.columns.iter().zip(values) {
            match *kind {
                ColumnKind::Original(i) | ColumnKind::FreePositive(i) => original[i] += value,
                ColumnKind::FreeNegative(i) => original[i] -= value,
                ColumnKind::Slack(_) | ColumnKind::Surplus(_) => {}
            }
        }
        original
    }

    /// Lift original-variable values into standard-form columns, including the
    /// slack/surplus values they imply.
    pub fn lift(&self, original: &LinearProgram, values: &[f64]) -> Vec<f64> {
        self.columns
            .iter()
            .map(|kind| match *kind {
                ColumnKind::Original(i) => values[i],
                ColumnKind::FreePositive(i) => values[i].max(0.0),
                ColumnKind::FreeNegative(i) => (-values[i]).max(0.0),
                ColumnKind::Slack(row) => {
                    let c = &original.constraints[row];
                    c.rhs - c.lhs(values)
                }
                ColumnKind::Surplus(row) => {
                    let c = &original.constraints[row];
                    c.lhs(values) - c.rhs
                }
            })
            .collect()
    }

    /// Slack or surplus column of original constraint `row`, with its sign
    /// (+1 for slack, -1 for surplus) before any row negation.
    pub fn slack_column(&self, row: usize) -> Option<(usize, f64)> {
        self.columns.iter().enumerate().find_map(|(j, kind)| match *kind {
            ColumnKind::Slack(r) if r == row => Some((j, 1.0)),
            ColumnKind::Surplus(r) if r == row => Some((j, -1.0)),
            _ => None,
        })
    }

    /// Convert a standard-form (minimization) objective value back to the original sense.
    pub fn original_objective(&self, value: f64) -> f64 {
        if self.negated_objective { -value } else { value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maximization_with_slacks() {
        let mut lp = LinearProgram::new(vec!["x1".to_string(), "x2".to_string()]);
        lp.set_objective(vec![3.0, 2.0], true);
        lp.set_objective_constant(5.0);
        lp.add_constraint("c1", vec![2.0, 1.0], ConstraintOp::Le, 10.0);
        lp.add_constraint("c2", vec![1.0, 2.0], ConstraintOp::Ge, 8.0);

        let form = convert_to_standard_form(&lp).unwrap();
        let std = &form.program;

        assert!(!std.is_maximization);
        assert_eq!(std.objective, vec![-3.0, -2.0, 0.0, 0.0]);
        assert_eq!(std.objective_constant, -5.0);
        assert_eq!(std.variables, vec!["x1", "x2", "s1", "e2"]);
        assert_eq!(std.constraints[0].coefficients, vec![2.0, 1.0, 1.0, 0.0]);
        assert_eq!(std.constraints[1].coefficients, vec![1.0, 2.0, 0.0, -1.0]);
        assert!(std.constraints.iter().all(|c| c.op == ConstraintOp::Eq));
        assert_eq!(form.slack_column(1), Some((3, -1.0)));
    }

    #[test]
    fn test_negative_rhs_negates_after_slack() {
        // x - y <= -2  becomes  -x + y - s1 = 2
        let mut lp = LinearProgram::new(vec!["x".to_string(), "y".to_string()]);
        lp.set_objective(vec![1.0, 1.0], false);
        lp.add_constraint("c1", vec![1.0, -1.0], ConstraintOp::Le, -2.0);

        let form = convert_to_standard_form(&lp).unwrap();
        let row = &form.program.constraints[0];
        assert_eq!(row.coefficients, vec![-1.0, 1.0, -1.0]);
        assert_eq!(row.rhs, 2.0);
        assert_eq!(form.row_negated, vec![true]);
    }

    #[test]
    fn test_free_variable_split_in_place() {
        let mut lp = LinearProgram::new(vec!["x".to_string(), "y".to_string()]);
        lp.set_restriction(0, VariableRestriction::Free);
        lp.set_objective(vec![2.0, 1.0], false);
        lp.add_constraint("c1", vec![4.0, 1.0], ConstraintOp::Eq, 3.0);

        let form = convert_to_standard_form(&lp).unwrap();
        assert_eq!(form.program.variables, vec!["x+", "x-", "y"]);
        assert_eq!(form.program.objective, vec![2.0, -2.0, 1.0]);
        assert_eq!(form.program.constraints[0].coefficients, vec![4.0, -4.0, 1.0]);
        assert_eq!(form.recover(&[1.0, 3.5, 2.0]), vec![-2.5, 2.0]);
    }

    #[test]
    fn test_short_rows_are_zero_filled() {
        let mut lp = LinearProgram::new(vec!["x".to_string(), "y".to_string()]);
        lp.set_objective(vec![1.0], false);
        lp.add_constraint("c1", vec![1.0], ConstraintOp::Le, 3.0);

        let form = convert_to_standard_form(&lp).unwrap();
        assert_eq!(form.program.objective, vec![1.0, 0.0, 0.0]);
        assert_eq!(form.program.constraints[0].coefficients, vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_from_standard_rejects_inequalities() {
        let mut lp = LinearProgram::new(vec!["x".to_string()]);
        lp.add_constraint("c1", vec![1.0], ConstraintOp::Le, 3.0);
        assert!(matches!(
            StandardForm::from_standard(&lp),
            Err(ProblemError::NotStandardForm(_))
        ));
    }
}
