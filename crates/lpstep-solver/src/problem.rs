use std::collections::HashSet;
use std::fmt;

use crate::error::ProblemError;
use crate::solution::ConstraintViolation;

/// Represents a linear programming problem
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgram {
    /// Variable names, unique and ordered
    pub variables: Vec<String>,
    /// Objective function coefficients
    pub objective: Vec<f64>,
    /// Additive constant of the objective
    #[cfg_attr(feature = "serde", serde(default))]
    pub objective_constant: f64,
    /// Constraints
    pub constraints: Vec<Constraint>,
    /// Whether to maximize (true) or minimize (false)
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_maximization: bool,
    /// Sign restriction of each variable
    pub restrictions: Vec<VariableRestriction>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Comparison operator
    pub op: ConstraintOp,
    /// Right-hand side value
    pub rhs: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariableRestriction {
    /// x >= 0
    #[default]
    NonNegative,
    /// Unrestricted in sign
    Free,
}

/// A linear program where some variables must take integer values
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct IntegerProgram {
    pub program: LinearProgram,
    /// Indices into `program.variables`
    pub integer_variables: Vec<usize>,
}

impl ConstraintOp {
    pub fn is_satisfied(self, lhs: f64, rhs: f64, tolerance: f64) -> bool {
        match self {
            ConstraintOp::Le => lhs <= rhs + tolerance,
            ConstraintOp::Ge => lhs >= rhs - tolerance,
            ConstraintOp::Eq => (lhs - rhs).abs() <= tolerance,
        }
    }
}

impl fmt::Display for ConstraintOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintOp::Le => write!(f, "<="),
            ConstraintOp::Ge => write!(f, ">="),
            ConstraintOp::Eq => write!(f, "="),
        }
    }
}

impl Constraint {
    /// Coefficient of variable `j`; trailing columns missing from a short row read as zero.
    pub fn coefficient(&self, j: usize) -> f64 {
        self.coefficients.get(j).copied().unwrap_or(0.0)
    }

    /// Left-hand side evaluated at `values`
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(values)
            .map(|(coef, value)| coef * value)
            .sum()
    }
}

impl LinearProgram {
    pub fn new(variables: Vec<String>) -> Self {
        let n = variables.len();
        Self {
            variables,
            objective: vec![0.0; n],
            objective_constant: 0.0,
            constraints: Vec::new(),
            is_maximization: false,
            restrictions: vec![VariableRestriction::NonNegative; n],
        }
    }

    pub fn set_objective(&mut self, coefficients: Vec<f64>, is_maximization: bool) {
        self.objective = coefficients;
        self.is_maximization = is_maximization;
    }

    pub fn set_objective_constant(&mut self, constant: f64) {
        self.objective_constant = constant;
    }

    pub fn set_restriction(&mut self, variable: usize, restriction: VariableRestriction) {
        self.restrictions[variable] = restriction;
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, coefficients: Vec<f64>, op: ConstraintOp, rhs: f64) {
        self.constraints.push(Constraint {
            name: name.into(),
            coefficients,
            op,
            rhs,
        });
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraint_index(&self, name: &str) -> Option<usize> {
        self.constraints.iter().position(|c| c.name == name)
    }

    /// Check the structural invariants every engine relies on.
    ///
    /// Coefficient vectors may be shorter than the variable count (missing trailing
    /// columns are zero) but never longer.
    pub fn validate(&self) -> Result<(), ProblemError> {
        let n = self.num_variables();
        if n == 0 {
            return Err(ProblemError::NoVariables);
        }
        if self.constraints.is_empty() {
            return Err(ProblemError::NoConstraints);
        }

        let mut seen = HashSet::new();
        for name in &self.variables {
            if !seen.insert(name.as_str()) {
                return Err(ProblemError::DuplicateVariable(name.clone()));
            }
        }

        if self.restrictions.len() != n {
            return Err(ProblemError::RestrictionCount {
                expected: n,
                found: self.restrictions.len(),
            });
        }

        if self.objective.len() > n {
            return Err(ProblemError::ObjectiveLength {
                expected: n,
                found: self.objective.len(),
            });
        }
        if !self.objective.iter().all(|c| c.is_finite()) || !self.objective_constant.is_finite() {
            return Err(ProblemError::NonFinite("objective".to_string()));
        }

        for c in &self.constraints {
            if c.coefficients.len() > n {
                return Err(ProblemError::ConstraintLength {
                    constraint: c.name.clone(),
                    expected: n,
                    found: c.coefficients.len(),
                });
            }
            if !c.coefficients.iter().all(|v| v.is_finite()) || !c.rhs.is_finite() {
                return Err(ProblemError::NonFinite(format!("constraint '{}'", c.name)));
            }
        }

        Ok(())
    }

    /// Objective value (in the problem's own sense) at `values`
    pub fn evaluate_objective(&self, values: &[f64]) -> f64 {
        self.objective
            .iter()
            .zip(values)
            .map(|(coef, value)| coef * value)
            .sum::<f64>()
            + self.objective_constant
    }

    /// Find which constraints and sign restrictions are violated by `values`,
    /// worst first.
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<ConstraintViolation> {
        let mut violations = Vec::new();

        for c in &self.constraints {
            let lhs = c.lhs(values);
            if c.op.is_satisfied(lhs, c.rhs, tolerance) {
                continue;
            }
            let (violation_amount, description) = match c.op {
                ConstraintOp::Le => {
                    let amt = lhs - c.rhs;
                    (amt, format!("{} exceeds maximum of {:.2} by {:.2}", c.name, c.rhs, amt))
                }
                ConstraintOp::Ge => {
                    let amt = c.rhs - lhs;
                    (amt, format!("{} is below minimum of {:.2} by {:.2}", c.name, c.rhs, amt))
                }
                ConstraintOp::Eq => (
                    (lhs - c.rhs).abs(),
                    format!("{} requires exactly {:.2} but got {:.2}", c.name, c.rhs, lhs),
                ),
            };
            violations.push(ConstraintViolation {
                constraint: c.name.clone(),
                required: c.rhs,
                actual: lhs,
                violation_amount,
                description,
            });
        }

        for (j, restriction) in self.restrictions.iter().enumerate() {
            let value = values.get(j).copied().unwrap_or(0.0);
            if *restriction == VariableRestriction::NonNegative && value < -tolerance {
                violations.push(ConstraintViolation {
                    constraint: format!("{} >= 0", self.variables[j]),
                    required: 0.0,
                    actual: value,
                    violation_amount: -value,
                    description: format!("{} is negative ({:.2})", self.variables[j], value),
                });
            }
        }

        violations.sort_by(|a, b| b.violation_amount.total_cmp(&a.violation_amount));
        violations
    }

    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        self.violations(values, tolerance).is_empty()
    }
}

impl IntegerProgram {
    pub fn new(program: LinearProgram, integer_variables: Vec<usize>) -> Self {
        Self {
            program,
            integer_variables,
        }
    }

    pub fn validate(&self) -> Result<(), ProblemError> {
        self.program.validate()?;
        let count = self.program.num_variables();
        if let Some(&index) = self.integer_variables.iter().find(|&&i| i >= count) {
            return Err(ProblemError::IntegerVariableOutOfRange { index, count });
        }
        Ok(())
    }
}
