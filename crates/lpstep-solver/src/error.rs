use thiserror::Error;

/// Malformed input rejected before any pivoting happens.
///
/// Solver outcomes (infeasible, unbounded, iteration limit) are never errors;
/// they are reported through the returned trace.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    #[error("Problem has no variables")]
    NoVariables,
    #[error("Problem has no constraints")]
    NoConstraints,
    #[error("Duplicate variable name: {0}")]
    DuplicateVariable(String),
    #[error("Objective has {found} coefficients but the problem has {expected} variables")]
    ObjectiveLength { expected: usize, found: usize },
    #[error("Constraint '{constraint}' has {found} coefficients but the problem has {expected} variables")]
    ConstraintLength {
        constraint: String,
        expected: usize,
        found: usize,
    },
    #[error("Expected {expected} variable restrictions, found {found}")]
    RestrictionCount { expected: usize, found: usize },
    #[error("Non-finite value in {0}")]
    NonFinite(String),
    #[error("Integer variable index {index} out of range ({count} variables)")]
    IntegerVariableOutOfRange { index: usize, count: usize },
    #[error("Problem is not in standard form: {0}")]
    NotStandardForm(String),
    #[error("Unknown constraint: {0}")]
    UnknownConstraint(String),
    #[error("Constraint '{0}' is an equality and has no slack column to read sensitivities from")]
    NoSlackColumn(String),
    #[error("Tableau row {row} out of range (rows are 1..={rows})")]
    RowOutOfRange { row: usize, rows: usize },
    #[error("Tableau is not dual feasible: column {column} has reduced cost {value}")]
    NotDualFeasible { column: usize, value: f64 },
    #[error("Tableau is still in phase one")]
    PhaseOneTableau,
    #[error("Trace did not end at an optimal tableau")]
    NotOptimal,
    #[error("Trace columns {found:?} do not match the problem's standard form {expected:?}")]
    TraceMismatch { expected: Vec<String>, found: Vec<String> },
}
